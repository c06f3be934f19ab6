//! Reconciles the ticker table against terminal positions and locates
//!
//! Each refresh is a full replace-by-symbol merge: symbols in the reply are
//! overwritten, unknown symbols are inserted with defaults, and symbols the
//! reply no longer lists are cleared. An empty reply (nothing drained) leaves
//! the table untouched.

use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument, warn};

use super::types::{LocateOrderStatus, TickerTable};
use crate::common::errors::Result;
use crate::common::traits::Transport;
use crate::das::command::{self, Query};
use crate::das::parsers::{parse_locate_orders, parse_positions, LocateOrderRow, PositionRow};
use crate::das::reply::Reply;
use crate::das::session::Session;

/// Merge position rows; returns the number of rows applied
pub fn merge_positions(table: &mut TickerTable, rows: &[PositionRow]) -> usize {
    let seen: HashSet<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
    for state in table.iter_mut() {
        if !seen.contains(state.symbol.as_str()) && state.in_position {
            debug!("{} no longer in positions", state.symbol);
            state.shares_in_position = 0;
            state.in_position = false;
        }
    }

    for row in rows {
        let state = table.upsert(&row.symbol);
        state.shares_in_position = row.quantity;
        state.average_cost = row.average_cost;
        state.in_position = row.quantity != 0;
    }
    rows.len()
}

/// Merge locate order rows; returns the number of symbols updated
///
/// When a symbol has several locate orders the most advanced status wins
/// (Accepted over Pending over Rejected) and accepted shares are summed.
pub fn merge_locate_orders(table: &mut TickerTable, rows: &[LocateOrderRow]) -> usize {
    let mut by_symbol: BTreeMap<&str, Vec<&LocateOrderRow>> = BTreeMap::new();
    for row in rows {
        by_symbol.entry(row.symbol.as_str()).or_default().push(row);
    }

    for state in table.iter_mut() {
        if !by_symbol.contains_key(state.symbol.as_str()) {
            state.locate_order_status = LocateOrderStatus::NoLocateOrder;
            state.locate_order_id = None;
            state.locate_order_notes.clear();
            state.locate_shares_located = 0;
        }
    }

    for (symbol, orders) in &by_symbol {
        let mut best: Option<(LocateOrderStatus, &LocateOrderRow)> = None;
        let mut located = 0;
        for order in orders {
            let status = LocateOrderStatus::from_notes(&order.notes);
            if status == LocateOrderStatus::Accepted {
                located += order.shares;
            }
            if best.map(|(s, _)| status >= s).unwrap_or(true) {
                best = Some((status, *order));
            }
        }

        let state = table.upsert(symbol);
        if let Some((status, order)) = best {
            state.locate_order_status = status;
            state.locate_order_id = order.locate_id.clone();
            state.locate_order_notes = order.notes.clone();
        }
        state.locate_shares_located = located;
    }
    by_symbol.len()
}

/// Query positions and merge them into `table`
#[instrument(skip_all)]
pub async fn refresh_positions<T: Transport>(
    session: &mut Session<T>,
    table: &mut TickerTable,
) -> Result<usize> {
    let reply = session.execute(&command::query(&Query::Positions)?).await?;
    if !has_table(&reply, "positions") {
        return Ok(0);
    }
    let rows = parse_positions(&reply);
    let merged = merge_positions(table, &rows);
    info!("Reconciled {} positions", merged);
    Ok(merged)
}

/// Query locate orders and merge them into `table`
#[instrument(skip_all)]
pub async fn refresh_locate_orders<T: Transport>(
    session: &mut Session<T>,
    table: &mut TickerTable,
) -> Result<usize> {
    let reply = session.execute(&command::query(&Query::Locates)?).await?;
    if !has_table(&reply, "locate orders") {
        return Ok(0);
    }
    let rows = parse_locate_orders(&reply);
    let merged = merge_locate_orders(table, &rows);
    info!("Reconciled locate orders for {} symbols", merged);
    Ok(merged)
}

fn has_table(reply: &Reply, what: &str) -> bool {
    if reply.is_empty() {
        warn!("No {} reply; keeping previous state", what);
        return false;
    }
    if reply.table().width() == 0 {
        warn!("Unrecognised {} reply: {}", what, reply.raw());
        return false;
    }
    true
}
