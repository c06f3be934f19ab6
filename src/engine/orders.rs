//! Client-side order records
//!
//! The terminal is authoritative for order status. Records here are updated
//! from acknowledgements and from re-querying `GET ORDERS`, never pushed.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::common::errors::{ClientError, Result};
use crate::common::traits::Transport;
use crate::common::types::Side;
use crate::das::command::{self, OrderRequest, OrderType, Query};
use crate::das::parsers::{parse_order_ack, parse_orders, OrderAck, OrderRow};
use crate::das::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Built,
    Sent,
    Acknowledged,
    Rejected,
    TimedOut,
    Replaced,
    Canceled,
}

impl OrderStatus {
    /// Still possibly working at the terminal
    pub fn is_live(self) -> bool {
        matches!(
            self,
            OrderStatus::Sent
                | OrderStatus::Acknowledged
                | OrderStatus::TimedOut
                | OrderStatus::Replaced
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub token: u64,
    /// Assigned by the terminal once acknowledged
    pub order_id: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub shares: u64,
    pub price: Option<Decimal>,
    pub route: String,
    pub status: OrderStatus,
    /// Last status text reported by `GET ORDERS`
    pub terminal_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRecord {
    fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

fn limit_price(order_type: &OrderType) -> Option<Decimal> {
    match order_type {
        OrderType::Limit { price } => Some(*price),
        OrderType::StopLimit { limit, .. } => Some(*limit),
        _ => None,
    }
}

/// Generates client tokens and tracks every order sent this session
#[derive(Debug, Clone)]
pub struct OrderTracker {
    base: u64,
    sequence: u64,
    orders: BTreeMap<u64, OrderRecord>,
}

impl Default for OrderTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderTracker {
    /// Tokens start from a random base so restarts do not reuse them
    pub fn new() -> Self {
        let seed = Uuid::new_v4().as_u128() as u32;
        Self::with_base(u64::from(seed) * 1000)
    }

    pub fn with_base(base: u64) -> Self {
        Self {
            base,
            sequence: 0,
            orders: BTreeMap::new(),
        }
    }

    pub fn next_token(&mut self) -> u64 {
        self.sequence += 1;
        self.base + self.sequence
    }

    /// Allocate a token and record the order as Built
    pub fn build(
        &mut self,
        side: Side,
        symbol: &str,
        route: &str,
        shares: u64,
        order_type: OrderType,
    ) -> OrderRequest {
        let token = self.next_token();
        let now = Utc::now();
        self.orders.insert(
            token,
            OrderRecord {
                token,
                order_id: None,
                symbol: symbol.trim().to_uppercase(),
                side,
                shares,
                price: limit_price(&order_type),
                route: route.trim().to_uppercase(),
                status: OrderStatus::Built,
                terminal_status: None,
                created_at: now,
                updated_at: now,
            },
        );
        OrderRequest::new(token, side, symbol, route, shares, order_type)
    }

    pub fn get(&self, token: u64) -> Option<&OrderRecord> {
        self.orders.get(&token)
    }

    pub fn by_order_id(&self, order_id: &str) -> Option<&OrderRecord> {
        self.orders
            .values()
            .find(|o| o.order_id.as_deref() == Some(order_id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrderRecord> {
        self.orders.values()
    }

    pub fn has_live_order(&self, symbol: &str, side: Side) -> bool {
        let symbol = symbol.trim().to_uppercase();
        self.orders
            .values()
            .any(|o| o.symbol == symbol && o.side == side && o.status.is_live())
    }

    /// Whether any tracked order may still be working at the terminal
    pub fn has_live_orders(&self) -> bool {
        self.orders.values().any(|o| o.status.is_live())
    }

    fn record_mut(&mut self, token: u64) -> Result<&mut OrderRecord> {
        self.orders
            .get_mut(&token)
            .ok_or_else(|| ClientError::Internal(format!("unknown order token {}", token)))
    }

    pub fn mark_sent(&mut self, token: u64) -> Result<()> {
        self.record_mut(token)?.set_status(OrderStatus::Sent);
        Ok(())
    }

    /// Apply the reply that followed a NEWORDER
    pub fn apply_ack(&mut self, token: u64, ack: &OrderAck) -> Result<OrderStatus> {
        let record = self.record_mut(token)?;
        match ack {
            OrderAck::Acknowledged { order_id, token: acked } => {
                if acked.is_some_and(|t| t != token) {
                    warn!("Ack for token {:?} while waiting on {}", acked, token);
                }
                record.order_id = Some(order_id.clone());
                record.set_status(OrderStatus::Acknowledged);
            }
            OrderAck::Rejected(reason) => {
                record.terminal_status = Some(reason.clone());
                record.set_status(OrderStatus::Rejected);
            }
            OrderAck::TimedOut => record.set_status(OrderStatus::TimedOut),
        }
        Ok(record.status)
    }

    /// Update records from `GET ORDERS` rows; returns how many matched
    pub fn apply_rows(&mut self, rows: &[OrderRow]) -> usize {
        let mut matched = 0;
        for row in rows {
            let record = self.orders.values_mut().find(|o| {
                row.token == Some(o.token) || o.order_id.as_deref() == Some(row.order_id.as_str())
            });
            let Some(record) = record else {
                continue;
            };
            matched += 1;
            record.order_id = Some(row.order_id.clone());
            record.terminal_status = Some(row.status.clone());

            let text = row.status.to_lowercase();
            let status = if text.contains("reject") {
                OrderStatus::Rejected
            } else if text.contains("cancel") {
                OrderStatus::Canceled
            } else if matches!(record.status, OrderStatus::Sent | OrderStatus::TimedOut) {
                OrderStatus::Acknowledged
            } else {
                record.status
            };
            record.set_status(status);
        }
        matched
    }

    fn live_order_id(&self, token: u64) -> Result<String> {
        let record = self
            .get(token)
            .ok_or_else(|| ClientError::Internal(format!("unknown order token {}", token)))?;
        match (&record.order_id, record.status.is_live()) {
            (Some(id), true) => Ok(id.clone()),
            _ => Err(ClientError::InvalidCommandArgs(format!(
                "order {} is not a live acknowledged order ({:?})",
                token, record.status
            ))),
        }
    }

    /// Send a built order and apply its acknowledgement
    #[instrument(skip(self, session, request), fields(token = request.token, symbol = %request.symbol))]
    pub async fn submit<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        request: &OrderRequest,
    ) -> Result<OrderStatus> {
        let neworder = command::new_order(request)?;
        self.mark_sent(request.token)?;
        let reply = session.execute(&neworder).await?;
        let status = self.apply_ack(request.token, &parse_order_ack(&reply))?;
        info!("{} -> {:?}", neworder.text(), status);
        Ok(status)
    }

    pub async fn replace<T: Transport>(
        &mut self,
        session: &mut Session<T>,
        token: u64,
        shares: u64,
        order_type: OrderType,
    ) -> Result<()> {
        let order_id = self.live_order_id(token)?;
        let replace = command::replace_order(&order_id, shares, &order_type)?;
        session.execute(&replace).await?;

        let record = self.record_mut(token)?;
        record.shares = shares;
        record.price = limit_price(&order_type);
        record.set_status(OrderStatus::Replaced);
        info!("Replaced order {} ({})", order_id, replace.text());
        Ok(())
    }

    pub async fn cancel<T: Transport>(&mut self, session: &mut Session<T>, token: u64) -> Result<()> {
        let order_id = self.live_order_id(token)?;
        session.execute(&command::cancel_order(&order_id)?).await?;
        self.record_mut(token)?.set_status(OrderStatus::Canceled);
        info!("Canceled order {}", order_id);
        Ok(())
    }

    /// Re-query the terminal's order list
    pub async fn refresh<T: Transport>(&mut self, session: &mut Session<T>) -> Result<usize> {
        let reply = session.execute(&command::query(&Query::Orders)?).await?;
        Ok(self.apply_rows(&parse_orders(&reply)))
    }
}
