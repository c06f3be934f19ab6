//! Typed views over terminal replies

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::reply::{Reply, Row};
use crate::common::types::Side;

/// Keyword a route reports when no locate is needed
pub const SHORTABLE_KEYWORD: &str = "shortable";

pub const SYMBOL_COLUMN: &[&str] = &["symb", "symbol"];
pub const QTY_COLUMN: &[&str] = &["qty", "shares"];
pub const AVG_COST_COLUMN: &[&str] = &["avgcost", "avgprice"];
pub const NOTES_COLUMN: &[&str] = &["notes", "status"];
pub const LOCATE_ID_COLUMN: &[&str] = &["id", "locateid"];
pub const ROUTE_COLUMN: &[&str] = &["route"];
pub const PRICE_COLUMN: &[&str] = &["price", "locateprice"];
pub const ACCOUNT_COLUMN: &[&str] = &["acct", "account"];

/// Header names a `GET POSITIONS` table may carry
pub const POSITION_COLUMNS: &[&[&str]] = &[
    ACCOUNT_COLUMN,
    SYMBOL_COLUMN,
    QTY_COLUMN,
    AVG_COST_COLUMN,
    NOTES_COLUMN,
];

/// Header names a `GET LOCATES` table may carry
pub const LOCATE_ORDER_COLUMNS: &[&[&str]] = &[
    LOCATE_ID_COLUMN,
    SYMBOL_COLUMN,
    QTY_COLUMN,
    ROUTE_COLUMN,
    PRICE_COLUMN,
    NOTES_COLUMN,
];

/// One route's answer to `SLPRICEINQUIRE`
#[derive(Debug, Clone, PartialEq)]
pub struct LocateInquiry {
    pub price: Decimal,
    pub shares_available: u64,
    pub status: String,
    pub shortable: bool,
}

/// Parse a locate inquiry reply
///
/// Fields are positional: price at token 3, available shares at token 4 and
/// the status text from token 6 on. Returns `None` when no line carries a
/// usable quote.
pub fn parse_locate_inquiry(reply: &Reply) -> Option<LocateInquiry> {
    for line in reply.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let status = tokens.get(6..).map(|t| t.join(" ")).unwrap_or_default();
        let price = tokens.get(3).and_then(|t| t.parse::<Decimal>().ok());
        let shares = tokens.get(4).and_then(|t| parse_shares(t));

        if status.to_lowercase().contains(SHORTABLE_KEYWORD) {
            return Some(LocateInquiry {
                price: Decimal::ZERO,
                shares_available: shares.unwrap_or(0),
                status,
                shortable: true,
            });
        }
        if let (Some(price), Some(shares_available)) = (price, shares) {
            return Some(LocateInquiry {
                price,
                shares_available,
                status,
                shortable: false,
            });
        }
        debug!("Ignoring locate line: {}", line);
    }
    None
}

/// What the terminal said about a submitted order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderAck {
    Acknowledged { order_id: String, token: Option<u64> },
    Rejected(String),
    TimedOut,
}

pub fn parse_order_ack(reply: &Reply) -> OrderAck {
    if reply.is_empty() {
        return OrderAck::TimedOut;
    }
    if reply.contains_ignore_case("rejected") {
        return OrderAck::Rejected(reply.raw().to_string());
    }
    match reply.tagged_lines("%ORDER").find(|t| t.len() > 1) {
        Some(tokens) => OrderAck::Acknowledged {
            order_id: tokens[1].to_string(),
            token: tokens.get(2).and_then(|t| t.parse().ok()),
        },
        None => {
            warn!("Order reply without %ORDER line: {}", reply.raw());
            OrderAck::TimedOut
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionRow {
    pub symbol: String,
    pub quantity: i64,
    pub average_cost: Decimal,
}

/// Rows of a `GET POSITIONS` reply
pub fn parse_positions(reply: &Reply) -> Vec<PositionRow> {
    reply
        .table_with(POSITION_COLUMNS)
        .rows()
        .filter_map(|row| {
            let position = PositionRow {
                symbol: row.get(SYMBOL_COLUMN)?.to_uppercase(),
                quantity: decimal_cell(&row, QTY_COLUMN)?.trunc().to_i64()?,
                average_cost: decimal_cell(&row, AVG_COST_COLUMN).unwrap_or_default(),
            };
            Some(position)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocateOrderRow {
    pub locate_id: Option<String>,
    pub symbol: String,
    pub shares: u64,
    pub route: Option<String>,
    pub price: Option<Decimal>,
    /// Free-text status; empty when the terminal left the column blank
    pub notes: String,
}

/// Rows of a `GET LOCATES` reply
pub fn parse_locate_orders(reply: &Reply) -> Vec<LocateOrderRow> {
    reply
        .table_with(LOCATE_ORDER_COLUMNS)
        .rows()
        .filter_map(|row| {
            Some(LocateOrderRow {
                locate_id: row.get(LOCATE_ID_COLUMN).map(str::to_string),
                symbol: row.get(SYMBOL_COLUMN)?.to_uppercase(),
                shares: row.get(QTY_COLUMN).and_then(parse_shares).unwrap_or(0),
                route: row.get(ROUTE_COLUMN).map(str::to_uppercase),
                price: decimal_cell(&row, PRICE_COLUMN),
                notes: row.get(NOTES_COLUMN).unwrap_or_default().trim().to_string(),
            })
        })
        .collect()
}

/// One `%ORDER` line from `GET ORDERS`
///
/// `%ORDER id token symb side type qty lvqty cxlqty price route status time`
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub order_id: String,
    pub token: Option<u64>,
    pub symbol: String,
    pub side: Option<Side>,
    pub shares: u64,
    pub price: Option<Decimal>,
    pub route: String,
    pub status: String,
}

pub fn parse_orders(reply: &Reply) -> Vec<OrderRow> {
    reply
        .tagged_lines("%ORDER")
        .filter_map(|tokens| {
            if tokens.len() < 12 {
                warn!("Short %ORDER line: {}", tokens.join(" "));
                return None;
            }
            Some(OrderRow {
                order_id: tokens[1].to_string(),
                token: tokens[2].parse().ok(),
                symbol: tokens[3].to_uppercase(),
                side: tokens[4].parse().ok(),
                shares: parse_shares(tokens[6]).unwrap_or(0),
                price: tokens[9].parse().ok(),
                route: tokens[10].to_uppercase(),
                status: tokens[11].to_string(),
            })
        })
        .collect()
}

/// Buying power from a `GET BP` reply (`BP <amount> ...`)
pub fn parse_buying_power(reply: &Reply) -> Option<Decimal> {
    reply
        .tokens()
        .windows(2)
        .find(|w| w[0].eq_ignore_ascii_case("BP"))
        .and_then(|w| w[1].parse().ok())
}

fn decimal_cell(row: &Row<'_>, aliases: &[&str]) -> Option<Decimal> {
    row.get(aliases).and_then(|v| v.parse().ok())
}

fn parse_shares(token: &str) -> Option<u64> {
    token
        .parse::<Decimal>()
        .ok()
        .filter(|d| !d.is_sign_negative())
        .and_then(|d| d.trunc().to_u64())
}
