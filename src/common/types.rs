//! Shared types used across the protocol and engine layers

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::errors::{ClientError, Result};

/// Order side as the terminal spells it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
    /// Short sale; requires a locate or an easy-to-borrow symbol
    ShortSell,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "B"),
            Side::Sell => write!(f, "S"),
            Side::ShortSell => write!(f, "SS"),
        }
    }
}

impl FromStr for Side {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "B" | "BUY" => Ok(Side::Buy),
            "S" | "SELL" => Ok(Side::Sell),
            "SS" | "SHORT" | "SHORTSELL" => Ok(Side::ShortSell),
            other => Err(ClientError::InvalidCommandArgs(format!(
                "unknown side: {}",
                other
            ))),
        }
    }
}

/// Side of a single leg in a complex (multi-leg) order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LegSide {
    BuyToOpen,
    BuyToClose,
    SellToOpen,
    SellToClose,
}

impl std::fmt::Display for LegSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LegSide::BuyToOpen => write!(f, "BO"),
            LegSide::BuyToClose => write!(f, "BC"),
            LegSide::SellToOpen => write!(f, "SO"),
            LegSide::SellToClose => write!(f, "SC"),
        }
    }
}

/// Top-of-book snapshot parsed from a Lv1 reply
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Quote {
    pub bid: Option<Decimal>,
    pub ask: Option<Decimal>,
}

impl Quote {
    /// Parse `B:<price>` and `A:<price>` tokens out of Lv1 text
    pub fn from_lv1(text: &str) -> Self {
        let mut quote = Quote::default();
        for token in text.split_whitespace() {
            if let Some(value) = token.strip_prefix("B:") {
                if quote.bid.is_none() {
                    quote.bid = value.parse().ok();
                }
            } else if let Some(value) = token.strip_prefix("A:") {
                if quote.ask.is_none() {
                    quote.ask = value.parse().ok();
                }
            }
        }
        quote
    }

    pub fn is_complete(&self) -> bool {
        self.bid.is_some() && self.ask.is_some()
    }
}

/// Render a decimal the way the terminal expects it (`20.30` -> `20.3`)
pub fn format_decimal(value: Decimal) -> String {
    value.normalize().to_string()
}
