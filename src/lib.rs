//! DasLocateTrader Library
//!
//! A Rust library for automating short-sale locates and orders against the
//! DAS Trader command API over its unframed line protocol.

pub mod common;
pub mod config;
pub mod das;
pub mod engine;

// Re-export commonly used types
pub use common::errors::{ClientError, Result};
pub use common::traits::{AutoApprove, Confirm, Transport};
pub use common::types::{LegSide, Quote, Side};
pub use config::types::{AppConfig, Credentials, SettleConfig, TerminalConfig, TradingConfig};
pub use das::{Command, Reply, ScriptedTransport, Session, SessionState, TcpTransport};

// Engine types
pub use engine::{
    Candidate, CycleReport, LocateOrderStatus, LocateQuote, LocateRouter, OrderStatus,
    OrderTracker, TickerState, TickerTable, TradeGate, TradingWorkflow,
};
