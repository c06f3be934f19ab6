//! Trading engine layered on a terminal session
//!
//! # Cycle
//!
//! ```text
//! refresh locates ─► inquire locates (first cycle) ─► shares to short
//!        ─► pre-locate gate ─► refresh positions ─► pre-trade gate
//!        ─► [confirm] locate orders + accept offers
//!        ─► refresh locates ─► pre-trade gate
//!        ─► [confirm] short sale at the offer
//! ```
//!
//! # Components
//!
//! - [`TickerTable`]: per-symbol [`TickerState`], ordered by symbol
//! - [`LocateRouter`]: cheapest route that covers the full size
//! - [`TradeGate`]: pre-locate and pre-trade checks
//! - [`ledger`]: position and locate reconciliation
//! - [`OrderTracker`]: client tokens and order records
//! - [`TradingWorkflow`]: drives the cycle over one session

pub mod gate;
pub mod ledger;
pub mod orders;
pub mod router;
pub mod sizing;
pub mod types;
pub mod workflow;

pub use gate::{GateFailure, TradeGate};
pub use ledger::{refresh_locate_orders, refresh_positions};
pub use orders::{OrderRecord, OrderStatus, OrderTracker};
pub use router::{LocateRouter, RouteScan, UNAVAILABLE_PRICE};
pub use types::{Candidate, LocateOrderStatus, LocateQuote, TickerState, TickerTable};
pub use workflow::{CycleReport, TradingWorkflow};
