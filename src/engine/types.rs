use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of the locate order the terminal holds for a symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub enum LocateOrderStatus {
    #[default]
    NoLocateOrder,
    Rejected,
    Pending,
    Accepted,
}

impl LocateOrderStatus {
    /// Classify the free-text notes column of a locate order row
    pub fn from_notes(notes: &str) -> Self {
        let notes = notes.trim().to_lowercase();
        if notes.is_empty() {
            LocateOrderStatus::NoLocateOrder
        } else if ["accept", "executed", "filled"].iter().any(|k| notes.contains(k)) {
            LocateOrderStatus::Accepted
        } else if ["reject", "cancel", "expired"].iter().any(|k| notes.contains(k)) {
            LocateOrderStatus::Rejected
        } else {
            LocateOrderStatus::Pending
        }
    }
}

impl std::fmt::Display for LocateOrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LocateOrderStatus::NoLocateOrder => write!(f, "NoLocateOrder"),
            LocateOrderStatus::Rejected => write!(f, "Rejected"),
            LocateOrderStatus::Pending => write!(f, "Pending"),
            LocateOrderStatus::Accepted => write!(f, "Accepted"),
        }
    }
}

/// A ticker handed over by the upstream candidate feed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(alias = "symbol")]
    pub ticker: String,
    /// When absent, notional is distributed from the portfolio value
    #[serde(default)]
    pub target_notional: Option<Decimal>,
    #[serde(default)]
    pub last_bid: Option<Decimal>,
    #[serde(default)]
    pub last_ask: Option<Decimal>,
    #[serde(default)]
    pub volume: Option<Decimal>,
}

impl Candidate {
    pub fn new(ticker: impl Into<String>, target_notional: Decimal) -> Self {
        Self {
            ticker: ticker.into(),
            target_notional: Some(target_notional),
            last_bid: None,
            last_ask: None,
            volume: None,
        }
    }

    pub fn with_quote(mut self, bid: Decimal, ask: Decimal) -> Self {
        self.last_bid = Some(bid);
        self.last_ask = Some(ask);
        self
    }
}

/// Outcome of a locate route scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocateQuote {
    pub price: Decimal,
    pub shares_available: u64,
    pub total_cost: Decimal,
    pub route: Option<String>,
    pub available: bool,
    /// No locate needed; the symbol can be shorted as is
    pub shortable: bool,
}

/// Everything known about one symbol during a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerState {
    pub symbol: String,
    /// Came from the candidate feed rather than the position list
    pub is_candidate: bool,
    pub last_bid: Decimal,
    pub last_ask: Decimal,
    pub volume: Decimal,
    pub target_notional: Decimal,
    pub shares_to_locate: u64,
    pub locate_price: Decimal,
    pub total_locate_cost: Decimal,
    pub locate_route: Option<String>,
    pub locate_available: bool,
    pub shortable: bool,
    pub locate_order_status: LocateOrderStatus,
    pub locate_order_id: Option<String>,
    /// Literal notes text from the last locate refresh
    pub locate_order_notes: String,
    pub locate_shares_located: u64,
    /// Signed; short positions are negative
    pub shares_in_position: i64,
    pub average_cost: Decimal,
    pub in_position: bool,
    pub pre_locate_check_passed: bool,
    pub pre_trade_check_passed: bool,
    pub shares_to_short: u64,
}

impl TickerState {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            is_candidate: false,
            last_bid: Decimal::ZERO,
            last_ask: Decimal::ZERO,
            volume: Decimal::ZERO,
            target_notional: Decimal::ZERO,
            shares_to_locate: 0,
            locate_price: Decimal::ZERO,
            total_locate_cost: Decimal::ZERO,
            locate_route: None,
            locate_available: false,
            shortable: false,
            locate_order_status: LocateOrderStatus::NoLocateOrder,
            locate_order_id: None,
            locate_order_notes: String::new(),
            locate_shares_located: 0,
            shares_in_position: 0,
            average_cost: Decimal::ZERO,
            in_position: false,
            pre_locate_check_passed: false,
            pre_trade_check_passed: false,
            shares_to_short: 0,
        }
    }

    pub fn locate_accepted(&self) -> bool {
        self.locate_order_status == LocateOrderStatus::Accepted
    }

    /// Forget the last route scan before a fresh inquiry
    pub fn reset_locate_quote(&mut self) {
        self.locate_available = false;
        self.shortable = false;
        self.locate_price = Decimal::ZERO;
        self.total_locate_cost = Decimal::ZERO;
        self.locate_route = None;
    }

    pub fn apply_locate_quote(&mut self, quote: &LocateQuote) {
        self.locate_available = quote.available;
        self.shortable = quote.shortable;
        self.locate_price = quote.price;
        self.total_locate_cost = quote.total_cost;
        self.locate_route = quote.route.clone();
    }
}

/// Per-symbol state, ordered by symbol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickerTable {
    tickers: BTreeMap<String, TickerState>,
}

impl TickerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing state for `symbol`, or a freshly inserted default row
    pub fn upsert(&mut self, symbol: &str) -> &mut TickerState {
        let symbol = symbol.trim().to_uppercase();
        self.tickers
            .entry(symbol.clone())
            .or_insert_with(|| TickerState::new(symbol))
    }

    /// Add a candidate, keeping whatever the ledger already knows about it
    pub fn insert_candidate(&mut self, candidate: &Candidate, target_notional: Decimal) {
        let state = self.upsert(&candidate.ticker);
        state.is_candidate = true;
        state.target_notional = target_notional;
        if let Some(bid) = candidate.last_bid {
            state.last_bid = bid;
        }
        if let Some(ask) = candidate.last_ask {
            state.last_ask = ask;
        }
        if let Some(volume) = candidate.volume {
            state.volume = volume;
        }
    }

    pub fn get(&self, symbol: &str) -> Option<&TickerState> {
        self.tickers.get(&symbol.trim().to_uppercase())
    }

    pub fn get_mut(&mut self, symbol: &str) -> Option<&mut TickerState> {
        self.tickers.get_mut(&symbol.trim().to_uppercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &TickerState> {
        self.tickers.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut TickerState> {
        self.tickers.values_mut()
    }

    pub fn symbols(&self) -> Vec<String> {
        self.tickers.keys().cloned().collect()
    }

    pub fn candidate_symbols(&self) -> Vec<String> {
        self.iter()
            .filter(|s| s.is_candidate)
            .map(|s| s.symbol.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    /// Returns false when the symbol is unknown
    pub fn reset_locate_quote(&mut self, symbol: &str) -> bool {
        match self.get_mut(symbol) {
            Some(state) => {
                state.reset_locate_quote();
                true
            }
            None => false,
        }
    }
}
