//! Outbound command construction for the DAS command API
//!
//! Every builder takes typed arguments and either returns a canonical
//! [`Command`] or fails with [`ClientError::InvalidCommandArgs`] before any
//! bytes hit the wire. Symbols, sides and routes are upper-cased; numbers are
//! rendered normalised; `tag=value` suffixes keep their spelling.

use chrono::{Duration as ChronoDuration, NaiveDate};
use rust_decimal::Decimal;
use std::fmt;
use std::time::Duration;

use crate::common::errors::{ClientError, Result};
use crate::common::types::{format_decimal, LegSide, Side};
use crate::config::types::{Credentials, SettleConfig};

/// Line terminator for every command
pub const LINE_ENDING: &str = "\r\n";

/// How long the session waits after writing a command before draining
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SettleClass {
    Minimal,
    Query,
    Extended,
}

impl SettleClass {
    pub fn delay(self, settle: &SettleConfig) -> Duration {
        match self {
            SettleClass::Minimal => Duration::from_micros(settle.minimal_us),
            SettleClass::Query => Duration::from_millis(settle.query_ms),
            SettleClass::Extended => Duration::from_millis(settle.extended_ms),
        }
    }
}

/// A single command line: verb plus positional tokens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    verb: String,
    args: Vec<String>,
}

impl Command {
    fn new(verb: &str, args: Vec<String>) -> Self {
        Self {
            verb: verb.to_string(),
            args,
        }
    }

    pub fn verb(&self) -> &str {
        &self.verb
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Command text without the line ending
    pub fn text(&self) -> String {
        if self.args.is_empty() {
            self.verb.clone()
        } else {
            format!("{} {}", self.verb, self.args.join(" "))
        }
    }

    /// Bytes as written to the stream
    pub fn to_wire(&self) -> Vec<u8> {
        let mut line = self.text();
        line.push_str(LINE_ENDING);
        line.into_bytes()
    }

    /// Text safe to log (LOGIN password masked)
    pub fn redacted(&self) -> String {
        if self.verb == "LOGIN" && self.args.len() >= 2 {
            let mut args = self.args.clone();
            args[1] = "***".to_string();
            return format!("{} {}", self.verb, args.join(" "));
        }
        self.text()
    }

    pub fn settle_class(&self) -> SettleClass {
        let verb = self.verb.as_str();
        match verb {
            "REPLACE" | "COMPLEXORDER" => SettleClass::Extended,
            "GET" | "NEWORDER" | "POSREFRESH" => SettleClass::Query,
            "SB" if self.args.iter().any(|a| {
                matches!(a.as_str(), "DAYCHART" | "MINCHART" | "Lv1" | "Lv2")
            }) =>
            {
                SettleClass::Query
            }
            _ if verb.starts_with("SL") => SettleClass::Query,
            _ => SettleClass::Minimal,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.redacted())
    }
}

// ============================================================================
// Argument validation
// ============================================================================

/// Upper-case and validate a symbol (option legs like `+MSFT^E8U400` allowed)
pub fn normalize_symbol(symbol: &str) -> Result<String> {
    let symbol = symbol.trim();
    let valid = !symbol.is_empty()
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '*' | '+' | '/' | '-'));
    if !valid {
        return Err(ClientError::InvalidCommandArgs(format!(
            "invalid symbol: {:?}",
            symbol
        )));
    }
    Ok(symbol.to_uppercase())
}

/// Upper-case and validate a route name
pub fn normalize_route(route: &str) -> Result<String> {
    let route = route.trim();
    if route.is_empty() || !route.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ClientError::InvalidCommandArgs(format!(
            "invalid route: {:?}",
            route
        )));
    }
    Ok(route.to_uppercase())
}

fn require_shares(shares: u64) -> Result<String> {
    if shares == 0 {
        return Err(ClientError::InvalidCommandArgs(
            "share count must be positive".to_string(),
        ));
    }
    Ok(shares.to_string())
}

fn require_price(label: &str, price: Decimal) -> Result<String> {
    if price <= Decimal::ZERO {
        return Err(ClientError::InvalidCommandArgs(format!(
            "{} must be positive, got {}",
            label, price
        )));
    }
    Ok(format_decimal(price))
}

fn require_id(label: &str, id: &str) -> Result<String> {
    let id = id.trim();
    if id.is_empty() || id.contains(char::is_whitespace) {
        return Err(ClientError::InvalidCommandArgs(format!(
            "invalid {}: {:?}",
            label, id
        )));
    }
    Ok(id.to_string())
}

fn parse_shares_token(token: &str) -> Result<u64> {
    token.parse::<u64>().map_err(|_| {
        ClientError::InvalidCommandArgs(format!("share count is not an integer: {:?}", token))
    })
}

fn parse_price_token(token: &str) -> Result<Decimal> {
    token.parse::<Decimal>().map_err(|_| {
        ClientError::InvalidCommandArgs(format!("price is not numeric: {:?}", token))
    })
}

// ============================================================================
// Orders
// ============================================================================

/// Price shape shared by NEWORDER and REPLACE
#[derive(Debug, Clone, PartialEq)]
pub enum OrderType {
    Limit { price: Decimal },
    Market,
    StopLimit { stop: Decimal, limit: Decimal },
    StopMarket { stop: Decimal },
    StopRange { low: Decimal, high: Decimal },
    StopRangeMarket { low: Decimal, high: Decimal },
    StopTrailing { trail: Decimal },
}

impl OrderType {
    /// Tokens that follow the share count
    fn price_tokens(&self) -> Result<Vec<String>> {
        let tokens = match self {
            OrderType::Limit { price } => vec![require_price("price", *price)?],
            OrderType::Market => vec!["MKT".to_string()],
            OrderType::StopLimit { stop, limit } => vec![
                "STOPLMT".to_string(),
                require_price("stop price", *stop)?,
                require_price("limit price", *limit)?,
            ],
            OrderType::StopMarket { stop } => {
                vec!["STOPMKT".to_string(), require_price("stop price", *stop)?]
            }
            OrderType::StopRange { low, high } | OrderType::StopRangeMarket { low, high } => {
                if low >= high {
                    return Err(ClientError::InvalidCommandArgs(format!(
                        "stop range low {} must be below high {}",
                        low, high
                    )));
                }
                let keyword = if matches!(self, OrderType::StopRange { .. }) {
                    "STOPRANGE"
                } else {
                    "STOPRANGEMKT"
                };
                vec![
                    keyword.to_string(),
                    require_price("low price", *low)?,
                    require_price("high price", *high)?,
                ]
            }
            OrderType::StopTrailing { trail } => vec![
                "STOPTRAILING".to_string(),
                require_price("trail amount", *trail)?,
            ],
        };
        Ok(tokens)
    }

    fn is_limit(&self) -> bool {
        matches!(self, OrderType::Limit { .. })
    }
}

/// Operator-facing order shapes, each with a fixed positional argument count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderShape {
    Limit,
    Market,
    StopLimit,
    StopMarket,
    StopRange,
    StopRangeMarket,
    StopTrailing,
}

impl OrderShape {
    /// Number of positional tokens: side, symbol, shares, then prices
    pub fn arity(self) -> usize {
        match self {
            OrderShape::Market => 3,
            OrderShape::Limit | OrderShape::StopMarket | OrderShape::StopTrailing => 4,
            OrderShape::StopLimit | OrderShape::StopRange | OrderShape::StopRangeMarket => 5,
        }
    }
}

/// A fully specified equity order
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRequest {
    pub token: u64,
    pub side: Side,
    pub symbol: String,
    pub route: String,
    pub shares: u64,
    pub order_type: OrderType,
    /// Display= size; only emitted on limit orders
    pub display: Option<u64>,
    pub time_in_force: Option<String>,
}

impl OrderRequest {
    pub fn new(
        token: u64,
        side: Side,
        symbol: &str,
        route: &str,
        shares: u64,
        order_type: OrderType,
    ) -> Self {
        Self {
            token,
            side,
            symbol: symbol.to_string(),
            route: route.to_string(),
            shares,
            order_type,
            display: None,
            time_in_force: None,
        }
    }

    pub fn with_display(mut self, display: u64) -> Self {
        self.display = Some(display);
        self
    }

    pub fn with_time_in_force(mut self, tif: &str) -> Self {
        self.time_in_force = Some(tif.to_string());
        self
    }

    /// Build from operator tokens such as `["b", "hmc", "15", "20.3"]`
    ///
    /// The token count must match the shape's arity exactly.
    pub fn from_tokens(
        shape: OrderShape,
        token: u64,
        route: &str,
        tokens: &[&str],
    ) -> Result<Self> {
        if tokens.len() != shape.arity() {
            return Err(ClientError::InvalidCommandArgs(format!(
                "{:?} order takes {} tokens (side symbol shares ...), got {}",
                shape,
                shape.arity(),
                tokens.len()
            )));
        }
        let side: Side = tokens[0].parse()?;
        let shares = parse_shares_token(tokens[2])?;
        let prices = tokens[3..]
            .iter()
            .map(|t| parse_price_token(t))
            .collect::<Result<Vec<_>>>()?;

        let order_type = match shape {
            OrderShape::Limit => OrderType::Limit { price: prices[0] },
            OrderShape::Market => OrderType::Market,
            OrderShape::StopLimit => OrderType::StopLimit {
                stop: prices[0],
                limit: prices[1],
            },
            OrderShape::StopMarket => OrderType::StopMarket { stop: prices[0] },
            OrderShape::StopRange => OrderType::StopRange {
                low: prices[0],
                high: prices[1],
            },
            OrderShape::StopRangeMarket => OrderType::StopRangeMarket {
                low: prices[0],
                high: prices[1],
            },
            OrderShape::StopTrailing => OrderType::StopTrailing { trail: prices[0] },
        };

        let request = OrderRequest::new(token, side, tokens[1], route, shares, order_type);
        Ok(if shape == OrderShape::Limit {
            request.with_display(100)
        } else {
            request
        })
    }
}

/// `NEWORDER <token> <side> <symbol> <route> <shares> <price tokens> [tags]`
pub fn new_order(request: &OrderRequest) -> Result<Command> {
    let mut args = vec![
        request.token.to_string(),
        request.side.to_string(),
        normalize_symbol(&request.symbol)?,
        normalize_route(&request.route)?,
        require_shares(request.shares)?,
    ];
    args.extend(request.order_type.price_tokens()?);
    if let Some(display) = request.display {
        if request.order_type.is_limit() {
            args.push(format!("Display={}", display));
        }
    }
    if let Some(tif) = &request.time_in_force {
        args.push(format!("TIF={}", require_id("time in force", tif)?.to_uppercase()));
    }
    Ok(Command::new("NEWORDER", args))
}

/// `REPLACE <order_id> <shares> <price tokens>`
pub fn replace_order(order_id: &str, shares: u64, order_type: &OrderType) -> Result<Command> {
    let mut args = vec![require_id("order id", order_id)?, require_shares(shares)?];
    args.extend(order_type.price_tokens()?);
    Ok(Command::new("REPLACE", args))
}

/// `CANCEL <order_id>`
pub fn cancel_order(order_id: &str) -> Result<Command> {
    Ok(Command::new("CANCEL", vec![require_id("order id", order_id)?]))
}

/// `CANCEL ALL`
pub fn cancel_all() -> Command {
    Command::new("CANCEL", vec!["ALL".to_string()])
}

/// One leg of a complex order
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexLeg {
    pub symbol: String,
    pub token: u64,
    pub side: LegSide,
    pub shares: u64,
}

/// Multi-leg order
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexOrder {
    pub route: String,
    pub time_in_force: String,
    pub net_price: Decimal,
    pub all_or_none: bool,
    pub legs: Vec<ComplexLeg>,
}

/// `COMPLEXORDER Route=.. TIF=.. NetPrice=.. AON=.. (LegSym=.. LegToken=.. Side=.. Share=..)+`
pub fn complex_order(order: &ComplexOrder) -> Result<Command> {
    if order.legs.len() < 2 {
        return Err(ClientError::InvalidCommandArgs(format!(
            "complex order needs at least two legs, got {}",
            order.legs.len()
        )));
    }
    let mut args = vec![
        format!("Route={}", normalize_route(&order.route)?),
        format!("TIF={}", require_id("time in force", &order.time_in_force)?.to_uppercase()),
        format!("NetPrice={}", require_price("net price", order.net_price)?),
        format!("AON={}", if order.all_or_none { "Y" } else { "N" }),
    ];
    for leg in &order.legs {
        args.push(format!("LegSym={}", normalize_symbol(&leg.symbol)?));
        args.push(format!("LegToken={}", leg.token));
        args.push(format!("Side={}", leg.side));
        args.push(format!("Share={}", require_shares(leg.shares)?));
    }
    Ok(Command::new("COMPLEXORDER", args))
}

// ============================================================================
// Short locates
// ============================================================================

/// Accept or reject a locate offer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OfferAction {
    Accept,
    Reject,
}

impl fmt::Display for OfferAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfferAction::Accept => write!(f, "Accept"),
            OfferAction::Reject => write!(f, "Reject"),
        }
    }
}

/// `SLPRICEINQUIRE <symbol> <shares> <route>`
pub fn locate_inquire(symbol: &str, shares: u64, route: &str) -> Result<Command> {
    Ok(Command::new(
        "SLPRICEINQUIRE",
        vec![
            normalize_symbol(symbol)?,
            require_shares(shares)?,
            normalize_route(route)?,
        ],
    ))
}

/// `SLNEWORDER <symbol> <shares> <route>`
pub fn locate_new_order(symbol: &str, shares: u64, route: &str) -> Result<Command> {
    Ok(Command::new(
        "SLNEWORDER",
        vec![
            normalize_symbol(symbol)?,
            require_shares(shares)?,
            normalize_route(route)?,
        ],
    ))
}

/// `SLCANCELORDER <locate_id>`
pub fn locate_cancel(locate_id: &str) -> Result<Command> {
    Ok(Command::new(
        "SLCANCELORDER",
        vec![require_id("locate id", locate_id)?],
    ))
}

/// `SLOFFEROPERATION <locate_id> Accept|Reject`
pub fn locate_offer(locate_id: &str, action: OfferAction) -> Result<Command> {
    Ok(Command::new(
        "SLOFFEROPERATION",
        vec![require_id("locate id", locate_id)?, action.to_string()],
    ))
}

// ============================================================================
// Subscriptions and charts
// ============================================================================

/// Market data granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    Lv1,
    Lv2,
    TimeAndSales,
}

impl Level {
    pub fn parse(input: &str) -> Result<Self> {
        match input.trim().to_uppercase().as_str() {
            "1" | "LV1" | "LEVEL1" => Ok(Level::Lv1),
            "2" | "LV2" | "LEVEL2" => Ok(Level::Lv2),
            "3" | "LV3" | "LEVEL3" | "TMS" | "T" => Ok(Level::TimeAndSales),
            other => Err(ClientError::InvalidCommandArgs(format!(
                "unknown level {:?}; expected LV1, LV2 or LV3",
                other
            ))),
        }
    }

    pub fn as_wire(self) -> &'static str {
        match self {
            Level::Lv1 => "Lv1",
            Level::Lv2 => "Lv2",
            Level::TimeAndSales => "tms",
        }
    }
}

/// What a streaming subscription is attached to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Subscription {
    Symbol { symbol: String, level: Level },
    TopList,
}

impl Subscription {
    pub fn symbol(symbol: &str, level: Level) -> Result<Self> {
        Ok(Subscription::Symbol {
            symbol: normalize_symbol(symbol)?,
            level,
        })
    }

    pub fn subscribe_command(&self) -> Command {
        match self {
            Subscription::Symbol { symbol, level } => Command::new(
                "SB",
                vec![symbol.clone(), level.as_wire().to_string()],
            ),
            Subscription::TopList => Command::new("SB", vec!["TOPLIST".to_string()]),
        }
    }

    pub fn unsubscribe_command(&self) -> Command {
        match self {
            Subscription::Symbol { symbol, level } => Command::new(
                "UNSB",
                vec![symbol.clone(), level.as_wire().to_string()],
            ),
            Subscription::TopList => Command::new("UNSB", vec!["TOPLIST".to_string()]),
        }
    }
}

/// `SB <symbol> <level>`
pub fn subscribe(symbol: &str, level: Level) -> Result<Command> {
    Ok(Subscription::symbol(symbol, level)?.subscribe_command())
}

/// `UNSB <symbol> <level>`
pub fn unsubscribe(symbol: &str, level: Level) -> Result<Command> {
    Ok(Subscription::symbol(symbol, level)?.unsubscribe_command())
}

/// Unsubscribe a symbol from every level
pub fn unsubscribe_all(symbol: &str) -> Result<Vec<Command>> {
    [Level::Lv1, Level::Lv2, Level::TimeAndSales]
        .into_iter()
        .map(|level| unsubscribe(symbol, level))
        .collect()
}

/// `ReturnFullLv1 YES|NO`
pub fn return_full_lv1(enabled: bool) -> Command {
    let flag = if enabled { "YES" } else { "NO" };
    Command::new("ReturnFullLv1", vec![flag.to_string()])
}

fn chart_date(reference: NaiveDate, days_back: i64) -> String {
    (reference - ChronoDuration::days(days_back))
        .format("%Y/%m/%d")
        .to_string()
}

/// `SB <symbol> DAYCHART <ref-50d> <ref-1d>`
pub fn day_chart(symbol: &str, reference: NaiveDate) -> Result<Command> {
    Ok(Command::new(
        "SB",
        vec![
            normalize_symbol(symbol)?,
            "DAYCHART".to_string(),
            chart_date(reference, 50),
            chart_date(reference, 1),
        ],
    ))
}

/// `SB <symbol> MINCHART <ref-8d>-00:00 <ref-7d>-00:00`
pub fn minute_chart(symbol: &str, reference: NaiveDate) -> Result<Command> {
    Ok(Command::new(
        "SB",
        vec![
            normalize_symbol(symbol)?,
            "MINCHART".to_string(),
            format!("{}-00:00", chart_date(reference, 8)),
            format!("{}-00:00", chart_date(reference, 7)),
        ],
    ))
}

// ============================================================================
// Account queries and session control
// ============================================================================

/// `GET ...` queries
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    BuyingPower,
    Positions,
    Orders,
    Trades,
    RouteStatus,
    Locates,
    AccountInfo,
    LimitUpDown(String),
    SymbolStatus(String),
    ShortInfo(String),
}

pub fn query(query: &Query) -> Result<Command> {
    let args = match query {
        Query::BuyingPower => vec!["BP".to_string()],
        Query::Positions => vec!["POSITIONS".to_string()],
        Query::Orders => vec!["ORDERS".to_string()],
        Query::Trades => vec!["TRADES".to_string()],
        Query::RouteStatus => vec!["ROUTESTATUS".to_string()],
        Query::Locates => vec!["LOCATES".to_string()],
        Query::AccountInfo => vec!["AccountInfo".to_string()],
        Query::LimitUpDown(symbol) => vec!["LDLU".to_string(), normalize_symbol(symbol)?],
        Query::SymbolStatus(symbol) => vec!["SymStatus".to_string(), normalize_symbol(symbol)?],
        Query::ShortInfo(symbol) => vec!["SHORTINFO".to_string(), normalize_symbol(symbol)?],
    };
    Ok(Command::new("GET", args))
}

/// `POSREFRESH`
pub fn position_refresh() -> Command {
    Command::new("POSREFRESH", Vec::new())
}

/// `LOGIN <user> <password> <account>`
pub fn login(credentials: &Credentials) -> Result<Command> {
    Ok(Command::new(
        "LOGIN",
        vec![
            require_id("user", &credentials.user)?,
            require_id("password", &credentials.password)?,
            require_id("account", &credentials.account)?,
        ],
    ))
}

/// `QUIT`
pub fn quit() -> Command {
    Command::new("QUIT", Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn test_limit_order_from_operator_tokens() {
        let request =
            OrderRequest::from_tokens(OrderShape::Limit, 42, "SMAT", &["b", "hmc", "15", "20.3"])
                .unwrap();
        let command = new_order(&request).unwrap();
        assert_eq!(command.text(), "NEWORDER 42 B HMC SMAT 15 20.3 Display=100");
        assert_eq!(command.to_wire(), b"NEWORDER 42 B HMC SMAT 15 20.3 Display=100\r\n");
    }

    #[test]
    fn test_route_sits_after_symbol_for_every_shape() {
        let cases: Vec<(OrderShape, Vec<&str>, &str)> = vec![
            (OrderShape::Market, vec!["b", "goog", "100"], "NEWORDER 7 B GOOG SMAT 100 MKT"),
            (
                OrderShape::StopLimit,
                vec!["b", "tsla", "100", "150", "145.6"],
                "NEWORDER 7 B TSLA SMAT 100 STOPLMT 150 145.6",
            ),
            (
                OrderShape::StopMarket,
                vec!["b", "msft", "100", "205.5"],
                "NEWORDER 7 B MSFT SMAT 100 STOPMKT 205.5",
            ),
            (
                OrderShape::StopRange,
                vec!["b", "msft", "100", "205.5", "205.9"],
                "NEWORDER 7 B MSFT SMAT 100 STOPRANGE 205.5 205.9",
            ),
            (
                OrderShape::StopRangeMarket,
                vec!["b", "msft", "100", "205.5", "205.9"],
                "NEWORDER 7 B MSFT SMAT 100 STOPRANGEMKT 205.5 205.9",
            ),
            (
                OrderShape::StopTrailing,
                vec!["s", "msft", "100", "0.2"],
                "NEWORDER 7 S MSFT SMAT 100 STOPTRAILING 0.2",
            ),
        ];
        for (shape, tokens, expected) in cases {
            let request = OrderRequest::from_tokens(shape, 7, "smat", &tokens).unwrap();
            let command = new_order(&request).unwrap();
            assert_eq!(command.text(), expected, "shape {:?}", shape);
            assert_eq!(command.args()[3], "SMAT");
        }
    }

    #[test]
    fn test_wrong_token_count_rejected() {
        let err = OrderRequest::from_tokens(OrderShape::Limit, 1, "SMAT", &["b", "hmc", "15"])
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidCommandArgs(_)));

        let err = OrderRequest::from_tokens(
            OrderShape::Market,
            1,
            "SMAT",
            &["b", "hmc", "15", "20.3"],
        )
        .unwrap_err();
        assert!(matches!(err, ClientError::InvalidCommandArgs(_)));
    }

    #[test]
    fn test_malformed_values_rejected() {
        assert!(
            OrderRequest::from_tokens(OrderShape::Limit, 1, "SMAT", &["x", "hmc", "15", "20"])
                .is_err()
        );
        assert!(
            OrderRequest::from_tokens(OrderShape::Limit, 1, "SMAT", &["b", "hmc", "1.5", "20"])
                .is_err()
        );
        let zero_shares = OrderRequest::new(
            1,
            Side::Buy,
            "HMC",
            "SMAT",
            0,
            OrderType::Limit { price: dec!(20) },
        );
        assert!(new_order(&zero_shares).is_err());
        let bad_symbol = OrderRequest::new(1, Side::Buy, "HM C", "SMAT", 5, OrderType::Market);
        assert!(new_order(&bad_symbol).is_err());
        let inverted = OrderType::StopRange {
            low: dec!(10),
            high: dec!(9),
        };
        assert!(replace_order("123", 10, &inverted).is_err());
    }

    #[test]
    fn test_tif_tag_appended() {
        let request = OrderRequest::new(
            9,
            Side::ShortSell,
            "gme",
            "smat",
            200,
            OrderType::Limit { price: dec!(25.10) },
        )
        .with_display(100)
        .with_time_in_force("day");
        assert_eq!(
            new_order(&request).unwrap().text(),
            "NEWORDER 9 SS GME SMAT 200 25.1 Display=100 TIF=DAY"
        );
    }

    #[test]
    fn test_replace_and_cancel() {
        let replace =
            replace_order("5521", 100, &OrderType::StopLimit { stop: dec!(10), limit: dec!(9.5) })
                .unwrap();
        assert_eq!(replace.text(), "REPLACE 5521 100 STOPLMT 10 9.5");
        assert_eq!(replace.settle_class(), SettleClass::Extended);
        assert_eq!(cancel_order("5521").unwrap().text(), "CANCEL 5521");
        assert_eq!(cancel_all().text(), "CANCEL ALL");
        assert!(cancel_order("").is_err());
    }

    #[test]
    fn test_complex_order() {
        let order = ComplexOrder {
            route: "smatl".to_string(),
            time_in_force: "day".to_string(),
            net_price: dec!(0.50),
            all_or_none: true,
            legs: vec![
                ComplexLeg {
                    symbol: "+MSFT^E8U400".to_string(),
                    token: 11,
                    side: LegSide::BuyToOpen,
                    shares: 1,
                },
                ComplexLeg {
                    symbol: "+MSFT*E8U400".to_string(),
                    token: 10,
                    side: LegSide::SellToOpen,
                    shares: 1,
                },
            ],
        };
        let command = complex_order(&order).unwrap();
        assert_eq!(
            command.text(),
            "COMPLEXORDER Route=SMATL TIF=DAY NetPrice=0.5 AON=Y \
             LegSym=+MSFT^E8U400 LegToken=11 Side=BO Share=1 \
             LegSym=+MSFT*E8U400 LegToken=10 Side=SO Share=1"
        );
        assert_eq!(command.settle_class(), SettleClass::Extended);

        let single = ComplexOrder {
            legs: order.legs[..1].to_vec(),
            ..order
        };
        assert!(complex_order(&single).is_err());
    }

    #[test]
    fn test_locate_commands() {
        assert_eq!(
            locate_inquire("fld", 100, "testsl").unwrap().text(),
            "SLPRICEINQUIRE FLD 100 TESTSL"
        );
        assert_eq!(
            locate_new_order("fld", 300, "TESTSL").unwrap().text(),
            "SLNEWORDER FLD 300 TESTSL"
        );
        assert_eq!(locate_cancel("L77").unwrap().text(), "SLCANCELORDER L77");
        assert_eq!(
            locate_offer("L77", OfferAction::Accept).unwrap().text(),
            "SLOFFEROPERATION L77 Accept"
        );
        assert_eq!(
            locate_offer("L77", OfferAction::Reject).unwrap().text(),
            "SLOFFEROPERATION L77 Reject"
        );
        assert!(locate_inquire("fld", 0, "TESTSL").is_err());
    }

    #[test]
    fn test_levels_and_subscriptions() {
        assert_eq!(Level::parse("lv2").unwrap(), Level::Lv2);
        assert_eq!(Level::parse("T").unwrap(), Level::TimeAndSales);
        assert!(Level::parse("level9").is_err());

        assert_eq!(subscribe("aapl", Level::Lv1).unwrap().text(), "SB AAPL Lv1");
        assert_eq!(
            unsubscribe("aapl", Level::TimeAndSales).unwrap().text(),
            "UNSB AAPL tms"
        );
        let all: Vec<String> = unsubscribe_all("aapl")
            .unwrap()
            .iter()
            .map(Command::text)
            .collect();
        assert_eq!(all, vec!["UNSB AAPL Lv1", "UNSB AAPL Lv2", "UNSB AAPL tms"]);
        assert_eq!(Subscription::TopList.subscribe_command().text(), "SB TOPLIST");
        assert_eq!(Subscription::TopList.unsubscribe_command().text(), "UNSB TOPLIST");
        assert_eq!(return_full_lv1(true).text(), "ReturnFullLv1 YES");
    }

    #[test]
    fn test_chart_windows() {
        let reference = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(
            day_chart("spy", reference).unwrap().text(),
            "SB SPY DAYCHART 2024/01/25 2024/03/14"
        );
        assert_eq!(
            minute_chart("spy", reference).unwrap().text(),
            "SB SPY MINCHART 2024/03/07-00:00 2024/03/08-00:00"
        );
    }

    #[test]
    fn test_queries() {
        assert_eq!(query(&Query::Positions).unwrap().text(), "GET POSITIONS");
        assert_eq!(query(&Query::BuyingPower).unwrap().text(), "GET BP");
        assert_eq!(query(&Query::Locates).unwrap().text(), "GET LOCATES");
        assert_eq!(
            query(&Query::SymbolStatus("aapl".into())).unwrap().text(),
            "GET SymStatus AAPL"
        );
        assert_eq!(
            query(&Query::ShortInfo("aapl".into())).unwrap().text(),
            "GET SHORTINFO AAPL"
        );
        assert_eq!(position_refresh().text(), "POSREFRESH");
    }

    #[test]
    fn test_settle_classification() {
        assert_eq!(query(&Query::Orders).unwrap().settle_class(), SettleClass::Query);
        assert_eq!(
            locate_inquire("a", 1, "r").unwrap().settle_class(),
            SettleClass::Query
        );
        let reference = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
        assert_eq!(
            day_chart("a", reference).unwrap().settle_class(),
            SettleClass::Query
        );
        assert_eq!(cancel_all().settle_class(), SettleClass::Minimal);
        assert_eq!(quit().settle_class(), SettleClass::Minimal);
        assert_eq!(
            Subscription::TopList.subscribe_command().settle_class(),
            SettleClass::Minimal
        );
    }

    #[test]
    fn test_login_redacted() {
        let command = login(&Credentials::new("trader", "secret", "ACCT")).unwrap();
        assert_eq!(command.text(), "LOGIN trader secret ACCT");
        assert_eq!(command.redacted(), "LOGIN trader *** ACCT");
        assert_eq!(command.to_string(), "LOGIN trader *** ACCT");
        assert!(login(&Credentials::new("", "secret", "ACCT")).is_err());
    }
}
