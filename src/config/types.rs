//! Configuration types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Terminal connection and login
    #[serde(default)]
    pub terminal: TerminalConfig,
    /// Settle delays per command class
    #[serde(default)]
    pub settle: SettleConfig,
    /// Locate routing and gating parameters
    #[serde(default)]
    pub trading: TradingConfig,
    /// General application settings
    #[serde(default)]
    pub settings: AppSettings,
}

/// DAS terminal connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub account: String,
    /// Connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,
    /// Per-read timeout in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout_ms: u64,
    /// Read buffer size; a read shorter than this ends a drain
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: String::new(),
            password: String::new(),
            account: String::new(),
            connect_timeout_ms: default_connect_timeout(),
            read_timeout_ms: default_read_timeout(),
            buffer_size: default_buffer_size(),
        }
    }
}

impl TerminalConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.user, &self.password, &self.account)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    9800
}

fn default_connect_timeout() -> u64 {
    2000
}

fn default_read_timeout() -> u64 {
    2000
}

fn default_buffer_size() -> usize {
    4096
}

/// Settle delays applied after a command is written and before draining
///
/// These are empirical; the classification is fixed but the values are tunable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettleConfig {
    /// Quote, position, order, locate and chart queries
    #[serde(default = "default_query_ms")]
    pub query_ms: u64,
    /// REPLACE and COMPLEXORDER
    #[serde(default = "default_extended_ms")]
    pub extended_ms: u64,
    /// Everything else, in microseconds
    #[serde(default = "default_minimal_us")]
    pub minimal_us: u64,
    /// Pause between poll cycles while streaming a subscription
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            query_ms: default_query_ms(),
            extended_ms: default_extended_ms(),
            minimal_us: default_minimal_us(),
            poll_ms: default_poll_ms(),
        }
    }
}

impl SettleConfig {
    /// No settle delay at all; for replayed transports
    pub fn immediate() -> Self {
        Self {
            query_ms: 0,
            extended_ms: 0,
            minimal_us: 0,
            poll_ms: 0,
        }
    }
}

fn default_query_ms() -> u64 {
    100
}

fn default_extended_ms() -> u64 {
    200
}

fn default_minimal_us() -> u64 {
    500
}

fn default_poll_ms() -> u64 {
    50
}

/// Locate routing, gating and order parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Locate routes, tried in this order
    #[serde(default = "default_locate_routes")]
    pub locate_routes: Vec<String>,
    /// Locate cost ceiling as a fraction of target notional
    #[serde(default = "default_max_locate_cost_fraction")]
    pub max_locate_cost_fraction: Decimal,
    /// Route used for equity orders
    #[serde(default = "default_order_route")]
    pub order_route: String,
    /// Display= tag on limit orders
    #[serde(default = "default_display_size")]
    pub display_size: u64,
    /// Locate sizes are rounded down to this lot
    #[serde(default = "default_round_lot")]
    pub round_lot: u64,
    /// Cap on any single ticker's share of the portfolio
    #[serde(default = "default_max_position_fraction")]
    pub max_position_fraction: Decimal,
    /// TIF tag on workflow orders
    #[serde(default = "default_time_in_force")]
    pub time_in_force: String,
    /// Pause between workflow cycles
    #[serde(default = "default_cycle_interval_ms")]
    pub cycle_interval_ms: u64,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            locate_routes: default_locate_routes(),
            max_locate_cost_fraction: default_max_locate_cost_fraction(),
            order_route: default_order_route(),
            display_size: default_display_size(),
            round_lot: default_round_lot(),
            max_position_fraction: default_max_position_fraction(),
            time_in_force: default_time_in_force(),
            cycle_interval_ms: default_cycle_interval_ms(),
        }
    }
}

fn default_locate_routes() -> Vec<String> {
    ["TESTSL", "LOCATE1", "LOCATE2"]
        .iter()
        .map(|r| r.to_string())
        .collect()
}

fn default_max_locate_cost_fraction() -> Decimal {
    Decimal::new(4, 3)
}

fn default_order_route() -> String {
    "SMAT".to_string()
}

fn default_display_size() -> u64 {
    100
}

fn default_round_lot() -> u64 {
    100
}

fn default_max_position_fraction() -> Decimal {
    Decimal::new(1, 1)
}

fn default_time_in_force() -> String {
    "DAY".to_string()
}

fn default_cycle_interval_ms() -> u64 {
    5000
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppSettings {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Terminal login credentials
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
    pub account: String,
}

impl Credentials {
    pub fn new(user: &str, password: &str, account: &str) -> Self {
        Self {
            user: user.to_string(),
            password: password.to_string(),
            account: account.to_string(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"***")
            .field("account", &self.account)
            .finish()
    }
}
