//! Common test utilities and fixtures

#![allow(dead_code)]

use das_locate_trader::{
    Credentials, ScriptedTransport, Session, SettleConfig, TerminalConfig, TradingConfig,
};
use rust_decimal::Decimal;

/// Literal terminal replies
pub mod replies {
    pub const LOGIN_OK: &str = "#LOGIN SUCCESSED";
    pub const LOGIN_REFUSED: &str = "#LOGIN failed: Invalid user or password";

    pub const NO_POSITIONS: &str = "#POS\r\nsymb qty avgcost\r\n#POSEND";
    pub const SHORT_TEST_POSITION: &str = "#POS\r\nsymb qty avgcost\r\nTEST -100 10.00\r\n#POSEND";

    pub const NO_LOCATES: &str = "#SLOrder\r\nid symb shares route notes\r\n#SLOrderEnd";
    pub const TEST_LOCATE_ACCEPTED: &str =
        "#SLOrder\r\nid symb shares route notes\r\n55 TEST 100 R2 Offer Accepted\r\n#SLOrderEnd";
    pub const TEST_LOCATE_OFFERED: &str =
        "#SLOrder\r\nid symb shares route notes\r\n77 TEST 100 R2 Offered 0.40\r\n#SLOrderEnd";

    pub const R1_SMALL: &str = "%SLRET TEST R1 0.50 50 100 Offer";
    pub const R2_FULL: &str = "%SLRET TEST R2 0.40 200 100 Offer";
    pub const R1_SHORTABLE: &str = "%SLRET TEST R1 0 0 100 Shortable";

    pub const TEST_LV1: &str = "$Quote TEST B:10 A:10.05 V:250000";

    pub const SHORT_ACK: &str = "%ORDER 9001 0 TEST SS L 100 100 0 10.05 SMAT Accepted 09:30:01";
}

pub fn credentials() -> Credentials {
    Credentials::new("trader", "secret", "ACC1")
}

/// A session logged in over a scripted transport
pub async fn ready_session(script: &ScriptedTransport) -> Session<ScriptedTransport> {
    script.respond_once("LOGIN", replies::LOGIN_OK);
    let mut session = Session::new(script.clone(), 4096, SettleConfig::immediate());
    session
        .authenticate(&credentials())
        .await
        .expect("scripted login should succeed");
    session
}

/// Two locate routes and a cost ceiling of `fraction` of notional
pub fn trading_config(fraction: Decimal) -> TradingConfig {
    TradingConfig {
        locate_routes: vec!["R1".to_string(), "R2".to_string()],
        max_locate_cost_fraction: fraction,
        cycle_interval_ms: 0,
        ..TradingConfig::default()
    }
}

/// Terminal settings pointing at a local port with short timeouts
pub fn local_terminal(port: u16) -> TerminalConfig {
    TerminalConfig {
        host: "127.0.0.1".to_string(),
        port,
        user: "trader".to_string(),
        password: "secret".to_string(),
        account: "ACC1".to_string(),
        connect_timeout_ms: 1000,
        read_timeout_ms: 300,
        buffer_size: 4096,
    }
}

/// Sent lines starting with `prefix`
pub fn sent_with_prefix(script: &ScriptedTransport, prefix: &str) -> Vec<String> {
    script
        .sent()
        .into_iter()
        .filter(|line| line.starts_with(prefix))
        .collect()
}
