//! Full workflow cycles against scripted terminal replies

mod common;

use async_trait::async_trait;
use common::replies;
use das_locate_trader::common::channels::create_cancel_flag;
use das_locate_trader::{
    AutoApprove, Candidate, Confirm, LocateOrderStatus, OrderStatus, ScriptedTransport,
    TradingWorkflow,
};
use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Mutex;

fn test_candidate() -> Candidate {
    Candidate::new("TEST", dec!(1000)).with_quote(dec!(10), dec!(10.05))
}

/// Declines every stage and remembers what it was asked
#[derive(Default)]
struct Decline {
    asked: Mutex<Vec<String>>,
}

#[async_trait]
impl Confirm for Decline {
    async fn confirm(&self, stage: &str) -> bool {
        self.asked.lock().unwrap().push(stage.to_string());
        false
    }
}

#[test_log::test(tokio::test)]
async fn test_router_prefers_full_size_route_and_cost_gate_blocks() {
    let script = ScriptedTransport::new();
    let session = common::ready_session(&script).await;
    script.respond("SLPRICEINQUIRE TEST 100 R1", replies::R1_SMALL);
    script.respond("SLPRICEINQUIRE TEST 100 R2", replies::R2_FULL);
    script.respond("GET POSITIONS", replies::NO_POSITIONS);
    script.respond("GET LOCATES", replies::NO_LOCATES);

    let mut workflow = TradingWorkflow::new(
        session,
        common::trading_config(dec!(0.004)),
        AutoApprove,
        &[test_candidate()],
        Decimal::ZERO,
    )
    .unwrap();
    let report = workflow.run_cycle().await.unwrap();

    let state = workflow.table().get("TEST").unwrap();
    assert_eq!(state.shares_to_locate, 100);
    assert_eq!(state.locate_route.as_deref(), Some("R2"));
    assert_eq!(state.locate_price, dec!(0.40));
    assert_eq!(state.total_locate_cost, dec!(40.00));
    assert!(state.locate_available);
    assert!(!state.pre_locate_check_passed);
    assert!(!state.pre_trade_check_passed);

    assert_eq!(report.locates_inquired, 1);
    assert_eq!(report.locate_orders_sent, 0);
    assert_eq!(
        script.sent(),
        vec![
            "LOGIN trader secret ACC1",
            "GET LOCATES",
            "SLPRICEINQUIRE TEST 100 R1",
            "SLPRICEINQUIRE TEST 100 R2",
            "GET POSITIONS",
            "GET LOCATES",
        ]
    );
}

#[tokio::test]
async fn test_cheap_locate_is_ordered_on_cheapest_route() {
    let script = ScriptedTransport::new();
    let session = common::ready_session(&script).await;
    script.respond("SLPRICEINQUIRE TEST 100 R1", replies::R1_SMALL);
    script.respond("SLPRICEINQUIRE TEST 100 R2", replies::R2_FULL);
    script.respond("GET POSITIONS", replies::NO_POSITIONS);
    script.respond("GET LOCATES", replies::NO_LOCATES);
    script.respond("SLNEWORDER", "%SLOrder 91 TEST 100 R2 Sent");

    let mut workflow = TradingWorkflow::new(
        session,
        common::trading_config(dec!(0.05)),
        AutoApprove,
        &[test_candidate()],
        Decimal::ZERO,
    )
    .unwrap();
    let report = workflow.run_cycle().await.unwrap();

    assert_eq!(report.locate_orders_sent, 1);
    assert_eq!(
        common::sent_with_prefix(&script, "SLNEWORDER"),
        vec!["SLNEWORDER TEST 100 R2"]
    );
    // the locate is not accepted yet, so nothing is shorted
    assert_eq!(report.short_orders_sent, 0);
    assert!(common::sent_with_prefix(&script, "NEWORDER").is_empty());
}

#[tokio::test]
async fn test_accepted_locate_leads_to_one_join_offer_short() {
    let script = ScriptedTransport::new();
    let session = common::ready_session(&script).await;
    script.respond("SLPRICEINQUIRE", replies::R2_FULL);
    script.respond("GET POSITIONS", replies::NO_POSITIONS);
    script.respond("GET LOCATES", replies::TEST_LOCATE_ACCEPTED);
    script.respond("NEWORDER", replies::SHORT_ACK);

    let mut workflow = TradingWorkflow::new(
        session,
        common::trading_config(dec!(0.004)),
        AutoApprove,
        &[test_candidate()],
        Decimal::ZERO,
    )
    .unwrap();
    let (_cancel_tx, cancel_rx) = create_cancel_flag();
    let reports = workflow.run(Some(2), cancel_rx).await.unwrap();

    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0].short_orders_sent, 1);
    assert_eq!(reports[1].short_orders_sent, 0);

    let state = workflow.table().get("TEST").unwrap();
    assert_eq!(state.locate_order_status, LocateOrderStatus::Accepted);
    assert_eq!(state.locate_shares_located, 100);
    assert_eq!(state.shares_to_short, 100);
    assert!(!state.pre_locate_check_passed);

    let shorts = common::sent_with_prefix(&script, "NEWORDER");
    assert_eq!(shorts.len(), 1);
    assert!(shorts[0].ends_with(" SS TEST SMAT 100 10.05 Display=100 TIF=DAY"), "{}", shorts[0]);
    assert!(common::sent_with_prefix(&script, "SLNEWORDER").is_empty());

    let record = workflow.orders().iter().next().unwrap();
    assert_eq!(record.order_id.as_deref(), Some("9001"));
}

#[tokio::test]
async fn test_existing_position_blocks_entry() {
    let script = ScriptedTransport::new();
    let session = common::ready_session(&script).await;
    script.respond("SLPRICEINQUIRE", replies::R2_FULL);
    script.respond("GET POSITIONS", replies::SHORT_TEST_POSITION);
    script.respond("GET LOCATES", replies::TEST_LOCATE_ACCEPTED);

    let mut workflow = TradingWorkflow::new(
        session,
        common::trading_config(dec!(0.004)),
        AutoApprove,
        &[test_candidate()],
        Decimal::ZERO,
    )
    .unwrap();
    let report = workflow.run_cycle().await.unwrap();

    let state = workflow.table().get("TEST").unwrap();
    assert_eq!(state.shares_in_position, -100);
    assert!(state.in_position);
    assert!(!state.pre_trade_check_passed);
    assert_eq!(report.short_orders_sent, 0);
    assert!(common::sent_with_prefix(&script, "NEWORDER").is_empty());
}

#[tokio::test]
async fn test_shortable_symbol_skips_locate_and_shorts() {
    let script = ScriptedTransport::new();
    let session = common::ready_session(&script).await;
    script.respond("SLPRICEINQUIRE TEST 100 R1", replies::R1_SHORTABLE);
    script.respond("GET POSITIONS", replies::NO_POSITIONS);
    script.respond("GET LOCATES", replies::NO_LOCATES);
    script.respond("NEWORDER", replies::SHORT_ACK);

    let mut workflow = TradingWorkflow::new(
        session,
        common::trading_config(dec!(0.004)),
        AutoApprove,
        &[test_candidate()],
        Decimal::ZERO,
    )
    .unwrap();
    let report = workflow.run_cycle().await.unwrap();

    let state = workflow.table().get("TEST").unwrap();
    assert!(state.shortable);
    assert_eq!(state.locate_route.as_deref(), Some("ALL"));
    assert_eq!(state.total_locate_cost, Decimal::ZERO);
    assert_eq!(report.short_orders_sent, 1);
    assert!(common::sent_with_prefix(&script, "SLPRICEINQUIRE TEST 100 R2").is_empty());
    assert!(common::sent_with_prefix(&script, "SLNEWORDER").is_empty());
}

#[tokio::test]
async fn test_pending_offer_is_accepted() {
    let script = ScriptedTransport::new();
    let session = common::ready_session(&script).await;
    script.respond("SLPRICEINQUIRE", replies::R2_FULL);
    script.respond("GET POSITIONS", replies::NO_POSITIONS);
    script.respond("GET LOCATES", replies::TEST_LOCATE_OFFERED);

    let mut workflow = TradingWorkflow::new(
        session,
        common::trading_config(dec!(0.05)),
        AutoApprove,
        &[test_candidate()],
        Decimal::ZERO,
    )
    .unwrap();
    let report = workflow.run_cycle().await.unwrap();

    assert_eq!(report.offers_accepted, 1);
    assert_eq!(report.locate_orders_sent, 0);
    assert_eq!(
        common::sent_with_prefix(&script, "SLOFFEROPERATION"),
        vec!["SLOFFEROPERATION 77 Accept"]
    );
    assert_eq!(
        workflow.table().get("TEST").unwrap().locate_order_notes,
        "Offered 0.40"
    );
}

#[tokio::test]
async fn test_new_locate_offer_is_accepted_in_same_cycle() {
    let script = ScriptedTransport::new();
    let session = common::ready_session(&script).await;
    script.respond("SLPRICEINQUIRE", replies::R2_FULL);
    script.respond("GET POSITIONS", replies::NO_POSITIONS);
    script.respond_once("GET LOCATES", replies::NO_LOCATES);
    script.respond("GET LOCATES", replies::TEST_LOCATE_OFFERED);

    let mut workflow = TradingWorkflow::new(
        session,
        common::trading_config(dec!(0.05)),
        AutoApprove,
        &[test_candidate()],
        Decimal::ZERO,
    )
    .unwrap();
    let report = workflow.run_cycle().await.unwrap();

    assert_eq!(report.locate_orders_sent, 1);
    assert_eq!(report.offers_accepted, 1);
    let sent = script.sent();
    let order_at = sent.iter().position(|l| l == "SLNEWORDER TEST 100 R2").unwrap();
    assert_eq!(
        &sent[order_at..order_at + 3],
        &["SLNEWORDER TEST 100 R2", "GET LOCATES", "SLOFFEROPERATION 77 Accept"]
    );
}

#[tokio::test]
async fn test_silent_short_is_retried_after_terminal_reports_cancel() {
    let script = ScriptedTransport::new();
    let session = common::ready_session(&script).await;
    script.respond("SLPRICEINQUIRE", replies::R2_FULL);
    script.respond("GET POSITIONS", replies::NO_POSITIONS);
    script.respond("GET LOCATES", replies::TEST_LOCATE_ACCEPTED);

    let mut workflow = TradingWorkflow::new(
        session,
        common::trading_config(dec!(0.004)),
        AutoApprove,
        &[test_candidate()],
        Decimal::ZERO,
    )
    .unwrap();

    let first = workflow.run_cycle().await.unwrap();
    assert_eq!(first.short_orders_sent, 1);
    let silent = workflow.orders().iter().next().unwrap().clone();
    assert_eq!(silent.status, OrderStatus::TimedOut);
    assert!(common::sent_with_prefix(&script, "GET ORDERS").is_empty());

    script.respond(
        "GET ORDERS",
        &format!(
            "#Order\r\n%ORDER 8800 {} TEST SS L 100 0 100 10.05 SMAT Canceled 09:30:05\r\n#OrderEnd",
            silent.token
        ),
    );
    script.respond("NEWORDER", replies::SHORT_ACK);

    let second = workflow.run_cycle().await.unwrap();
    assert_eq!(second.short_orders_sent, 1);
    assert_eq!(
        workflow.orders().get(silent.token).unwrap().status,
        OrderStatus::Canceled
    );

    let third = workflow.run_cycle().await.unwrap();
    assert_eq!(third.short_orders_sent, 0);

    assert_eq!(common::sent_with_prefix(&script, "GET ORDERS").len(), 2);
    assert_eq!(common::sent_with_prefix(&script, "NEWORDER").len(), 2);
    let statuses: Vec<OrderStatus> = workflow.orders().iter().map(|o| o.status).collect();
    assert!(statuses.contains(&OrderStatus::Acknowledged));
}

#[tokio::test]
async fn test_missing_quote_is_fetched_before_sizing() {
    let script = ScriptedTransport::new();
    let session = common::ready_session(&script).await;
    script.respond("SB TEST Lv1", replies::TEST_LV1);
    script.respond("SLPRICEINQUIRE", replies::R2_FULL);

    let mut workflow = TradingWorkflow::new(
        session,
        common::trading_config(dec!(0.004)),
        AutoApprove,
        &[Candidate::new("TEST", dec!(1000))],
        Decimal::ZERO,
    )
    .unwrap();
    assert_eq!(workflow.table().get("TEST").unwrap().shares_to_locate, 0);

    workflow.run_cycle().await.unwrap();

    let state = workflow.table().get("TEST").unwrap();
    assert_eq!(state.last_bid, dec!(10));
    assert_eq!(state.last_ask, dec!(10.05));
    assert_eq!(state.shares_to_locate, 100);
    assert_eq!(common::sent_with_prefix(&script, "UNSB"), vec!["UNSB TEST Lv1"]);
}

#[tokio::test]
async fn test_declined_stages_send_no_orders() {
    let script = ScriptedTransport::new();
    let session = common::ready_session(&script).await;
    script.respond("SLPRICEINQUIRE", replies::R2_FULL);
    script.respond("GET POSITIONS", replies::NO_POSITIONS);
    script.respond("GET LOCATES", replies::TEST_LOCATE_ACCEPTED);

    let decline = Decline::default();
    let mut workflow = TradingWorkflow::new(
        session,
        common::trading_config(dec!(0.05)),
        decline,
        &[test_candidate()],
        Decimal::ZERO,
    )
    .unwrap();
    let (_cancel_tx, cancel_rx) = create_cancel_flag();
    let reports = workflow.run(None, cancel_rx).await.unwrap();

    assert_eq!(reports.len(), 1);
    assert!(workflow.table().get("TEST").unwrap().pre_trade_check_passed);
    assert!(common::sent_with_prefix(&script, "NEWORDER").is_empty());
    assert!(common::sent_with_prefix(&script, "SLNEWORDER").is_empty());
}

#[tokio::test]
async fn test_cancelled_before_start_runs_nothing() {
    let script = ScriptedTransport::new();
    let session = common::ready_session(&script).await;

    let mut workflow = TradingWorkflow::new(
        session,
        common::trading_config(dec!(0.004)),
        AutoApprove,
        &[test_candidate()],
        Decimal::ZERO,
    )
    .unwrap();
    let (cancel_tx, cancel_rx) = create_cancel_flag();
    cancel_tx.send(true).unwrap();

    let reports = workflow.run(None, cancel_rx).await.unwrap();
    assert!(reports.is_empty());
    assert_eq!(script.sent().len(), 1);
}

#[tokio::test]
async fn test_transport_failure_aborts_run_and_closes_session() {
    let script = ScriptedTransport::new();
    let session = common::ready_session(&script).await;
    script.respond("GET LOCATES", replies::NO_LOCATES);
    script.fail_on("SLPRICEINQUIRE");

    let mut workflow = TradingWorkflow::new(
        session,
        common::trading_config(dec!(0.004)),
        AutoApprove,
        &[test_candidate()],
        Decimal::ZERO,
    )
    .unwrap();
    let err = workflow.run_cycle().await.unwrap_err();

    assert!(err.is_fatal());
    assert!(!workflow.session().is_ready());
    let table = workflow.shutdown().await.unwrap();
    assert!(table.get("TEST").is_some());
}

#[tokio::test]
async fn test_snapshot_is_json_keyed_by_symbol() {
    let script = ScriptedTransport::new();
    let session = common::ready_session(&script).await;
    let workflow = TradingWorkflow::new(
        session,
        common::trading_config(dec!(0.004)),
        AutoApprove,
        &[test_candidate(), Candidate::new("FLD", dec!(500))],
        Decimal::ZERO,
    )
    .unwrap();

    let snapshot: serde_json::Value = serde_json::from_str(&workflow.snapshot_json().unwrap()).unwrap();
    let symbols: Vec<&String> = snapshot.as_object().unwrap().keys().collect();
    assert_eq!(symbols, vec!["FLD", "TEST"]);
    assert_eq!(snapshot["TEST"]["locate_order_status"], "NoLocateOrder");
}
