//! Locate-then-short workflow over one session

use rust_decimal::Decimal;
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::gate::TradeGate;
use super::ledger;
use super::orders::{OrderStatus, OrderTracker};
use super::router::LocateRouter;
use super::sizing;
use super::types::{Candidate, LocateOrderStatus, TickerTable};
use crate::common::errors::{ClientError, Result};
use crate::common::traits::{Confirm, Transport};
use crate::common::types::Side;
use crate::config::types::TradingConfig;
use crate::das::command::{self, OfferAction, OrderType};
use crate::das::session::Session;

/// Counters for one pass of the workflow
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CycleReport {
    pub cycle: usize,
    pub locates_inquired: usize,
    pub locate_orders_sent: usize,
    pub offers_accepted: usize,
    pub short_orders_sent: usize,
    /// Per-ticker steps that failed without ending the run
    pub ticker_failures: usize,
}

pub struct TradingWorkflow<T: Transport, C: Confirm> {
    session: Session<T>,
    table: TickerTable,
    router: LocateRouter,
    gate: TradeGate,
    orders: OrderTracker,
    trading: TradingConfig,
    confirm: C,
    cycles_run: usize,
}

impl<T: Transport, C: Confirm> TradingWorkflow<T, C> {
    /// Candidates without a target notional get `default_notional`
    pub fn new(
        session: Session<T>,
        trading: TradingConfig,
        confirm: C,
        candidates: &[Candidate],
        default_notional: Decimal,
    ) -> Result<Self> {
        let router = LocateRouter::from_config(&trading)?;
        let gate = TradeGate::new(trading.max_locate_cost_fraction);

        let mut table = TickerTable::new();
        for candidate in candidates {
            command::normalize_symbol(&candidate.ticker)?;
            let notional = candidate.target_notional.unwrap_or(default_notional);
            table.insert_candidate(candidate, notional);
        }
        for state in table.iter_mut() {
            sizing::update_shares_to_locate(state, trading.round_lot);
        }
        info!("Workflow loaded {} candidates", table.len());

        Ok(Self {
            session,
            table,
            router,
            gate,
            orders: OrderTracker::new(),
            trading,
            confirm,
            cycles_run: 0,
        })
    }

    pub fn table(&self) -> &TickerTable {
        &self.table
    }

    pub fn orders(&self) -> &OrderTracker {
        &self.orders
    }

    pub fn session(&self) -> &Session<T> {
        &self.session
    }

    pub fn cycles_run(&self) -> usize {
        self.cycles_run
    }

    /// Ticker table as pretty JSON
    pub fn snapshot_json(&self) -> Result<String> {
        serde_json::to_string_pretty(&self.table)
            .map_err(|e| ClientError::Internal(format!("snapshot: {}", e)))
    }

    /// Run cycles until `max_cycles`, cancellation, or the operator stops
    #[instrument(skip(self, cancel))]
    pub async fn run(
        &mut self,
        max_cycles: Option<usize>,
        cancel: watch::Receiver<bool>,
    ) -> Result<Vec<CycleReport>> {
        let mut reports = Vec::new();
        loop {
            if *cancel.borrow() {
                info!("Cancellation requested; stopping");
                break;
            }
            let report = self.run_cycle().await?;
            info!("Cycle {} done: {:?}", report.cycle, report);
            reports.push(report);

            if max_cycles.is_some_and(|max| self.cycles_run >= max) {
                break;
            }
            if *cancel.borrow() || !self.confirm.confirm("run another cycle").await {
                break;
            }
            let interval = Duration::from_millis(self.trading.cycle_interval_ms);
            if !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }
        }
        Ok(reports)
    }

    /// One full pass: reconcile, locate, gate, then act
    #[instrument(skip(self), fields(cycle = self.cycles_run + 1))]
    pub async fn run_cycle(&mut self) -> Result<CycleReport> {
        self.cycles_run += 1;
        let mut report = CycleReport {
            cycle: self.cycles_run,
            ..CycleReport::default()
        };

        self.refresh_locates(&mut report).await?;
        if self.cycles_run == 1 {
            self.refresh_missing_quotes(&mut report).await?;
            self.inquire_locates(&mut report).await?;
        }
        self.update_shares_to_short();
        self.run_pre_locate_checks();
        self.refresh_positions(&mut report).await?;
        self.run_pre_trade_checks();

        if self.confirm.confirm("submit locate orders").await {
            self.submit_locate_orders(&mut report).await?;
            if report.locate_orders_sent > 0 {
                self.refresh_locates(&mut report).await?;
            }
            self.accept_locate_offers(&mut report).await?;
        }

        self.refresh_locates(&mut report).await?;
        self.update_shares_to_short();
        self.run_pre_trade_checks();

        if self.confirm.confirm("send short sales").await {
            self.refresh_orders(&mut report).await?;
            self.short_sell_join_offer(&mut report).await?;
        }

        match self.snapshot_json() {
            Ok(snapshot) => debug!("Ticker table:\n{}", snapshot),
            Err(e) => warn!("{}", e),
        }
        Ok(report)
    }

    /// Close the session
    pub async fn shutdown(mut self) -> Result<TickerTable> {
        self.session.close().await?;
        Ok(self.table)
    }

    /// Non-fatal errors end one ticker's step; fatal ones end the run
    fn absorb<X>(report: &mut CycleReport, symbol: &str, step: &str, result: Result<X>) -> Result<Option<X>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_fatal() => {
                error!("{} failed for {}: {}", step, symbol, e);
                Err(e)
            }
            Err(e) => {
                warn!("{} failed for {}: {}", step, symbol, e);
                report.ticker_failures += 1;
                Ok(None)
            }
        }
    }

    async fn refresh_locates(&mut self, report: &mut CycleReport) -> Result<()> {
        let result = ledger::refresh_locate_orders(&mut self.session, &mut self.table).await;
        Self::absorb(report, "*", "locate refresh", result)?;
        Ok(())
    }

    async fn refresh_positions(&mut self, report: &mut CycleReport) -> Result<()> {
        let result = ledger::refresh_positions(&mut self.session, &mut self.table).await;
        Self::absorb(report, "*", "position refresh", result)?;
        Ok(())
    }

    /// Re-query the terminal order list while any tracked order is live
    async fn refresh_orders(&mut self, report: &mut CycleReport) -> Result<()> {
        if !self.orders.has_live_orders() {
            return Ok(());
        }
        let result = self.orders.refresh(&mut self.session).await;
        if let Some(matched) = Self::absorb(report, "*", "order refresh", result)? {
            debug!("Order refresh matched {} orders", matched);
        }
        Ok(())
    }

    /// Fetch a Lv1 snapshot for candidates the feed gave no quote for
    async fn refresh_missing_quotes(&mut self, report: &mut CycleReport) -> Result<()> {
        let missing: Vec<String> = self
            .table
            .iter()
            .filter(|s| s.is_candidate && (s.last_bid <= Decimal::ZERO || s.last_ask <= Decimal::ZERO))
            .map(|s| s.symbol.clone())
            .collect();

        for symbol in missing {
            let result = self.session.quote_snapshot(&symbol).await;
            let Some(quote) = Self::absorb(report, &symbol, "quote snapshot", result)? else {
                continue;
            };
            if let Some(state) = self.table.get_mut(&symbol) {
                if let Some(bid) = quote.bid {
                    state.last_bid = bid;
                }
                if let Some(ask) = quote.ask {
                    state.last_ask = ask;
                }
                sizing::update_shares_to_locate(state, self.trading.round_lot);
            }
        }
        Ok(())
    }

    async fn inquire_locates(&mut self, report: &mut CycleReport) -> Result<()> {
        for symbol in self.table.candidate_symbols() {
            self.table.reset_locate_quote(&symbol);
            let shares = self.table.get(&symbol).map(|s| s.shares_to_locate).unwrap_or(0);
            if shares == 0 {
                info!("{}: nothing to locate", symbol);
                continue;
            }

            let result = self
                .router
                .find_cheapest_locate(&mut self.session, &symbol, shares)
                .await;
            let Some(quote) = Self::absorb(report, &symbol, "locate inquiry", result)? else {
                continue;
            };
            report.locates_inquired += 1;
            if let Some(state) = self.table.get_mut(&symbol) {
                state.apply_locate_quote(&quote);
            }
        }
        Ok(())
    }

    fn update_shares_to_short(&mut self) {
        for state in self.table.iter_mut() {
            sizing::update_shares_to_short(state);
        }
    }

    fn run_pre_locate_checks(&mut self) {
        let gate = self.gate;
        for state in self.table.iter_mut().filter(|s| s.is_candidate) {
            gate.apply_pre_locate(state);
        }
    }

    fn run_pre_trade_checks(&mut self) {
        let gate = self.gate;
        for state in self.table.iter_mut().filter(|s| s.is_candidate) {
            gate.apply_pre_trade(state);
        }
    }

    async fn submit_locate_orders(&mut self, report: &mut CycleReport) -> Result<()> {
        let due: Vec<(String, u64, String)> = self
            .table
            .iter()
            .filter(|s| {
                s.is_candidate
                    && s.pre_locate_check_passed
                    && !s.shortable
                    && s.locate_order_status == LocateOrderStatus::NoLocateOrder
                    && s.shares_to_locate > 0
            })
            .filter_map(|s| {
                s.locate_route
                    .clone()
                    .map(|route| (s.symbol.clone(), s.shares_to_locate, route))
            })
            .collect();

        for (symbol, shares, route) in due {
            let result = match command::locate_new_order(&symbol, shares, &route) {
                Ok(order) => self.session.execute(&order).await,
                Err(e) => Err(e),
            };
            let Some(reply) = Self::absorb(report, &symbol, "locate order", result)? else {
                continue;
            };
            info!("{}: locate order for {} via {}: {}", symbol, shares, route, reply.raw());
            report.locate_orders_sent += 1;
            if let Some(state) = self.table.get_mut(&symbol) {
                state.locate_order_status = LocateOrderStatus::Pending;
            }
        }
        Ok(())
    }

    async fn accept_locate_offers(&mut self, report: &mut CycleReport) -> Result<()> {
        let offers: Vec<(String, String)> = self
            .table
            .iter()
            .filter(|s| s.pre_locate_check_passed && s.locate_order_status == LocateOrderStatus::Pending)
            .filter_map(|s| s.locate_order_id.clone().map(|id| (s.symbol.clone(), id)))
            .collect();

        for (symbol, locate_id) in offers {
            let result = match command::locate_offer(&locate_id, OfferAction::Accept) {
                Ok(accept) => self.session.execute(&accept).await,
                Err(e) => Err(e),
            };
            if Self::absorb(report, &symbol, "offer accept", result)?.is_some() {
                info!("{}: accepted locate offer {}", symbol, locate_id);
                report.offers_accepted += 1;
            }
        }
        Ok(())
    }

    /// Limit short sale at the last ask for every ticker cleared to trade
    async fn short_sell_join_offer(&mut self, report: &mut CycleReport) -> Result<()> {
        let due: Vec<(String, u64, Decimal)> = self
            .table
            .iter()
            .filter(|s| {
                s.is_candidate
                    && s.pre_trade_check_passed
                    && s.shares_to_short > 0
                    && s.last_ask > Decimal::ZERO
            })
            .filter(|s| !self.orders.has_live_order(&s.symbol, Side::ShortSell))
            .map(|s| (s.symbol.clone(), s.shares_to_short, s.last_ask))
            .collect();

        for (symbol, shares, ask) in due {
            let request = self
                .orders
                .build(
                    Side::ShortSell,
                    &symbol,
                    &self.trading.order_route,
                    shares,
                    OrderType::Limit { price: ask },
                )
                .with_display(self.trading.display_size)
                .with_time_in_force(&self.trading.time_in_force);

            let result = self.orders.submit(&mut self.session, &request).await;
            let Some(status) = Self::absorb(report, &symbol, "short sale", result)? else {
                continue;
            };
            if status == OrderStatus::Rejected {
                warn!("{}: short sale rejected", symbol);
            } else {
                report.short_orders_sent += 1;
            }
        }
        Ok(())
    }
}
