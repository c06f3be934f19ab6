//! Cheapest-route locate discovery

use rust_decimal::Decimal;
use tracing::{debug, info, instrument, warn};

use super::types::LocateQuote;
use crate::common::errors::{ClientError, Result};
use crate::common::traits::Transport;
use crate::config::types::TradingConfig;
use crate::das::command;
use crate::das::parsers::{parse_locate_inquiry, LocateInquiry};
use crate::das::session::Session;

/// Display-only price reported when no route covers the full size
pub const UNAVAILABLE_PRICE: Decimal = Decimal::from_parts(99999, 0, 0, false, 0);

/// Route reported when the symbol needs no locate
pub const SHORTABLE_ROUTE: &str = "ALL";

/// Running minimum over route answers, in priority order
#[derive(Debug, Clone)]
pub struct RouteScan {
    requested: u64,
    best: Option<(String, LocateInquiry)>,
    shortable: bool,
}

impl RouteScan {
    pub fn new(requested: u64) -> Self {
        Self {
            requested,
            best: None,
            shortable: false,
        }
    }

    /// Record one route's answer; returns true once scanning can stop
    pub fn observe(&mut self, route: &str, inquiry: &LocateInquiry) -> bool {
        if inquiry.shortable {
            self.shortable = true;
            return true;
        }
        if inquiry.shares_available < self.requested {
            debug!(
                "{} offers {} of {} shares",
                route, inquiry.shares_available, self.requested
            );
            return false;
        }
        let cheaper = match &self.best {
            Some((_, best)) => inquiry.price < best.price,
            None => true,
        };
        if cheaper {
            self.best = Some((route.to_string(), inquiry.clone()));
        }
        false
    }

    pub fn finish(self) -> LocateQuote {
        if self.shortable {
            return LocateQuote {
                price: Decimal::ZERO,
                shares_available: self.requested,
                total_cost: Decimal::ZERO,
                route: Some(SHORTABLE_ROUTE.to_string()),
                available: true,
                shortable: true,
            };
        }
        match self.best {
            Some((route, inquiry)) => LocateQuote {
                price: inquiry.price,
                shares_available: inquiry.shares_available,
                total_cost: inquiry.price * Decimal::from(self.requested),
                route: Some(route),
                available: true,
                shortable: false,
            },
            None => LocateQuote {
                price: UNAVAILABLE_PRICE,
                shares_available: 0,
                total_cost: UNAVAILABLE_PRICE,
                route: None,
                available: false,
                shortable: false,
            },
        }
    }
}

/// Queries locate routes in a fixed priority order
#[derive(Debug, Clone)]
pub struct LocateRouter {
    routes: Vec<String>,
}

impl LocateRouter {
    pub fn new(routes: Vec<String>) -> Result<Self> {
        if routes.is_empty() {
            return Err(ClientError::Configuration(
                "at least one locate route is required".to_string(),
            ));
        }
        let routes = routes
            .iter()
            .map(|r| command::normalize_route(r))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { routes })
    }

    pub fn from_config(config: &TradingConfig) -> Result<Self> {
        Self::new(config.locate_routes.clone())
    }

    pub fn routes(&self) -> &[String] {
        &self.routes
    }

    /// Scan every route for `shares` of `symbol` and keep the cheapest
    ///
    /// A route that errors or stays silent is skipped. The scan stops early
    /// when a route reports the symbol as shortable, and aborts only when the
    /// session itself has failed.
    #[instrument(skip(self, session))]
    pub async fn find_cheapest_locate<T: Transport>(
        &self,
        session: &mut Session<T>,
        symbol: &str,
        shares: u64,
    ) -> Result<LocateQuote> {
        let mut scan = RouteScan::new(shares);
        for route in &self.routes {
            let inquire = command::locate_inquire(symbol, shares, route)?;
            let reply = match session.execute(&inquire).await {
                Ok(reply) => reply,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Locate route {} failed: {}", route, e);
                    continue;
                }
            };
            let Some(inquiry) = parse_locate_inquiry(&reply) else {
                debug!("No locate data from {}", route);
                continue;
            };
            debug!(
                "{} {}: price={} available={} status={:?}",
                symbol, route, inquiry.price, inquiry.shares_available, inquiry.status
            );
            if scan.observe(route, &inquiry) {
                info!("{} is shortable per {}", symbol, route);
                break;
            }
        }

        let quote = scan.finish();
        if quote.available {
            info!(
                "{}: cheapest locate {} via {:?}, total {}",
                symbol, quote.price, quote.route, quote.total_cost
            );
        } else {
            info!("{}: no route can locate {} shares", symbol, shares);
        }
        Ok(quote)
    }
}
