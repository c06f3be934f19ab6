//! Pre-locate and pre-trade gates
//!
//! Both gates are recomputed every cycle from the latest reconciled state and
//! only ever write their own pass flag.

use rust_decimal::Decimal;
use std::fmt;
use tracing::info;

use super::types::TickerState;

/// Why a gate did not pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateFailure {
    LocateUnavailable,
    CostAboveCeiling { cost: Decimal, ceiling: Decimal },
    LocateAlreadyAccepted,
    NegativeVolume(Decimal),
    AlreadyInPosition(i64),
}

impl fmt::Display for GateFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GateFailure::LocateUnavailable => write!(f, "no locate available"),
            GateFailure::CostAboveCeiling { cost, ceiling } => {
                write!(f, "locate cost {} above ceiling {}", cost, ceiling)
            }
            GateFailure::LocateAlreadyAccepted => write!(f, "locate already accepted"),
            GateFailure::NegativeVolume(v) => write!(f, "volume {} below zero", v),
            GateFailure::AlreadyInPosition(n) => write!(f, "already holding {} shares", n),
        }
    }
}

/// Gate thresholds
#[derive(Debug, Clone, Copy)]
pub struct TradeGate {
    max_locate_cost_fraction: Decimal,
}

impl TradeGate {
    pub fn new(max_locate_cost_fraction: Decimal) -> Self {
        Self {
            max_locate_cost_fraction,
        }
    }

    fn cost_check(&self, state: &TickerState) -> Result<(), GateFailure> {
        let ceiling = state.target_notional * self.max_locate_cost_fraction;
        if state.total_locate_cost > ceiling {
            return Err(GateFailure::CostAboveCeiling {
                cost: state.total_locate_cost,
                ceiling,
            });
        }
        Ok(())
    }

    fn volume_check(state: &TickerState) -> Result<(), GateFailure> {
        if state.volume < Decimal::ZERO {
            return Err(GateFailure::NegativeVolume(state.volume));
        }
        Ok(())
    }

    pub fn pre_locate(&self, state: &TickerState) -> Result<(), GateFailure> {
        if !state.locate_available {
            return Err(GateFailure::LocateUnavailable);
        }
        self.cost_check(state)?;
        if state.locate_accepted() {
            return Err(GateFailure::LocateAlreadyAccepted);
        }
        Self::volume_check(state)
    }

    pub fn pre_trade(&self, state: &TickerState) -> Result<(), GateFailure> {
        let accepted = state.locate_accepted();
        if !state.locate_available && !accepted {
            return Err(GateFailure::LocateUnavailable);
        }
        if !accepted {
            self.cost_check(state)?;
        }
        Self::volume_check(state)?;
        if state.shares_in_position != 0 {
            return Err(GateFailure::AlreadyInPosition(state.shares_in_position));
        }
        Ok(())
    }

    /// Recompute `pre_locate_check_passed`
    pub fn apply_pre_locate(&self, state: &mut TickerState) -> bool {
        let outcome = self.pre_locate(state);
        if let Err(reason) = &outcome {
            info!("{}: pre-locate check failed: {}", state.symbol, reason);
        }
        state.pre_locate_check_passed = outcome.is_ok();
        state.pre_locate_check_passed
    }

    /// Recompute `pre_trade_check_passed`
    pub fn apply_pre_trade(&self, state: &mut TickerState) -> bool {
        let outcome = self.pre_trade(state);
        if let Err(reason) = &outcome {
            info!("{}: pre-trade check failed: {}", state.symbol, reason);
        }
        state.pre_trade_check_passed = outcome.is_ok();
        state.pre_trade_check_passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::LocateOrderStatus;
    use rust_decimal_macros::dec;

    fn gate() -> TradeGate {
        TradeGate::new(dec!(0.004))
    }

    fn located(cost: Decimal) -> TickerState {
        let mut state = TickerState::new("TEST");
        state.target_notional = dec!(10000);
        state.locate_available = true;
        state.total_locate_cost = cost;
        state
    }

    #[test]
    fn test_pre_locate_cost_ceiling_is_inclusive() {
        assert_eq!(gate().pre_locate(&located(dec!(40))), Ok(()));
        assert_eq!(
            gate().pre_locate(&located(dec!(40.01))),
            Err(GateFailure::CostAboveCeiling {
                cost: dec!(40.01),
                ceiling: dec!(40)
            })
        );
    }

    #[test]
    fn test_pre_locate_blocks_duplicate_locate() {
        let mut state = located(dec!(1));
        state.locate_order_status = LocateOrderStatus::Accepted;
        assert_eq!(gate().pre_locate(&state), Err(GateFailure::LocateAlreadyAccepted));
    }

    #[test]
    fn test_pre_trade_bypasses_cost_once_accepted() {
        let mut state = located(dec!(500));
        state.locate_available = false;
        state.locate_order_status = LocateOrderStatus::Accepted;
        assert_eq!(gate().pre_trade(&state), Ok(()));
    }

    #[test]
    fn test_pre_trade_false_whenever_in_position() {
        for shares in [-300i64, -1, 1, 250] {
            let mut state = located(dec!(1));
            state.locate_order_status = LocateOrderStatus::Accepted;
            state.volume = dec!(1000000);
            state.shares_in_position = shares;
            assert!(!gate().apply_pre_trade(&mut state));
            assert!(!state.pre_trade_check_passed);
        }
    }

    #[test]
    fn test_gates_only_touch_their_flag() {
        let mut state = located(dec!(1));
        let before = state.clone();
        assert!(gate().apply_pre_locate(&mut state));
        assert!(gate().apply_pre_trade(&mut state));

        let mut expected = before;
        expected.pre_locate_check_passed = true;
        expected.pre_trade_check_passed = true;
        assert_eq!(state, expected);
    }

    #[test]
    fn test_negative_volume_fails_both() {
        let mut state = located(dec!(1));
        state.volume = dec!(-1);
        assert!(matches!(gate().pre_locate(&state), Err(GateFailure::NegativeVolume(_))));
        assert!(matches!(gate().pre_trade(&state), Err(GateFailure::NegativeVolume(_))));
    }
}
