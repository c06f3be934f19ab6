//! Share and notional sizing

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::types::TickerState;

/// Shares affordable at `bid` for `target_notional`, rounded down to the lot
pub fn shares_to_locate(target_notional: Decimal, bid: Decimal, round_lot: u64) -> u64 {
    if bid <= Decimal::ZERO || target_notional <= Decimal::ZERO {
        return 0;
    }
    let shares = (target_notional / bid).floor().to_u64().unwrap_or(0);
    let lot = round_lot.max(1);
    shares - shares % lot
}

/// Equal split of the portfolio, capped per ticker
pub fn notional_per_ticker(portfolio_value: Decimal, tickers: usize, max_fraction: Decimal) -> Decimal {
    if tickers == 0 || portfolio_value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let equal = portfolio_value / Decimal::from(tickers);
    let cap = portfolio_value * max_fraction;
    equal.min(cap)
}

/// Size the locate from the current bid
pub fn update_shares_to_locate(state: &mut TickerState, round_lot: u64) {
    state.shares_to_locate = shares_to_locate(state.target_notional, state.last_bid, round_lot);
}

/// Shares that may be shorted now: the full locate size once it is covered
pub fn update_shares_to_short(state: &mut TickerState) {
    state.shares_to_short = if state.locate_accepted() || state.shortable {
        state.shares_to_locate
    } else {
        0
    };
}
