//! Basis computation and the entry/exit decision.
//!
//! Both functions are pure: they read a strategy, cached tickers and the
//! current spot position and never touch venue state.

use basis_trade_core::{BasisSnapshot, Strategy, Ticker};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Fraction of the target basis at or below which an open position is unwound.
pub const EXIT_THRESHOLD_RATIO: Decimal = dec!(0.5);

/// What the evaluator wants done for a strategy this cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    /// Open a tranche: buy spot, sell future.
    Enter,
    /// Close a tranche: buy back future, sell spot.
    Exit,
    /// Do nothing.
    Hold,
}

/// Computes the basis for a strategy from its two tickers.
///
/// Returns `None` when either ticker is missing or the spot price is not
/// positive.
#[must_use]
pub fn evaluate(strategy: &Strategy, spot: Option<&Ticker>, future: Option<&Ticker>) -> Option<BasisSnapshot> {
    let (spot, future) = (spot?, future?);
    if spot.last_price <= Decimal::ZERO {
        return None;
    }

    let basis = future.last_price - spot.last_price;
    let basis_percent = basis / spot.last_price * dec!(100);

    Some(BasisSnapshot {
        strategy_id: strategy.id.clone(),
        spot_symbol: strategy.spot_symbol.clone(),
        spot_price: spot.last_price,
        future_symbol: strategy.future_symbol.clone(),
        future_price: future.last_price,
        basis,
        basis_percent,
        timestamp: Utc::now(),
    })
}

/// Entry condition: basis at or above target with room left under the cap.
#[must_use]
pub fn should_enter(strategy: &Strategy, basis_percent: Decimal, position: Decimal) -> bool {
    basis_percent >= strategy.target_basis && position.abs() < strategy.max_position
}

/// Exit condition: basis collapsed to half the target or lower while long spot.
#[must_use]
pub fn should_exit(strategy: &Strategy, basis_percent: Decimal, position: Decimal) -> bool {
    basis_percent <= strategy.target_basis * EXIT_THRESHOLD_RATIO && position > Decimal::ZERO
}

/// Maps a snapshot and the current spot position to a signal.
#[must_use]
pub fn decide(strategy: &Strategy, snapshot: &BasisSnapshot, position: Decimal) -> Signal {
    if should_enter(strategy, snapshot.basis_percent, position) {
        Signal::Enter
    } else if should_exit(strategy, snapshot.basis_percent, position) {
        Signal::Exit
    } else {
        Signal::Hold
    }
}
