//! Two-leg trade record and its state machine.
//!
//! ```text
//! Initiated ──> LegAPlaced ──> Completed
//!     │              │
//!     │              └──> Compensating ──> Compensated
//!     │                         │
//!     │                         └──> Orphaned
//!     └──> Failed
//! ```

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Whether the trade opens or closes a tranche.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeSide {
    Enter,
    Exit,
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enter => write!(f, "enter"),
            Self::Exit => write!(f, "exit"),
        }
    }
}

/// Saga progress of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Initiated,
    LegAPlaced,
    Completed,
    Compensating,
    Compensated,
    Orphaned,
    Failed,
}

impl TradeStatus {
    /// Whether no further transition is possible.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Compensated | Self::Orphaned | Self::Failed
        )
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use TradeStatus::*;
        matches!(
            (self, next),
            (Initiated, LegAPlaced)
                | (Initiated, Failed)
                | (LegAPlaced, Completed)
                | (LegAPlaced, Compensating)
                | (Compensating, Compensated)
                | (Compensating, Orphaned)
        )
    }
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Initiated => "initiated",
            Self::LegAPlaced => "leg_a_placed",
            Self::Completed => "completed",
            Self::Compensating => "compensating",
            Self::Compensated => "compensated",
            Self::Orphaned => "orphaned",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Rejected state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("illegal trade transition {from} -> {to}")]
pub struct TransitionError {
    pub from: TradeStatus,
    pub to: TradeStatus,
}

/// One attempted two-leg execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: Uuid,
    pub strategy_id: String,
    pub side: TradeSide,

    /// Symbol of the leg placed first.
    pub leg_a_symbol: String,
    /// Symbol of the hedge leg.
    pub leg_b_symbol: String,
    pub leg_a_order_id: Option<String>,
    pub leg_b_order_id: Option<String>,
    /// Limit price sent for leg A.
    pub leg_a_price: Decimal,
    /// Limit price sent for leg B.
    pub leg_b_price: Decimal,

    /// Spot price at decision time.
    pub spot_price: Decimal,
    /// Future price at decision time.
    pub future_price: Decimal,
    /// Basis percent at decision time.
    pub basis_percent: Decimal,
    pub size: Decimal,

    pub status: TradeStatus,
    /// Last venue error seen by the saga.
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Trade {
    /// Moves to `next`, stamping `completed_at` on terminal states.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] if the edge is not in the state machine;
    /// the trade is left unchanged.
    pub fn transition(&mut self, next: TradeStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Notional of leg A at its limit price.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.size * self.leg_a_price
    }
}
