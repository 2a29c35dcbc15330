//! Basis strategy definitions and spread readings.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A configured basis trade between a spot instrument and its perpetual.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Strategy {
    /// Unique identifier.
    pub id: String,

    /// Spot leg symbol (e.g., "BTC-USD").
    pub spot_symbol: String,

    /// Future leg symbol (e.g., "BTC-PERP").
    pub future_symbol: String,

    /// Basis percent at or above which a position is entered.
    pub target_basis: Decimal,

    /// Maximum absolute position size on the spot leg.
    pub max_position: Decimal,

    /// Size of one trade tranche.
    pub min_trade_size: Decimal,

    /// Basis change that warrants rebalancing. Carried for the request layer.
    pub rebalance_threshold: Decimal,

    /// Inactive strategies are kept but never evaluated.
    pub is_active: bool,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Strategy {
    /// Creates an active strategy with zero rebalance threshold.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        spot_symbol: impl Into<String>,
        future_symbol: impl Into<String>,
        target_basis: Decimal,
        max_position: Decimal,
        min_trade_size: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            spot_symbol: spot_symbol.into(),
            future_symbol: future_symbol.into(),
            target_basis,
            max_position,
            min_trade_size,
            rebalance_threshold: Decimal::ZERO,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the rebalance threshold.
    #[must_use]
    pub fn with_rebalance_threshold(mut self, threshold: Decimal) -> Self {
        self.rebalance_threshold = threshold;
        self
    }

    /// Sets the active flag.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.is_active = active;
        self
    }

    /// Both symbols this strategy needs prices for.
    #[must_use]
    pub fn symbols(&self) -> [&str; 2] {
        [&self.spot_symbol, &self.future_symbol]
    }
}

/// A point-in-time spread reading for one strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasisSnapshot {
    /// Strategy this reading was computed for.
    pub strategy_id: String,

    /// Spot symbol.
    pub spot_symbol: String,

    /// Spot last price.
    pub spot_price: Decimal,

    /// Future symbol.
    pub future_symbol: String,

    /// Future last price.
    pub future_price: Decimal,

    /// Absolute basis (future - spot).
    pub basis: Decimal,

    /// Basis as a percentage of spot.
    pub basis_percent: Decimal,

    /// When the reading was computed.
    pub timestamp: DateTime<Utc>,
}
