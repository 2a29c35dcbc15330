use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of a venue position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
    Flat,
}

/// Authoritative size and side for one symbol, as reported by a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: PositionSide,
    /// Absolute size; direction lives in `side`.
    pub size: Decimal,
    pub entry_price: Decimal,
    pub mark_price: Decimal,
    pub unrealized_pnl: Decimal,
    pub realized_pnl: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    /// Creates a long position with zeroed price fields.
    #[must_use]
    pub fn long(symbol: impl Into<String>, size: Decimal) -> Self {
        Self::new(symbol, PositionSide::Long, size)
    }

    /// Creates a short position with zeroed price fields.
    #[must_use]
    pub fn short(symbol: impl Into<String>, size: Decimal) -> Self {
        Self::new(symbol, PositionSide::Short, size)
    }

    fn new(symbol: impl Into<String>, side: PositionSide, size: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            size: size.abs(),
            entry_price: Decimal::ZERO,
            mark_price: Decimal::ZERO,
            unrealized_pnl: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            updated_at: Utc::now(),
        }
    }

    /// Size with sign: positive for long, negative for short.
    #[must_use]
    pub fn signed_size(&self) -> Decimal {
        match self.side {
            PositionSide::Long => self.size,
            PositionSide::Short => -self.size,
            PositionSide::Flat => Decimal::ZERO,
        }
    }

    /// Notional at mark.
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.size * self.mark_price
    }
}
