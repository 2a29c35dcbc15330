//! Market data models shared by the venue clients and the engine.
//!
//! All prices and sizes use `rust_decimal::Decimal`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Latest observed price for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    /// Instrument symbol (e.g., "BTC-USD", "BTC-PERP").
    pub symbol: String,

    /// Last traded price.
    pub last_price: Decimal,

    /// Best bid price.
    pub bid_price: Decimal,

    /// Size resting at the best bid.
    pub bid_size: Decimal,

    /// Best ask price.
    pub ask_price: Decimal,

    /// Size resting at the best ask.
    pub ask_size: Decimal,

    /// Size of the last trade.
    pub last_size: Decimal,

    /// Rolling 24h volume, when the venue reports it.
    pub volume_24h: Decimal,

    /// Venue timestamp of the observation.
    pub timestamp: DateTime<Utc>,
}

impl Ticker {
    /// Creates a ticker with only a last price, leaving book fields at zero.
    #[must_use]
    pub fn from_last(symbol: impl Into<String>, last_price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            last_price,
            bid_price: Decimal::ZERO,
            bid_size: Decimal::ZERO,
            ask_price: Decimal::ZERO,
            ask_size: Decimal::ZERO,
            last_size: Decimal::ZERO,
            volume_24h: Decimal::ZERO,
            timestamp: Utc::now(),
        }
    }

    /// Sets the best bid and ask.
    #[must_use]
    pub fn with_quote(mut self, bid: Decimal, ask: Decimal) -> Self {
        self.bid_price = bid;
        self.ask_price = ask;
        self
    }

    /// Returns the mid price, if both sides of the quote are present.
    #[must_use]
    pub fn mid_price(&self) -> Option<Decimal> {
        if self.bid_price > Decimal::ZERO && self.ask_price > Decimal::ZERO {
            Some((self.bid_price + self.ask_price) / Decimal::TWO)
        } else {
            None
        }
    }

    /// Returns the quoted spread, if both sides are present.
    #[must_use]
    pub fn spread(&self) -> Option<Decimal> {
        self.mid_price().map(|_| self.ask_price - self.bid_price)
    }
}

/// A single price level in an order book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookLevel {
    /// Level price.
    pub price: Decimal,

    /// Aggregate size at this price.
    pub size: Decimal,

    /// Number of orders at this level (0 if not reported).
    pub num_orders: u32,
}

/// Aggregated order book snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    /// Instrument symbol.
    pub symbol: String,

    /// Bids, best first.
    pub bids: Vec<BookLevel>,

    /// Asks, best first.
    pub asks: Vec<BookLevel>,

    /// Snapshot time.
    pub timestamp: DateTime<Utc>,
}

impl OrderBook {
    /// Best bid level.
    #[must_use]
    pub fn best_bid(&self) -> Option<&BookLevel> {
        self.bids.first()
    }

    /// Best ask level.
    #[must_use]
    pub fn best_ask(&self) -> Option<&BookLevel> {
        self.asks.first()
    }

    /// Total size on the bid side.
    #[must_use]
    pub fn bid_depth(&self) -> Decimal {
        self.bids.iter().map(|l| l.size).sum()
    }

    /// Total size on the ask side.
    #[must_use]
    pub fn ask_depth(&self) -> Decimal {
        self.asks.iter().map(|l| l.size).sum()
    }
}

/// Whether a symbol trades on the spot or the derivatives venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    /// Spot instrument.
    Spot,
    /// Perpetual future.
    Future,
}

impl std::fmt::Display for MarketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Spot => write!(f, "spot"),
            Self::Future => write!(f, "future"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ticker_mid_price() {
        let ticker = Ticker::from_last("BTC-USD", dec!(100)).with_quote(dec!(99), dec!(101));
        assert_eq!(ticker.mid_price(), Some(dec!(100)));
        assert_eq!(ticker.spread(), Some(dec!(2)));
    }

    #[test]
    fn test_ticker_mid_price_missing_side() {
        let ticker = Ticker::from_last("BTC-USD", dec!(100));
        assert_eq!(ticker.mid_price(), None);
        assert_eq!(ticker.spread(), None);
    }

    #[test]
    fn test_order_book_depth() {
        let book = OrderBook {
            symbol: "BTC-USD".to_string(),
            bids: vec![
                BookLevel { price: dec!(99), size: dec!(1.5), num_orders: 2 },
                BookLevel { price: dec!(98), size: dec!(2), num_orders: 1 },
            ],
            asks: vec![BookLevel { price: dec!(101), size: dec!(0.5), num_orders: 1 }],
            timestamp: Utc::now(),
        };

        assert_eq!(book.best_bid().map(|l| l.price), Some(dec!(99)));
        assert_eq!(book.best_ask().map(|l| l.price), Some(dec!(101)));
        assert_eq!(book.bid_depth(), dec!(3.5));
        assert_eq!(book.ask_depth(), dec!(0.5));
    }
}
