//! Order request and order state models.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    /// Buy.
    Buy,
    /// Sell.
    Sell,
}

impl OrderSide {
    /// Returns the opposite side.
    #[must_use]
    pub fn opposite(self) -> Self {
        match self {
            Self::Buy => Self::Sell,
            Self::Sell => Self::Buy,
        }
    }

    /// Returns the API string representation.
    #[must_use]
    pub fn as_api_str(self) -> &'static str {
        match self {
            Self::Buy => "BUY",
            Self::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    /// Market order.
    Market,
    /// Limit order.
    Limit,
    /// Stop order.
    Stop,
}

/// Time in force for limit orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good till cancelled.
    #[default]
    Gtc,
    /// Immediate or cancel.
    Ioc,
    /// Fill or kill.
    Fok,
}

/// Order lifecycle status as reported by a venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Accepted, not yet filled.
    New,
    /// Partially filled.
    PartiallyFilled,
    /// Fully filled.
    Filled,
    /// Cancelled.
    Cancelled,
    /// Rejected by the venue.
    Rejected,
}

impl OrderStatus {
    /// Returns true if the order can no longer change.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Filled | Self::Cancelled | Self::Rejected)
    }

    /// Returns true if the order has any fills.
    #[must_use]
    pub fn has_fills(self) -> bool {
        matches!(self, Self::PartiallyFilled | Self::Filled)
    }
}

/// Request to place an order on a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Instrument symbol.
    pub symbol: String,

    /// Buy or sell.
    pub side: OrderSide,

    /// Order type.
    pub order_type: OrderType,

    /// Limit price (ignored for market orders).
    pub price: Decimal,

    /// Base size.
    pub size: Decimal,

    /// Time in force.
    pub time_in_force: TimeInForce,

    /// Only add liquidity.
    pub post_only: bool,

    /// Only reduce an existing position.
    pub reduce_only: bool,

    /// Client-supplied idempotency key, if any.
    pub client_order_id: Option<String>,
}

impl OrderRequest {
    /// Creates a GTC limit order.
    #[must_use]
    pub fn limit(symbol: impl Into<String>, side: OrderSide, price: Decimal, size: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            order_type: OrderType::Limit,
            price,
            size,
            time_in_force: TimeInForce::Gtc,
            post_only: false,
            reduce_only: false,
            client_order_id: None,
        }
    }

    /// Limit buy.
    #[must_use]
    pub fn limit_buy(symbol: impl Into<String>, price: Decimal, size: Decimal) -> Self {
        Self::limit(symbol, OrderSide::Buy, price, size)
    }

    /// Limit sell.
    #[must_use]
    pub fn limit_sell(symbol: impl Into<String>, price: Decimal, size: Decimal) -> Self {
        Self::limit(symbol, OrderSide::Sell, price, size)
    }

    /// Sets the client order id.
    #[must_use]
    pub fn with_client_order_id(mut self, id: impl Into<String>) -> Self {
        self.client_order_id = Some(id.into());
        self
    }

    /// Marks the order reduce-only.
    #[must_use]
    pub fn reduce_only(mut self) -> Self {
        self.reduce_only = true;
        self
    }

    /// Notional value (price x size).
    #[must_use]
    pub fn notional(&self) -> Decimal {
        self.price * self.size
    }
}

/// An order as known by a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    /// Venue order id.
    pub order_id: String,

    /// Client order id, if one was supplied.
    pub client_order_id: Option<String>,

    /// Instrument symbol.
    pub symbol: String,

    /// Side.
    pub side: OrderSide,

    /// Type.
    pub order_type: OrderType,

    /// Limit price.
    pub price: Decimal,

    /// Requested size.
    pub size: Decimal,

    /// Filled size.
    pub filled_size: Decimal,

    /// Average fill price, if any fills.
    pub avg_fill_price: Option<Decimal>,

    /// Current status.
    pub status: OrderStatus,

    /// Creation time.
    pub created_at: DateTime<Utc>,

    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds a freshly accepted order from the request that created it.
    #[must_use]
    pub fn accepted(order_id: impl Into<String>, request: &OrderRequest) -> Self {
        let now = Utc::now();
        Self {
            order_id: order_id.into(),
            client_order_id: request.client_order_id.clone(),
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            price: request.price,
            size: request.size,
            filled_size: Decimal::ZERO,
            avg_fill_price: None,
            status: OrderStatus::New,
            created_at: now,
            updated_at: now,
        }
    }

    /// Size still open.
    #[must_use]
    pub fn remaining_size(&self) -> Decimal {
        (self.size - self.filled_size).max(Decimal::ZERO)
    }

    /// Returns true if fully filled.
    #[must_use]
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }
}
