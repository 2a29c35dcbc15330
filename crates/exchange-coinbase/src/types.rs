//! Wire types for the Coinbase Advanced Trade v3 REST API.
//!
//! Numeric fields arrive as strings (sometimes empty), so raw structs keep
//! them as `Option<String>` and conversions parse leniently into `Decimal`.

use basis_trade_core::{
    BookLevel, Order, OrderBook, OrderRequest, OrderSide, OrderStatus, OrderType, Position,
    PositionSide, Ticker,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

fn parse_decimal(value: Option<&str>) -> Decimal {
    value
        .filter(|s| !s.is_empty())
        .and_then(|s| Decimal::from_str(s).ok())
        .unwrap_or_default()
}

fn parse_time(value: Option<&str>) -> Option<DateTime<Utc>> {
    value.and_then(|s| {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|d| d.with_timezone(&Utc))
    })
}

// =============================================================================
// Ticker
// =============================================================================

/// Response of `GET /products/{product_id}/ticker`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawTickerResponse {
    #[serde(default)]
    pub trades: Vec<RawTrade>,
    pub best_bid: Option<String>,
    pub best_ask: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawTrade {
    pub price: Option<String>,
    pub size: Option<String>,
    pub time: Option<String>,
}

impl RawTickerResponse {
    /// Converts into a ticker. Returns `None` if the venue reported no trades.
    pub(crate) fn into_ticker(self, symbol: &str) -> Option<Ticker> {
        let trade = self.trades.into_iter().next()?;
        Some(Ticker {
            symbol: symbol.to_string(),
            last_price: parse_decimal(trade.price.as_deref()),
            last_size: parse_decimal(trade.size.as_deref()),
            bid_price: parse_decimal(self.best_bid.as_deref()),
            bid_size: Decimal::ZERO,
            ask_price: parse_decimal(self.best_ask.as_deref()),
            ask_size: Decimal::ZERO,
            volume_24h: Decimal::ZERO,
            timestamp: parse_time(trade.time.as_deref()).unwrap_or_else(Utc::now),
        })
    }
}

// =============================================================================
// Order Book
// =============================================================================

/// Response of `GET /product_book`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawProductBookResponse {
    pub pricebook: RawPriceBook,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawPriceBook {
    #[serde(default)]
    pub bids: Vec<RawBookLevel>,
    #[serde(default)]
    pub asks: Vec<RawBookLevel>,
    pub time: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawBookLevel {
    pub price: Option<String>,
    pub size: Option<String>,
}

impl From<RawBookLevel> for BookLevel {
    fn from(raw: RawBookLevel) -> Self {
        Self {
            price: parse_decimal(raw.price.as_deref()),
            size: parse_decimal(raw.size.as_deref()),
            num_orders: 0,
        }
    }
}

impl RawPriceBook {
    pub(crate) fn into_order_book(self, symbol: &str) -> OrderBook {
        OrderBook {
            symbol: symbol.to_string(),
            bids: self.bids.into_iter().map(BookLevel::from).collect(),
            asks: self.asks.into_iter().map(BookLevel::from).collect(),
            timestamp: parse_time(self.time.as_deref()).unwrap_or_else(Utc::now),
        }
    }
}

// =============================================================================
// Positions
// =============================================================================

/// Response of `GET /accounts`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawAccountsResponse {
    #[serde(default)]
    pub accounts: Vec<RawAccount>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawAccount {
    pub currency: String,
    pub available_balance: Option<RawAmount>,
    pub hold: Option<RawAmount>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawAmount {
    pub value: Option<String>,
}

impl RawAccount {
    fn total(&self) -> Decimal {
        let available = self
            .available_balance
            .as_ref()
            .map(|a| parse_decimal(a.value.as_deref()))
            .unwrap_or_default();
        let hold = self
            .hold
            .as_ref()
            .map(|a| parse_decimal(a.value.as_deref()))
            .unwrap_or_default();
        available + hold
    }

    /// Spot holdings become long positions on `{currency}-{quote}`. The quote
    /// currency itself and empty balances are skipped.
    pub(crate) fn into_position(self, quote_currency: &str) -> Option<Position> {
        if self.currency.eq_ignore_ascii_case(quote_currency) {
            return None;
        }
        let total = self.total();
        if total <= Decimal::ZERO {
            return None;
        }
        Some(Position::long(format!("{}-{}", self.currency, quote_currency), total))
    }
}

/// Response of `GET /cfm/positions`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawFuturesPositionsResponse {
    #[serde(default)]
    pub positions: Vec<RawFuturesPosition>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawFuturesPosition {
    pub product_id: String,
    pub side: Option<String>,
    pub number_of_contracts: Option<String>,
    pub avg_entry_price: Option<String>,
    pub current_price: Option<String>,
    pub unrealized_pnl: Option<String>,
    pub daily_realized_pnl: Option<String>,
}

impl From<RawFuturesPosition> for Position {
    fn from(raw: RawFuturesPosition) -> Self {
        let size = parse_decimal(raw.number_of_contracts.as_deref()).abs();
        let side = match raw.side.as_deref() {
            _ if size.is_zero() => PositionSide::Flat,
            Some(s) if s.eq_ignore_ascii_case("SHORT") => PositionSide::Short,
            _ => PositionSide::Long,
        };

        Self {
            symbol: raw.product_id,
            side,
            size,
            entry_price: parse_decimal(raw.avg_entry_price.as_deref()),
            mark_price: parse_decimal(raw.current_price.as_deref()),
            unrealized_pnl: parse_decimal(raw.unrealized_pnl.as_deref()),
            realized_pnl: parse_decimal(raw.daily_realized_pnl.as_deref()),
            updated_at: Utc::now(),
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// Body of `POST /orders`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct CreateOrderBody {
    pub client_order_id: String,
    pub product_id: String,
    pub side: &'static str,
    pub order_configuration: OrderConfiguration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum OrderConfiguration {
    LimitLimitGtc {
        base_size: String,
        limit_price: String,
        post_only: bool,
    },
    MarketMarketIoc {
        base_size: String,
    },
}

impl CreateOrderBody {
    pub(crate) fn from_request(request: &OrderRequest, client_order_id: String) -> Self {
        let order_configuration = match request.order_type {
            OrderType::Market => OrderConfiguration::MarketMarketIoc {
                base_size: request.size.normalize().to_string(),
            },
            OrderType::Limit | OrderType::Stop => OrderConfiguration::LimitLimitGtc {
                base_size: request.size.normalize().to_string(),
                limit_price: request.price.normalize().to_string(),
                post_only: request.post_only,
            },
        };

        Self {
            client_order_id,
            product_id: request.symbol.clone(),
            side: request.side.as_api_str(),
            order_configuration,
        }
    }
}

/// Response of `POST /orders`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawCreateOrderResponse {
    pub success: bool,
    pub success_response: Option<RawCreateOrderSuccess>,
    pub error_response: Option<RawCreateOrderFailure>,
    pub failure_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawCreateOrderSuccess {
    pub order_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawCreateOrderFailure {
    pub error: Option<String>,
    pub message: Option<String>,
    pub preview_failure_reason: Option<String>,
}

impl RawCreateOrderResponse {
    /// Best available explanation for a rejected order.
    pub(crate) fn rejection_reason(&self) -> String {
        self.error_response
            .as_ref()
            .and_then(|e| {
                e.message
                    .clone()
                    .filter(|m| !m.is_empty())
                    .or_else(|| e.preview_failure_reason.clone())
                    .or_else(|| e.error.clone())
            })
            .or_else(|| self.failure_reason.clone())
            .unwrap_or_else(|| "unknown reason".to_string())
    }
}

/// Body of `POST /orders/batch_cancel`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct BatchCancelBody {
    pub order_ids: Vec<String>,
}

/// Response of `POST /orders/batch_cancel`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawBatchCancelResponse {
    #[serde(default)]
    pub results: Vec<RawCancelResult>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawCancelResult {
    pub success: bool,
    pub failure_reason: Option<String>,
    pub order_id: Option<String>,
}

/// Response of `GET /orders/historical/{order_id}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawOrderResponse {
    pub order: RawOrder,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawOrder {
    pub order_id: String,
    pub product_id: String,
    pub side: Option<String>,
    pub client_order_id: Option<String>,
    pub status: Option<String>,
    pub order_type: Option<String>,
    pub filled_size: Option<String>,
    pub average_filled_price: Option<String>,
    pub created_time: Option<String>,
    pub last_fill_time: Option<String>,
    pub order_configuration: Option<serde_json::Value>,
}

impl RawOrder {
    /// Pulls `base_size` and `limit_price` out of whichever configuration
    /// variant the order was placed with.
    fn configured_size_and_price(&self) -> (Decimal, Decimal) {
        let Some(config) = self.order_configuration.as_ref().and_then(|c| c.as_object()) else {
            return (Decimal::ZERO, Decimal::ZERO);
        };
        let Some(inner) = config.values().next() else {
            return (Decimal::ZERO, Decimal::ZERO);
        };
        let field = |name: &str| parse_decimal(inner.get(name).and_then(|v| v.as_str()));
        (field("base_size"), field("limit_price"))
    }
}

fn parse_status(status: Option<&str>, filled: Decimal) -> OrderStatus {
    match status {
        Some("FILLED") => OrderStatus::Filled,
        Some("CANCELLED" | "EXPIRED") => OrderStatus::Cancelled,
        Some("FAILED") => OrderStatus::Rejected,
        _ if filled > Decimal::ZERO => OrderStatus::PartiallyFilled,
        _ => OrderStatus::New,
    }
}

impl From<RawOrder> for Order {
    fn from(raw: RawOrder) -> Self {
        let (size, price) = raw.configured_size_and_price();
        let filled_size = parse_decimal(raw.filled_size.as_deref());
        let avg = parse_decimal(raw.average_filled_price.as_deref());
        let created_at = parse_time(raw.created_time.as_deref()).unwrap_or_else(Utc::now);

        Self {
            order_id: raw.order_id,
            client_order_id: raw.client_order_id.filter(|s| !s.is_empty()),
            symbol: raw.product_id,
            side: match raw.side.as_deref() {
                Some("SELL") => OrderSide::Sell,
                _ => OrderSide::Buy,
            },
            order_type: match raw.order_type.as_deref() {
                Some("MARKET") => OrderType::Market,
                Some("STOP" | "STOP_LIMIT") => OrderType::Stop,
                _ => OrderType::Limit,
            },
            price,
            size,
            filled_size,
            avg_fill_price: (avg > Decimal::ZERO).then_some(avg),
            status: parse_status(raw.status.as_deref(), filled_size),
            created_at,
            updated_at: parse_time(raw.last_fill_time.as_deref()).unwrap_or(created_at),
        }
    }
}
