//! Coinbase Advanced Trade REST client with rate limiting.
//!
//! One [`CoinbaseClient`] serves one venue role (spot or derivatives). It
//! implements [`VenueClient`] so the engine can treat both roles uniformly.
//!
//! # Example
//!
//! ```ignore
//! use basis_trade_coinbase::{CoinbaseClient, VenueRole};
//! use basis_trade_core::{VenueClient, VenueConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = CoinbaseClient::from_config(&VenueConfig::spot(), VenueRole::Spot, tracing::Span::current())?;
//!     let ticker = client.get_ticker("BTC-USD").await?;
//!     println!("BTC last: {}", ticker.last_price);
//!     Ok(())
//! }
//! ```

use crate::auth::{self, Authenticator};
use crate::error::{CoinbaseError, Result};
use crate::types::{
    BatchCancelBody, CreateOrderBody, RawAccountsResponse, RawBatchCancelResponse,
    RawCreateOrderResponse, RawFuturesPositionsResponse, RawOrderResponse,
    RawProductBookResponse, RawTickerResponse,
};
use crate::websocket::CoinbaseWebSocket;
use async_trait::async_trait;
use basis_trade_core::{
    Order, OrderBook, OrderRequest, Position, Ticker, VenueClient, VenueConfig, VenueResult,
};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use reqwest::{Client, Method, Url};
use serde::{de::DeserializeOwned, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

// =============================================================================
// Constants
// =============================================================================

/// Coinbase production REST base URL.
pub const COINBASE_API_URL: &str = "https://api.coinbase.com";

/// Advanced Trade websocket URL.
pub const COINBASE_WS_URL: &str = "wss://advanced-trade-ws.coinbase.com";

/// Path prefix shared by all Advanced Trade endpoints.
const BROKERAGE: &str = "/api/v3/brokerage";

/// Largest order book depth requested.
const MAX_BOOK_LEVEL: u32 = 500;

// =============================================================================
// Configuration
// =============================================================================

/// Which account model the client reads positions from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VenueRole {
    /// Balances under `/accounts` become long positions.
    Spot,
    /// Positions come from `/cfm/positions`.
    Derivatives,
}

/// Configuration for the Coinbase client.
#[derive(Debug, Clone)]
pub struct CoinbaseClientConfig {
    /// Label used in logs and [`VenueClient::name`].
    pub name: String,

    /// Base URL for REST calls.
    pub base_url: String,

    /// Websocket URL.
    pub ws_url: String,

    /// Requests per second limit.
    pub requests_per_second: NonZeroU32,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Quote currency for spot positions.
    pub quote_currency: String,

    /// Position source.
    pub role: VenueRole,
}

impl Default for CoinbaseClientConfig {
    fn default() -> Self {
        Self {
            name: "coinbase".to_string(),
            base_url: COINBASE_API_URL.to_string(),
            ws_url: COINBASE_WS_URL.to_string(),
            requests_per_second: nonzero!(10u32),
            timeout: Duration::from_secs(10),
            quote_currency: "USD".to_string(),
            role: VenueRole::Spot,
        }
    }
}

impl CoinbaseClientConfig {
    /// Builds a client config from a venue section of the app config.
    #[must_use]
    pub fn from_venue(venue: &VenueConfig, role: VenueRole) -> Self {
        Self {
            name: venue.name.clone(),
            base_url: venue.base_url.clone(),
            ws_url: venue.ws_url.clone(),
            requests_per_second: NonZeroU32::new(venue.requests_per_second)
                .unwrap_or(nonzero!(1u32)),
            timeout: venue.timeout,
            quote_currency: venue.quote_currency.clone(),
            role,
        }
    }

    /// Sets the base URL.
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the rate limit.
    #[must_use]
    pub fn with_rate_limit(mut self, requests_per_second: NonZeroU32) -> Self {
        self.requests_per_second = requests_per_second;
        self
    }

    /// Sets the position source.
    #[must_use]
    pub fn with_role(mut self, role: VenueRole) -> Self {
        self.role = role;
        self
    }

    /// Sets the log label.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

// =============================================================================
// CoinbaseClient
// =============================================================================

/// Coinbase Advanced Trade client.
///
/// All requests are rate-limited and authenticated.
pub struct CoinbaseClient {
    config: CoinbaseClientConfig,
    http: Client,
    host: String,
    rate_limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
    auth: Arc<dyn Authenticator>,
    websocket: CoinbaseWebSocket,
    span: tracing::Span,
}

impl std::fmt::Debug for CoinbaseClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoinbaseClient")
            .field("name", &self.config.name)
            .field("base_url", &self.config.base_url)
            .field("auth", &self.auth.scheme())
            .finish_non_exhaustive()
    }
}

impl CoinbaseClient {
    /// Creates a client with an explicit authenticator.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the HTTP client cannot be built.
    pub fn new(
        config: CoinbaseClientConfig,
        auth: Arc<dyn Authenticator>,
        span: tracing::Span,
    ) -> Result<Self> {
        let host = Url::parse(&config.base_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .ok_or_else(|| {
                CoinbaseError::Configuration(format!("invalid base URL: {}", config.base_url))
            })?;

        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| CoinbaseError::Network(format!("failed to build HTTP client: {e}")))?;

        let quota = Quota::per_second(config.requests_per_second);
        let rate_limiter = Arc::new(RateLimiter::direct(quota));
        let websocket = CoinbaseWebSocket::new(&config.ws_url, Arc::clone(&auth), span.clone());

        tracing::debug!(parent: &span, base_url = %config.base_url, auth = auth.scheme(), "coinbase client ready");

        Ok(Self {
            config,
            http,
            host,
            rate_limiter,
            auth,
            websocket,
            span,
        })
    }

    /// Creates a client from a venue config section, reading credentials from
    /// the environment variables it names.
    ///
    /// # Errors
    /// Returns error if credentials are missing or invalid.
    pub fn from_config(venue: &VenueConfig, role: VenueRole, span: tracing::Span) -> Result<Self> {
        let auth = auth::from_config(&venue.auth)?;
        Self::new(CoinbaseClientConfig::from_venue(venue, role), auth, span)
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Returns the websocket feed.
    #[must_use]
    pub fn websocket(&self) -> &CoinbaseWebSocket {
        &self.websocket
    }

    /// Validates a product id or order id before it is placed in a URL path.
    ///
    /// Valid segments contain only alphanumeric characters, hyphens, and
    /// underscores. Examples: "BTC-USD", "BTC-PERP", "a1b2c3d4-0000-1111".
    fn validate_segment<'a>(kind: &str, value: &'a str) -> Result<&'a str> {
        if value.is_empty() {
            return Err(CoinbaseError::InvalidRequest(format!("{kind} cannot be empty")));
        }

        if value.contains("..") || value.contains('/') || value.contains('\\') {
            return Err(CoinbaseError::InvalidRequest(format!(
                "invalid {kind}: contains forbidden characters: {value}"
            )));
        }

        if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
            return Err(CoinbaseError::InvalidRequest(format!(
                "invalid {kind}: must contain only alphanumeric, hyphen, or underscore: {value}"
            )));
        }

        if value.len() > 128 {
            return Err(CoinbaseError::InvalidRequest(format!(
                "invalid {kind}: exceeds maximum length of 128: {}",
                value.len()
            )));
        }

        Ok(value)
    }

    /// Waits for the rate limiter and sends an authenticated request.
    ///
    /// `path` may carry a query string; only the part before `?` is signed.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.config.base_url, path);
        let sign_path = path.split('?').next().unwrap_or(path);
        let body_str = body.as_deref().unwrap_or("");
        let headers = self
            .auth
            .request_headers(method.as_str(), &self.host, sign_path, body_str)?;

        tracing::debug!(parent: &self.span, method = %method, url = %url, body_len = body_str.len(), "request");

        let mut request = self
            .http
            .request(method, &url)
            .header("Accept", "application/json");
        for (name, value) in headers.iter() {
            request = request.header(name, value);
        }
        if let Some(body) = body {
            request = request.header("Content-Type", "application/json").body(body);
        }

        let response = request.send().await?;
        self.handle_response(response).await
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        let body_json = serde_json::to_string(body)?;
        self.request(Method::POST, path, Some(body_json)).await
    }

    /// Handles API response, converting errors appropriately.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(1);
            return Err(CoinbaseError::rate_limit(retry_after));
        }

        if status.as_u16() == 401 || status.as_u16() == 403 {
            let text = response.text().await.unwrap_or_default();
            return Err(CoinbaseError::Authentication(format!("{status}: {text}")));
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CoinbaseError::api(status.as_u16(), text));
        }

        let body = response.json::<T>().await?;
        Ok(body)
    }

    // =========================================================================
    // Market Endpoints
    // =========================================================================

    /// Gets the latest trade and best quote for a product.
    ///
    /// # Errors
    /// Returns error if the API call fails or the product has no trades.
    pub async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker> {
        let symbol = Self::validate_segment("symbol", symbol)?;
        let path = format!("{BROKERAGE}/products/{symbol}/ticker?limit=1");

        let response: RawTickerResponse = self.get(&path).await?;
        response
            .into_ticker(symbol)
            .ok_or_else(|| CoinbaseError::api(404, format!("no trades for {symbol}")))
    }

    /// Gets the aggregated order book for a product.
    ///
    /// # Errors
    /// Returns error if the API call fails.
    pub async fn fetch_order_book(&self, symbol: &str, level: u32) -> Result<OrderBook> {
        let symbol = Self::validate_segment("symbol", symbol)?;
        let path = format!(
            "{BROKERAGE}/product_book?product_id={symbol}&limit={}",
            level.clamp(1, MAX_BOOK_LEVEL)
        );

        let response: RawProductBookResponse = self.get(&path).await?;
        Ok(response.pricebook.into_order_book(symbol))
    }

    // =========================================================================
    // Portfolio Endpoints
    // =========================================================================

    /// Gets positions for this venue's role.
    ///
    /// # Errors
    /// Returns error if the API call fails.
    pub async fn fetch_positions(&self) -> Result<Vec<Position>> {
        match self.config.role {
            VenueRole::Spot => {
                let response: RawAccountsResponse =
                    self.get(&format!("{BROKERAGE}/accounts?limit=250")).await?;
                Ok(response
                    .accounts
                    .into_iter()
                    .filter_map(|a| a.into_position(&self.config.quote_currency))
                    .collect())
            }
            VenueRole::Derivatives => {
                let response: RawFuturesPositionsResponse =
                    self.get(&format!("{BROKERAGE}/cfm/positions")).await?;
                Ok(response.positions.into_iter().map(Position::from).collect())
            }
        }
    }

    // =========================================================================
    // Order Endpoints
    // =========================================================================

    /// Submits an order. A client order id is generated if none was given.
    ///
    /// # Errors
    /// Returns `OrderRejected` if the venue refuses the order.
    pub async fn submit_order(&self, request: &OrderRequest) -> Result<Order> {
        let client_order_id = request
            .client_order_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let body = CreateOrderBody::from_request(request, client_order_id.clone());

        let response: RawCreateOrderResponse = self.post(&format!("{BROKERAGE}/orders"), &body).await?;

        if !response.success {
            return Err(CoinbaseError::OrderRejected(response.rejection_reason()));
        }
        let order_id = response
            .success_response
            .map(|s| s.order_id)
            .ok_or_else(|| CoinbaseError::OrderRejected("no order id in response".to_string()))?;

        tracing::info!(
            parent: &self.span,
            order_id = %order_id,
            symbol = %request.symbol,
            side = %request.side,
            price = %request.price,
            size = %request.size,
            "order placed"
        );

        let mut order = Order::accepted(order_id, request);
        order.client_order_id = Some(client_order_id);
        Ok(order)
    }

    /// Cancels an order.
    ///
    /// # Errors
    /// Returns `OrderRejected` if the venue reports the cancel failed.
    pub async fn cancel(&self, order_id: &str) -> Result<()> {
        let order_id = Self::validate_segment("order id", order_id)?;
        let body = BatchCancelBody {
            order_ids: vec![order_id.to_string()],
        };

        let response: RawBatchCancelResponse = self
            .post(&format!("{BROKERAGE}/orders/batch_cancel"), &body)
            .await?;

        let result = response
            .results
            .into_iter()
            .find(|r| r.order_id.as_deref().map_or(true, |id| id == order_id))
            .ok_or_else(|| CoinbaseError::OrderRejected(format!("no cancel result for {order_id}")))?;

        if !result.success {
            return Err(CoinbaseError::OrderRejected(
                result
                    .failure_reason
                    .unwrap_or_else(|| "cancel failed".to_string()),
            ));
        }

        tracing::info!(parent: &self.span, order_id = %order_id, "order cancelled");
        Ok(())
    }

    /// Gets order status.
    ///
    /// # Errors
    /// Returns `OrderNotFound` if the venue does not know the order.
    pub async fn fetch_order(&self, order_id: &str) -> Result<Order> {
        let order_id = Self::validate_segment("order id", order_id)?;
        let path = format!("{BROKERAGE}/orders/historical/{order_id}");

        match self.get::<RawOrderResponse>(&path).await {
            Ok(response) => Ok(Order::from(response.order)),
            Err(CoinbaseError::Api {
                status_code: 404, ..
            }) => Err(CoinbaseError::order_not_found(order_id)),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl VenueClient for CoinbaseClient {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn get_ticker(&self, symbol: &str) -> VenueResult<Ticker> {
        Ok(self.fetch_ticker(symbol).await?)
    }

    async fn get_order_book(&self, symbol: &str, level: u32) -> VenueResult<OrderBook> {
        Ok(self.fetch_order_book(symbol, level).await?)
    }

    async fn get_positions(&self) -> VenueResult<Vec<Position>> {
        Ok(self.fetch_positions().await?)
    }

    async fn place_order(&self, request: &OrderRequest) -> VenueResult<Order> {
        Ok(self.submit_order(request).await?)
    }

    async fn cancel_order(&self, order_id: &str) -> VenueResult<()> {
        Ok(self.cancel(order_id).await?)
    }

    async fn get_order(&self, order_id: &str) -> VenueResult<Order> {
        Ok(self.fetch_order(order_id).await?)
    }

    async fn subscribe(&self, channels: &[String], symbols: &[String]) -> VenueResult<()> {
        Ok(self.websocket.subscribe(channels, symbols).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::HmacAuthenticator;
    use basis_trade_core::{OrderSide, OrderStatus, PositionSide, VenueError};
    use rust_decimal_macros::dec;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(server: &MockServer, role: VenueRole) -> CoinbaseClient {
        let auth = Arc::new(HmacAuthenticator::new(
            "test-key",
            SecretString::from("test-secret".to_string()),
            SecretString::from("test-pass".to_string()),
        ));
        let config = CoinbaseClientConfig::default()
            .with_base_url(server.uri())
            .with_rate_limit(nonzero!(1000u32))
            .with_role(role)
            .with_name("test");
        CoinbaseClient::new(config, auth, tracing::Span::none()).unwrap()
    }

    // ==================== Config Tests ====================

    #[test]
    fn test_client_config_default() {
        let config = CoinbaseClientConfig::default();
        assert_eq!(config.base_url, COINBASE_API_URL);
        assert_eq!(config.requests_per_second.get(), 10);
        assert_eq!(config.role, VenueRole::Spot);
    }

    #[test]
    fn test_client_config_from_venue() {
        let venue = VenueConfig::derivatives();
        let config = CoinbaseClientConfig::from_venue(&venue, VenueRole::Derivatives);
        assert_eq!(config.name, "derivatives");
        assert_eq!(config.role, VenueRole::Derivatives);
        assert_eq!(config.timeout, venue.timeout);
    }

    #[test]
    fn test_invalid_base_url() {
        let auth = Arc::new(HmacAuthenticator::new(
            "k",
            SecretString::from("s".to_string()),
            SecretString::from("p".to_string()),
        ));
        let config = CoinbaseClientConfig::default().with_base_url("not a url");
        let result = CoinbaseClient::new(config, auth, tracing::Span::none());
        assert!(matches!(result, Err(CoinbaseError::Configuration(_))));
    }

    // ==================== Input Validation Tests ====================

    #[test]
    fn test_validate_segment_valid() {
        assert!(CoinbaseClient::validate_segment("symbol", "BTC-USD").is_ok());
        assert!(CoinbaseClient::validate_segment("symbol", "BTC-PERP").is_ok());
        assert!(CoinbaseClient::validate_segment("order id", "a1b2-c3d4_e5").is_ok());
    }

    #[test]
    fn test_validate_segment_rejects_path_traversal() {
        assert!(CoinbaseClient::validate_segment("symbol", "../accounts").is_err());
        assert!(CoinbaseClient::validate_segment("symbol", "BTC/USD").is_err());
        assert!(CoinbaseClient::validate_segment("symbol", "BTC\\USD").is_err());
    }

    #[test]
    fn test_validate_segment_rejects_special_chars_and_empty() {
        assert!(CoinbaseClient::validate_segment("symbol", "").is_err());
        assert!(CoinbaseClient::validate_segment("symbol", "BTC USD").is_err());
        assert!(CoinbaseClient::validate_segment("symbol", "BTC?x=1").is_err());
        assert!(CoinbaseClient::validate_segment("symbol", &"A".repeat(129)).is_err());
    }

    // ==================== Market Endpoint Tests ====================

    #[tokio::test]
    async fn test_get_ticker() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/brokerage/products/BTC-USD/ticker"))
            .and(query_param("limit", "1"))
            .and(header_exists("CB-ACCESS-SIGN"))
            .and(header("CB-ACCESS-KEY", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "trades": [{"price": "100.5", "size": "0.1", "time": "2024-01-01T00:00:00Z"}],
                "best_bid": "100.4",
                "best_ask": "100.6"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, VenueRole::Spot);
        let ticker = client.get_ticker("BTC-USD").await.unwrap();
        assert_eq!(ticker.symbol, "BTC-USD");
        assert_eq!(ticker.last_price, dec!(100.5));
        assert_eq!(ticker.bid_price, dec!(100.4));
    }

    #[tokio::test]
    async fn test_get_order_book() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/brokerage/product_book"))
            .and(query_param("product_id", "BTC-USD"))
            .and(query_param("limit", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pricebook": {
                    "product_id": "BTC-USD",
                    "bids": [{"price": "99", "size": "1"}, {"price": "98", "size": "2"}],
                    "asks": [{"price": "101", "size": "0.5"}],
                    "time": "2024-01-01T00:00:00Z"
                }
            })))
            .mount(&server)
            .await;

        let client = test_client(&server, VenueRole::Spot);
        let book = client.get_order_book("BTC-USD", 2).await.unwrap();
        assert_eq!(book.bids.len(), 2);
        assert_eq!(book.best_ask().map(|l| l.price), Some(dec!(101)));
    }

    #[tokio::test]
    async fn test_rate_limit_maps_to_rate_limit_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/brokerage/products/BTC-USD/ticker"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let client = test_client(&server, VenueRole::Spot);
        let err = client.get_ticker("BTC-USD").await.unwrap_err();
        assert!(matches!(err, VenueError::RateLimit { retry_after_secs: 7 }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_authentication() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad signature"))
            .mount(&server)
            .await;

        let client = test_client(&server, VenueRole::Spot);
        let err = client.get_ticker("BTC-USD").await.unwrap_err();
        assert!(matches!(err, VenueError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_server_error_maps_to_api() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&server)
            .await;

        let client = test_client(&server, VenueRole::Spot);
        let err = client.get_ticker("BTC-USD").await.unwrap_err();
        assert!(matches!(err, VenueError::Api { status_code: 503, .. }));
    }

    #[tokio::test]
    async fn test_invalid_symbol_never_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = test_client(&server, VenueRole::Spot);
        let err = client.get_ticker("../accounts").await.unwrap_err();
        assert!(matches!(err, VenueError::Configuration(_)));
    }

    // ==================== Portfolio Endpoint Tests ====================

    #[tokio::test]
    async fn test_spot_positions_from_accounts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/brokerage/accounts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accounts": [
                    {"currency": "BTC", "available_balance": {"value": "0.25"}, "hold": {"value": "0"}},
                    {"currency": "USD", "available_balance": {"value": "5000"}}
                ],
                "has_next": false
            })))
            .mount(&server)
            .await;

        let client = test_client(&server, VenueRole::Spot);
        let positions = client.get_positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].symbol, "BTC-USD");
        assert_eq!(positions[0].size, dec!(0.25));
    }

    #[tokio::test]
    async fn test_derivatives_positions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/brokerage/cfm/positions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "positions": [
                    {"product_id": "BTC-PERP", "side": "SHORT", "number_of_contracts": "0.25"}
                ]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server, VenueRole::Derivatives);
        let positions = client.get_positions().await.unwrap();
        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].side, PositionSide::Short);
    }

    // ==================== Order Endpoint Tests ====================

    #[tokio::test]
    async fn test_place_order_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/brokerage/orders"))
            .and(header("Content-Type", "application/json"))
            .and(body_partial_json(json!({
                "product_id": "BTC-USD",
                "side": "BUY",
                "client_order_id": "cid-1",
                "order_configuration": {"limit_limit_gtc": {"base_size": "0.01", "limit_price": "100.1"}}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "success_response": {"order_id": "o-123", "product_id": "BTC-USD", "side": "BUY"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, VenueRole::Spot);
        let request = OrderRequest::limit_buy("BTC-USD", dec!(100.1), dec!(0.01)).with_client_order_id("cid-1");
        let order = client.place_order(&request).await.unwrap();
        assert_eq!(order.order_id, "o-123");
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(order.client_order_id.as_deref(), Some("cid-1"));
    }

    #[tokio::test]
    async fn test_place_order_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/brokerage/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "failure_reason": "UNKNOWN_FAILURE_REASON",
                "error_response": {"error": "INSUFFICIENT_FUND", "message": "Insufficient balance in source account"}
            })))
            .mount(&server)
            .await;

        let client = test_client(&server, VenueRole::Spot);
        let request = OrderRequest::limit_buy("BTC-USD", dec!(100), dec!(1));
        let err = client.place_order(&request).await.unwrap_err();
        match err {
            VenueError::OrderRejected(reason) => assert!(reason.contains("Insufficient balance")),
            other => panic!("expected OrderRejected, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_cancel_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/brokerage/orders/batch_cancel"))
            .and(body_partial_json(json!({"order_ids": ["o-1"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"success": true, "failure_reason": "UNKNOWN_CANCEL_FAILURE_REASON", "order_id": "o-1"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server, VenueRole::Spot);
        client.cancel_order("o-1").await.unwrap();
    }

    #[tokio::test]
    async fn test_cancel_order_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v3/brokerage/orders/batch_cancel"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [{"success": false, "failure_reason": "ORDER_ALREADY_FILLED", "order_id": "o-1"}]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server, VenueRole::Spot);
        let err = client.cancel_order("o-1").await.unwrap_err();
        assert!(matches!(err, VenueError::OrderRejected(ref r) if r == "ORDER_ALREADY_FILLED"));
    }

    #[tokio::test]
    async fn test_get_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/brokerage/orders/historical/o-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "order": {
                    "order_id": "o-9",
                    "product_id": "BTC-PERP",
                    "side": "SELL",
                    "status": "FILLED",
                    "order_type": "LIMIT",
                    "filled_size": "1",
                    "average_filled_price": "105.9",
                    "order_configuration": {"limit_limit_gtc": {"base_size": "1", "limit_price": "105.894"}}
                }
            })))
            .mount(&server)
            .await;

        let client = test_client(&server, VenueRole::Derivatives);
        let order = client.get_order("o-9").await.unwrap();
        assert!(order.is_filled());
        assert_eq!(order.side, OrderSide::Sell);
    }

    #[tokio::test]
    async fn test_get_order_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/brokerage/orders/historical/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let client = test_client(&server, VenueRole::Spot);
        let err = client.get_order("missing").await.unwrap_err();
        assert!(matches!(err, VenueError::OrderNotFound { ref order_id } if order_id == "missing"));
    }
}
