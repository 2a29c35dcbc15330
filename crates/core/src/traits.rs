use crate::error::VenueResult;
use crate::market::{OrderBook, Ticker};
use crate::order::{Order, OrderRequest};
use crate::position::Position;
use async_trait::async_trait;

/// Authenticated capability set offered by one trading venue.
///
/// The engine holds one instance for the spot venue and one for the
/// derivatives venue. Implementations own their transport and credentials.
#[async_trait]
pub trait VenueClient: Send + Sync {
    /// Short venue label used in log fields.
    fn name(&self) -> &str;

    async fn get_ticker(&self, symbol: &str) -> VenueResult<Ticker>;

    /// Fetches an aggregated book. `level` is the number of price levels.
    async fn get_order_book(&self, symbol: &str, level: u32) -> VenueResult<OrderBook>;

    async fn get_positions(&self) -> VenueResult<Vec<Position>>;

    async fn place_order(&self, request: &OrderRequest) -> VenueResult<Order>;

    async fn cancel_order(&self, order_id: &str) -> VenueResult<()>;

    async fn get_order(&self, order_id: &str) -> VenueResult<Order>;

    /// Subscribes to streaming channels for the given symbols.
    async fn subscribe(&self, channels: &[String], symbols: &[String]) -> VenueResult<()>;
}
