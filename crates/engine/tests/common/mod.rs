//! Scripted in-memory venue shared by the engine integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use basis_trade_core::{
    EngineConfig, Order, OrderBook, OrderRequest, Position, Strategy, Ticker, VenueClient, VenueError, VenueResult,
};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct Script {
    prices: HashMap<String, Decimal>,
    failing_tickers: HashSet<String>,
    positions: Option<Vec<Position>>,
    fail_positions: bool,
    reject_orders: bool,
    fail_cancels: bool,
    ticker_delay: Duration,
    order_delay: Duration,
}

pub struct MockVenue {
    name: String,
    script: Mutex<Script>,
    placed: Mutex<Vec<OrderRequest>>,
    cancelled: Mutex<Vec<String>>,
    ticker_calls: AtomicUsize,
    position_calls: AtomicUsize,
    active_fetches: AtomicUsize,
    peak_fetches: AtomicUsize,
    next_order: AtomicUsize,
}

impl MockVenue {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script: Mutex::new(Script::default()),
            placed: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            ticker_calls: AtomicUsize::new(0),
            position_calls: AtomicUsize::new(0),
            active_fetches: AtomicUsize::new(0),
            peak_fetches: AtomicUsize::new(0),
            next_order: AtomicUsize::new(1),
        })
    }

    // ==================== Scripting ====================

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        let mut script = self.script.lock();
        script.prices.insert(symbol.to_string(), price);
        script.failing_tickers.remove(symbol);
    }

    pub fn fail_ticker(&self, symbol: &str) {
        self.script.lock().failing_tickers.insert(symbol.to_string());
    }

    pub fn set_positions(&self, positions: Vec<Position>) {
        let mut script = self.script.lock();
        script.positions = Some(positions);
        script.fail_positions = false;
    }

    pub fn fail_positions(&self) {
        self.script.lock().fail_positions = true;
    }

    pub fn reject_orders(&self, reject: bool) {
        self.script.lock().reject_orders = reject;
    }

    pub fn fail_cancels(&self, fail: bool) {
        self.script.lock().fail_cancels = fail;
    }

    pub fn set_ticker_delay(&self, delay: Duration) {
        self.script.lock().ticker_delay = delay;
    }

    pub fn set_order_delay(&self, delay: Duration) {
        self.script.lock().order_delay = delay;
    }

    // ==================== Inspection ====================

    pub fn placed(&self) -> Vec<OrderRequest> {
        self.placed.lock().clone()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().clone()
    }

    pub fn ticker_calls(&self) -> usize {
        self.ticker_calls.load(Ordering::SeqCst)
    }

    pub fn position_calls(&self) -> usize {
        self.position_calls.load(Ordering::SeqCst)
    }

    pub fn peak_concurrent_fetches(&self) -> usize {
        self.peak_fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VenueClient for MockVenue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get_ticker(&self, symbol: &str) -> VenueResult<Ticker> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);
        let active = self.active_fetches.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_fetches.fetch_max(active, Ordering::SeqCst);

        let delay = self.script.lock().ticker_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let result = {
            let script = self.script.lock();
            if script.failing_tickers.contains(symbol) {
                Err(VenueError::network(format!("{symbol} unavailable")))
            } else {
                script
                    .prices
                    .get(symbol)
                    .map(|price| Ticker::from_last(symbol, *price))
                    .ok_or_else(|| VenueError::api(404, format!("unknown product {symbol}")))
            }
        };

        self.active_fetches.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn get_order_book(&self, symbol: &str, _level: u32) -> VenueResult<OrderBook> {
        Err(VenueError::api(404, format!("no book for {symbol}")))
    }

    async fn get_positions(&self) -> VenueResult<Vec<Position>> {
        self.position_calls.fetch_add(1, Ordering::SeqCst);
        let script = self.script.lock();
        if script.fail_positions {
            return Err(VenueError::timeout("positions request timed out"));
        }
        Ok(script.positions.clone().unwrap_or_default())
    }

    async fn place_order(&self, request: &OrderRequest) -> VenueResult<Order> {
        let delay = self.script.lock().order_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.placed.lock().push(request.clone());
        if self.script.lock().reject_orders {
            return Err(VenueError::rejected("INSUFFICIENT_FUND"));
        }
        let id = self.next_order.fetch_add(1, Ordering::SeqCst);
        Ok(Order::accepted(format!("{}-{id}", self.name), request))
    }

    async fn cancel_order(&self, order_id: &str) -> VenueResult<()> {
        self.cancelled.lock().push(order_id.to_string());
        if self.script.lock().fail_cancels {
            return Err(VenueError::network("connection reset"));
        }
        Ok(())
    }

    async fn get_order(&self, order_id: &str) -> VenueResult<Order> {
        Err(VenueError::order_not_found(order_id))
    }

    async fn subscribe(&self, _channels: &[String], _symbols: &[String]) -> VenueResult<()> {
        Ok(())
    }
}

// ==================== Fixtures ====================

/// Target 5%, max position 10, tranche 1.
pub fn btc_strategy() -> Strategy {
    Strategy::new("btc-basis", "BTC-USD", "BTC-PERP", dec!(5), dec!(10), dec!(1))
}

pub fn test_config() -> EngineConfig {
    EngineConfig {
        market_data_interval: Duration::from_millis(10),
        evaluation_interval: Duration::from_millis(10),
        reconciliation_interval: Duration::from_millis(10),
        max_concurrent_fetches: 4,
        max_ticker_age: Duration::from_secs(15),
        future_symbol_suffix: "-PERP".to_string(),
        trade_history_limit: 16,
    }
}
