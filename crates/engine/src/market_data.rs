//! Latest-ticker cache fed by a bounded concurrent refresh.
//!
//! Each refresh fans out one fetch per symbol, at most
//! `max_concurrent_fetches` at a time, and returns once every fetch has
//! finished. Successful fetches are written as they arrive; failures leave the
//! previous entry in place.

use basis_trade_core::{MarketKind, Ticker, VenueClient};
use futures_util::stream::{self, StreamExt};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn, Instrument};

// =============================================================================
// Symbol Classification
// =============================================================================

/// Routes symbols to the spot or derivatives venue by suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolClassifier {
    future_suffix: String,
}

impl SymbolClassifier {
    #[must_use]
    pub fn new(future_suffix: impl Into<String>) -> Self {
        Self {
            future_suffix: future_suffix.into(),
        }
    }

    #[must_use]
    pub fn classify(&self, symbol: &str) -> MarketKind {
        if symbol.ends_with(&self.future_suffix) {
            MarketKind::Future
        } else {
            MarketKind::Spot
        }
    }
}

impl Default for SymbolClassifier {
    fn default() -> Self {
        Self::new("-PERP")
    }
}

// =============================================================================
// Cache
// =============================================================================

#[derive(Debug, Clone)]
struct CachedTicker {
    ticker: Ticker,
    fetched_at: Instant,
}

/// Outcome of one refresh pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    /// Number of symbols written.
    pub updated: usize,
    /// Symbols whose fetch failed.
    pub failed: Vec<String>,
}

/// Holds the most recent ticker per symbol.
pub struct MarketDataCache {
    entries: RwLock<HashMap<String, CachedTicker>>,
    classifier: SymbolClassifier,
    max_concurrent_fetches: usize,
    span: tracing::Span,
}

impl std::fmt::Debug for MarketDataCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketDataCache")
            .field("symbols", &self.entries.read().len())
            .field("classifier", &self.classifier)
            .field("max_concurrent_fetches", &self.max_concurrent_fetches)
            .finish()
    }
}

impl MarketDataCache {
    #[must_use]
    pub fn new(classifier: SymbolClassifier, max_concurrent_fetches: usize, span: tracing::Span) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            classifier,
            max_concurrent_fetches: max_concurrent_fetches.max(1),
            span,
        }
    }

    #[must_use]
    pub fn classifier(&self) -> &SymbolClassifier {
        &self.classifier
    }

    /// Fetches every symbol from its venue and stores the successes.
    pub async fn refresh(
        &self,
        symbols: &[String],
        spot: &dyn VenueClient,
        derivatives: &dyn VenueClient,
    ) -> RefreshSummary {
        async {
            // Owned symbols keep the fetch futures `Send` for the spawned worker.
            let mut fetches = stream::iter(symbols.iter().cloned())
                .map(|symbol: String| {
                    let venue = match self.classifier.classify(&symbol) {
                        MarketKind::Spot => spot,
                        MarketKind::Future => derivatives,
                    };
                    async move {
                        let result = venue.get_ticker(&symbol).await;
                        (symbol, venue.name(), result)
                    }
                })
                .buffer_unordered(self.max_concurrent_fetches);

            let mut summary = RefreshSummary::default();
            while let Some((symbol, venue, result)) = fetches.next().await {
                match result {
                    Ok(ticker) => {
                        self.insert_as(symbol, ticker);
                        summary.updated += 1;
                    }
                    Err(e) => {
                        warn!(symbol = %symbol, venue = venue, error = %e, "ticker fetch failed");
                        summary.failed.push(symbol);
                    }
                }
            }

            debug!(updated = summary.updated, failed = summary.failed.len(), "market data refreshed");
            summary
        }
        .instrument(self.span.clone())
        .await
    }

    /// Stores a ticker under its own symbol, stamped now.
    pub fn insert(&self, ticker: Ticker) {
        self.insert_as(ticker.symbol.clone(), ticker);
    }

    fn insert_as(&self, symbol: String, ticker: Ticker) {
        let entry = CachedTicker {
            ticker,
            fetched_at: Instant::now(),
        };
        self.entries.write().insert(symbol, entry);
    }

    /// Returns the cached ticker regardless of age.
    #[must_use]
    pub fn get(&self, symbol: &str) -> Option<Ticker> {
        self.entries.read().get(symbol).map(|e| e.ticker.clone())
    }

    /// Returns the cached ticker only if it was fetched within `max_age`.
    #[must_use]
    pub fn get_fresh(&self, symbol: &str, max_age: Duration) -> Option<Ticker> {
        self.entries
            .read()
            .get(symbol)
            .filter(|e| e.fetched_at.elapsed() <= max_age)
            .map(|e| e.ticker.clone())
    }

    /// Time since the symbol was last fetched.
    #[must_use]
    pub fn age(&self, symbol: &str) -> Option<Duration> {
        self.entries.read().get(symbol).map(|e| e.fetched_at.elapsed())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn cache() -> MarketDataCache {
        MarketDataCache::new(SymbolClassifier::default(), 4, tracing::Span::none())
    }

    #[test]
    fn test_classifier_routes_by_suffix() {
        let classifier = SymbolClassifier::default();
        assert_eq!(classifier.classify("BTC-PERP"), MarketKind::Future);
        assert_eq!(classifier.classify("BTC-USD"), MarketKind::Spot);
        assert_eq!(classifier.classify("PERP-USD"), MarketKind::Spot);

        let custom = SymbolClassifier::new("-INTX");
        assert_eq!(custom.classify("BTC-PERP-INTX"), MarketKind::Future);
        assert_eq!(custom.classify("BTC-PERP"), MarketKind::Spot);
    }

    #[test]
    fn test_insert_and_get() {
        let cache = cache();
        assert!(cache.get("BTC-USD").is_none());

        cache.insert(Ticker::from_last("BTC-USD", dec!(100)));
        assert_eq!(cache.get("BTC-USD").map(|t| t.last_price), Some(dec!(100)));
        assert_eq!(cache.len(), 1);

        cache.insert(Ticker::from_last("BTC-USD", dec!(101)));
        assert_eq!(cache.get("BTC-USD").map(|t| t.last_price), Some(dec!(101)));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_entry_hidden_from_get_fresh_only() {
        let cache = cache();
        cache.insert(Ticker::from_last("BTC-USD", dec!(100)));
        assert!(cache.get_fresh("BTC-USD", Duration::from_secs(15)).is_some());

        tokio::time::advance(Duration::from_secs(16)).await;

        assert!(cache.get_fresh("BTC-USD", Duration::from_secs(15)).is_none());
        assert!(cache.get("BTC-USD").is_some());
        assert_eq!(cache.len(), 1);

        cache.insert(Ticker::from_last("BTC-USD", dec!(102)));
        assert_eq!(
            cache.get_fresh("BTC-USD", Duration::from_secs(15)).map(|t| t.last_price),
            Some(dec!(102))
        );
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let cache = MarketDataCache::new(SymbolClassifier::default(), 0, tracing::Span::none());
        assert_eq!(cache.max_concurrent_fetches, 1);
    }
}
