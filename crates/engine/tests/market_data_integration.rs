mod common;

use basis_trade_engine::{MarketDataCache, SymbolClassifier};
use common::MockVenue;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

fn cache(max_concurrent: usize) -> MarketDataCache {
    MarketDataCache::new(SymbolClassifier::default(), max_concurrent, tracing::Span::none())
}

#[tokio::test]
async fn test_refresh_routes_by_suffix() {
    let spot = MockVenue::new("spot");
    let derivatives = MockVenue::new("derivatives");
    spot.set_price("BTC-USD", dec!(100));
    derivatives.set_price("BTC-PERP", dec!(106));

    let cache = cache(4);
    let symbols = vec!["BTC-USD".to_string(), "BTC-PERP".to_string()];
    let summary = cache.refresh(&symbols, spot.as_ref(), derivatives.as_ref()).await;

    assert_eq!(summary.updated, 2);
    assert!(summary.failed.is_empty());
    assert_eq!(spot.ticker_calls(), 1);
    assert_eq!(derivatives.ticker_calls(), 1);
    assert_eq!(cache.get("BTC-USD").map(|t| t.last_price), Some(dec!(100)));
    assert_eq!(cache.get("BTC-PERP").map(|t| t.last_price), Some(dec!(106)));
}

#[tokio::test]
async fn test_fan_out_is_bounded() {
    let spot = MockVenue::new("spot");
    let derivatives = MockVenue::new("derivatives");
    spot.set_ticker_delay(Duration::from_millis(20));

    let symbols: Vec<String> = (0..10).map(|i| format!("COIN{i}-USD")).collect();
    for (i, symbol) in symbols.iter().enumerate() {
        spot.set_price(symbol, Decimal::from(i as u32 + 1));
    }

    let cache = cache(3);
    let summary = cache.refresh(&symbols, spot.as_ref(), derivatives.as_ref()).await;

    assert_eq!(summary.updated, 10);
    assert_eq!(cache.len(), 10);
    assert!(spot.peak_concurrent_fetches() <= 3);
    assert!(spot.peak_concurrent_fetches() >= 1);
}

#[tokio::test]
async fn test_failed_fetch_keeps_previous_entry() {
    let spot = MockVenue::new("spot");
    let derivatives = MockVenue::new("derivatives");
    spot.set_price("BTC-USD", dec!(100));
    spot.set_price("ETH-USD", dec!(2000));

    let cache = cache(4);
    let symbols = vec!["BTC-USD".to_string(), "ETH-USD".to_string()];
    cache.refresh(&symbols, spot.as_ref(), derivatives.as_ref()).await;

    spot.fail_ticker("BTC-USD");
    spot.set_price("ETH-USD", dec!(2100));
    let summary = cache.refresh(&symbols, spot.as_ref(), derivatives.as_ref()).await;

    assert_eq!(summary.updated, 1);
    assert_eq!(summary.failed, vec!["BTC-USD".to_string()]);
    assert_eq!(cache.get("BTC-USD").map(|t| t.last_price), Some(dec!(100)));
    assert_eq!(cache.get("ETH-USD").map(|t| t.last_price), Some(dec!(2100)));
}

#[tokio::test]
async fn test_unknown_symbol_reported_as_failed() {
    let spot = MockVenue::new("spot");
    let derivatives = MockVenue::new("derivatives");

    let cache = cache(4);
    let summary = cache
        .refresh(&["DOGE-PERP".to_string()], spot.as_ref(), derivatives.as_ref())
        .await;

    assert_eq!(summary.updated, 0);
    assert_eq!(summary.failed, vec!["DOGE-PERP".to_string()]);
    assert_eq!(derivatives.ticker_calls(), 1);
    assert_eq!(spot.ticker_calls(), 0);
    assert!(cache.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_refresh_revives_stale_entry() {
    let spot = MockVenue::new("spot");
    let derivatives = MockVenue::new("derivatives");
    spot.set_price("BTC-USD", dec!(100));
    let max_age = Duration::from_secs(15);

    let cache = cache(4);
    let symbols = vec!["BTC-USD".to_string()];
    cache.refresh(&symbols, spot.as_ref(), derivatives.as_ref()).await;

    tokio::time::advance(Duration::from_secs(20)).await;
    assert!(cache.get_fresh("BTC-USD", max_age).is_none());
    assert!(cache.age("BTC-USD").unwrap() >= Duration::from_secs(20));

    cache.refresh(&symbols, spot.as_ref(), derivatives.as_ref()).await;
    assert!(cache.get_fresh("BTC-USD", max_age).is_some());
}

#[tokio::test]
async fn test_refresh_runs_on_spawned_task() {
    let spot = MockVenue::new("spot");
    let derivatives = MockVenue::new("derivatives");
    spot.set_price("BTC-USD", dec!(100));
    derivatives.set_price("BTC-PERP", dec!(106));

    let cache = Arc::new(cache(2));
    let symbols = vec!["BTC-USD".to_string(), "BTC-PERP".to_string()];
    let task = {
        let cache = cache.clone();
        tokio::spawn(async move { cache.refresh(&symbols, spot.as_ref(), derivatives.as_ref()).await })
    };

    let summary = task.await.unwrap();
    assert_eq!(summary.updated, 2);
    assert_eq!(cache.get("BTC-PERP").map(|t| t.last_price), Some(dec!(106)));
}
