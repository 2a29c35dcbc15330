//! Position cache refreshed from venue truth.
//!
//! Each pass fetches both venues concurrently. A venue's successful result
//! replaces everything that venue reported last time, so positions closed on
//! the venue disappear from the cache. A failed venue keeps its previous
//! entries.

use basis_trade_core::{Position, VenueClient, VenueResult};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, warn, Instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Spot,
    Derivatives,
}

#[derive(Debug, Clone)]
struct Entry {
    source: Source,
    position: Position,
}

/// Outcome of one reconciliation pass.
///
/// `None` means the venue's fetch failed and its cached entries were kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub spot_positions: Option<usize>,
    pub derivatives_positions: Option<usize>,
}

impl ReconcileSummary {
    /// Whether both venues answered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.spot_positions.is_some() && self.derivatives_positions.is_some()
    }
}

/// Latest known position per symbol.
pub struct PositionReconciler {
    positions: RwLock<HashMap<String, Entry>>,
    span: tracing::Span,
}

impl std::fmt::Debug for PositionReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionReconciler")
            .field("positions", &self.positions.read().len())
            .finish()
    }
}

impl PositionReconciler {
    #[must_use]
    pub fn new(span: tracing::Span) -> Self {
        Self {
            positions: RwLock::new(HashMap::new()),
            span,
        }
    }

    /// Fetches positions from both venues and applies whatever succeeded.
    pub async fn reconcile(&self, spot: &dyn VenueClient, derivatives: &dyn VenueClient) -> ReconcileSummary {
        async {
            let (spot_result, derivatives_result) = tokio::join!(spot.get_positions(), derivatives.get_positions());

            let summary = ReconcileSummary {
                spot_positions: self.apply(Source::Spot, spot.name(), spot_result),
                derivatives_positions: self.apply(Source::Derivatives, derivatives.name(), derivatives_result),
            };
            debug!(
                spot = ?summary.spot_positions,
                derivatives = ?summary.derivatives_positions,
                "positions reconciled"
            );
            summary
        }
        .instrument(self.span.clone())
        .await
    }

    fn apply(&self, source: Source, venue: &str, result: VenueResult<Vec<Position>>) -> Option<usize> {
        let fetched = match result {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(venue, error = %e, "position fetch failed, keeping previous positions");
                return None;
            }
        };

        let count = fetched.len();
        let mut positions = self.positions.write();
        positions.retain(|_, entry| entry.source != source);
        for position in fetched {
            positions.insert(position.symbol.clone(), Entry { source, position });
        }
        Some(count)
    }

    #[must_use]
    pub fn position(&self, symbol: &str) -> Option<Position> {
        self.positions.read().get(symbol).map(|e| e.position.clone())
    }

    /// Signed size for `symbol`; zero when unknown.
    #[must_use]
    pub fn size(&self, symbol: &str) -> Decimal {
        self.positions
            .read()
            .get(symbol)
            .map_or(Decimal::ZERO, |e| e.position.signed_size())
    }

    /// All cached positions sorted by symbol.
    #[must_use]
    pub fn all(&self) -> Vec<Position> {
        let mut all: Vec<Position> = self.positions.read().values().map(|e| e.position.clone()).collect();
        all.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        all
    }
}

impl Default for PositionReconciler {
    fn default() -> Self {
        Self::new(tracing::Span::none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use basis_trade_core::VenueError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_apply_and_lookup() {
        let reconciler = PositionReconciler::default();
        let applied = reconciler.apply(
            Source::Spot,
            "spot",
            Ok(vec![Position::long("BTC-USD", dec!(2)), Position::long("ETH-USD", dec!(5))]),
        );
        assert_eq!(applied, Some(2));
        assert_eq!(reconciler.size("BTC-USD"), dec!(2));
        assert_eq!(reconciler.size("SOL-USD"), dec!(0));
        assert!(reconciler.position("SOL-USD").is_none());

        let symbols: Vec<_> = reconciler.all().into_iter().map(|p| p.symbol).collect();
        assert_eq!(symbols, vec!["BTC-USD", "ETH-USD"]);
    }

    #[test]
    fn test_short_size_is_negative() {
        let reconciler = PositionReconciler::default();
        reconciler.apply(Source::Derivatives, "derivatives", Ok(vec![Position::short("BTC-PERP", dec!(3))]));
        assert_eq!(reconciler.size("BTC-PERP"), dec!(-3));
    }

    #[test]
    fn test_success_replaces_only_that_venue() {
        let reconciler = PositionReconciler::default();
        reconciler.apply(Source::Spot, "spot", Ok(vec![Position::long("BTC-USD", dec!(2))]));
        reconciler.apply(Source::Derivatives, "derivatives", Ok(vec![Position::short("BTC-PERP", dec!(2))]));

        reconciler.apply(Source::Spot, "spot", Ok(vec![Position::long("ETH-USD", dec!(1))]));

        assert!(reconciler.position("BTC-USD").is_none());
        assert_eq!(reconciler.size("ETH-USD"), dec!(1));
        assert_eq!(reconciler.size("BTC-PERP"), dec!(-2));
    }

    #[test]
    fn test_failure_keeps_previous_entries() {
        let reconciler = PositionReconciler::default();
        reconciler.apply(Source::Spot, "spot", Ok(vec![Position::long("BTC-USD", dec!(2))]));

        let applied = reconciler.apply(Source::Spot, "spot", Err(VenueError::network("down")));
        assert_eq!(applied, None);
        assert_eq!(reconciler.size("BTC-USD"), dec!(2));
    }

    #[test]
    fn test_summary_completeness() {
        assert!(ReconcileSummary {
            spot_positions: Some(0),
            derivatives_positions: Some(3)
        }
        .is_complete());
        assert!(!ReconcileSummary {
            spot_positions: None,
            derivatives_positions: Some(3)
        }
        .is_complete());
    }
}
