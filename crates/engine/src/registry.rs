//! Strategy registry keyed by id, preserving insertion order.

use crate::error::{EngineError, Result};
use basis_trade_core::Strategy;
use chrono::Utc;
use indexmap::{IndexMap, IndexSet};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::info;

/// Checks a strategy's parameters for internal consistency.
///
/// # Errors
///
/// Returns [`EngineError::InvalidStrategy`] describing the first violated rule.
pub fn validate_strategy(strategy: &Strategy) -> Result<()> {
    let id = &strategy.id;
    if id.trim().is_empty() {
        return Err(EngineError::invalid(id, "id must not be empty"));
    }
    if strategy.spot_symbol.trim().is_empty() {
        return Err(EngineError::invalid(id, "spot symbol must not be empty"));
    }
    if strategy.future_symbol.trim().is_empty() {
        return Err(EngineError::invalid(id, "future symbol must not be empty"));
    }
    if strategy.spot_symbol == strategy.future_symbol {
        return Err(EngineError::invalid(id, "spot and future symbols must differ"));
    }
    if strategy.target_basis <= Decimal::ZERO {
        return Err(EngineError::invalid(id, "target basis must be positive"));
    }
    if strategy.max_position <= Decimal::ZERO {
        return Err(EngineError::invalid(id, "max position must be positive"));
    }
    if strategy.min_trade_size <= Decimal::ZERO {
        return Err(EngineError::invalid(id, "min trade size must be positive"));
    }
    if strategy.min_trade_size > strategy.max_position {
        return Err(EngineError::invalid(id, "min trade size exceeds max position"));
    }
    if strategy.rebalance_threshold < Decimal::ZERO {
        return Err(EngineError::invalid(id, "rebalance threshold must not be negative"));
    }
    Ok(())
}

/// Thread-safe set of strategy definitions.
pub struct StrategyRegistry {
    strategies: RwLock<IndexMap<String, Strategy>>,
    span: tracing::Span,
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("strategies", &self.strategies.read().len())
            .finish()
    }
}

impl StrategyRegistry {
    #[must_use]
    pub fn new(span: tracing::Span) -> Self {
        Self {
            strategies: RwLock::new(IndexMap::new()),
            span,
        }
    }

    /// Registers a new strategy.
    pub fn add(&self, strategy: Strategy) -> Result<()> {
        validate_strategy(&strategy)?;

        let mut strategies = self.strategies.write();
        if strategies.contains_key(&strategy.id) {
            return Err(EngineError::DuplicateId(strategy.id));
        }

        info!(
            parent: &self.span,
            strategy_id = %strategy.id,
            spot = %strategy.spot_symbol,
            future = %strategy.future_symbol,
            target_basis = %strategy.target_basis,
            active = strategy.is_active,
            "strategy added"
        );
        strategies.insert(strategy.id.clone(), strategy);
        Ok(())
    }

    /// Removes a strategy and returns its last definition.
    pub fn remove(&self, id: &str) -> Result<Strategy> {
        let removed = self
            .strategies
            .write()
            .shift_remove(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        info!(parent: &self.span, strategy_id = %id, "strategy removed");
        Ok(removed)
    }

    /// Enables or disables a strategy without touching its parameters.
    pub fn set_active(&self, id: &str, active: bool) -> Result<()> {
        let mut strategies = self.strategies.write();
        let strategy = strategies
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        if strategy.is_active != active {
            strategy.is_active = active;
            strategy.updated_at = Utc::now();
            info!(parent: &self.span, strategy_id = %id, active, "strategy activation changed");
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Strategy> {
        self.strategies.read().get(id).cloned()
    }

    /// All strategies in registration order.
    #[must_use]
    pub fn list(&self) -> Vec<Strategy> {
        self.strategies.read().values().cloned().collect()
    }

    /// Active strategies in registration order.
    #[must_use]
    pub fn list_active(&self) -> Vec<Strategy> {
        self.strategies
            .read()
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect()
    }

    /// Distinct spot and future symbols referenced by active strategies.
    #[must_use]
    pub fn active_symbols(&self) -> Vec<String> {
        let strategies = self.strategies.read();
        let symbols: IndexSet<&str> = strategies
            .values()
            .filter(|s| s.is_active)
            .flat_map(Strategy::symbols)
            .collect();
        symbols.into_iter().map(str::to_string).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strategies.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strategies.read().is_empty()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new(tracing::Span::none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn strategy(id: &str, spot: &str, future: &str) -> Strategy {
        Strategy::new(id, spot, future, dec!(5), dec!(10), dec!(1))
    }

    // ==================== Validation Tests ====================

    #[test]
    fn test_valid_strategy_passes() {
        assert!(validate_strategy(&strategy("btc", "BTC-USD", "BTC-PERP")).is_ok());
    }

    #[test]
    fn test_validation_rules() {
        let base = strategy("btc", "BTC-USD", "BTC-PERP");

        let cases = vec![
            (Strategy { id: " ".into(), ..base.clone() }, "id"),
            (Strategy { spot_symbol: String::new(), ..base.clone() }, "spot symbol"),
            (Strategy { future_symbol: String::new(), ..base.clone() }, "future symbol"),
            (Strategy { future_symbol: "BTC-USD".into(), ..base.clone() }, "differ"),
            (Strategy { target_basis: dec!(0), ..base.clone() }, "target basis"),
            (Strategy { max_position: dec!(-1), ..base.clone() }, "max position"),
            (Strategy { min_trade_size: dec!(0), ..base.clone() }, "min trade size must be positive"),
            (Strategy { min_trade_size: dec!(11), ..base.clone() }, "exceeds"),
            (Strategy { rebalance_threshold: dec!(-0.1), ..base.clone() }, "rebalance"),
        ];

        for (candidate, expected) in cases {
            match validate_strategy(&candidate) {
                Err(EngineError::InvalidStrategy { reason, .. }) => {
                    assert!(reason.contains(expected), "{reason} should mention {expected}");
                }
                other => panic!("expected InvalidStrategy for {expected}, got {other:?}"),
            }
        }
    }

    // ==================== Registry Tests ====================

    #[test]
    fn test_add_get_and_duplicate() {
        let registry = StrategyRegistry::default();
        registry.add(strategy("btc", "BTC-USD", "BTC-PERP")).unwrap();

        assert_eq!(registry.get("btc").map(|s| s.spot_symbol), Some("BTC-USD".to_string()));
        assert_eq!(
            registry.add(strategy("btc", "ETH-USD", "ETH-PERP")),
            Err(EngineError::DuplicateId("btc".to_string()))
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_invalid_strategy_not_stored() {
        let registry = StrategyRegistry::default();
        let bad = Strategy::new("bad", "BTC-USD", "BTC-PERP", dec!(0), dec!(10), dec!(1));
        assert!(matches!(registry.add(bad), Err(EngineError::InvalidStrategy { .. })));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_remove() {
        let registry = StrategyRegistry::default();
        registry.add(strategy("btc", "BTC-USD", "BTC-PERP")).unwrap();

        let removed = registry.remove("btc").unwrap();
        assert_eq!(removed.id, "btc");
        assert!(registry.get("btc").is_none());
        assert_eq!(registry.remove("btc"), Err(EngineError::NotFound("btc".to_string())));
    }

    #[test]
    fn test_list_preserves_order_and_filters_inactive() {
        let registry = StrategyRegistry::default();
        registry.add(strategy("c", "SOL-USD", "SOL-PERP")).unwrap();
        registry.add(strategy("a", "BTC-USD", "BTC-PERP").with_active(false)).unwrap();
        registry.add(strategy("b", "ETH-USD", "ETH-PERP")).unwrap();

        let ids: Vec<_> = registry.list().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);

        let active: Vec<_> = registry.list_active().into_iter().map(|s| s.id).collect();
        assert_eq!(active, vec!["c", "b"]);
    }

    #[test]
    fn test_set_active() {
        let registry = StrategyRegistry::default();
        registry.add(strategy("btc", "BTC-USD", "BTC-PERP")).unwrap();

        registry.set_active("btc", false).unwrap();
        assert!(registry.list_active().is_empty());
        assert_eq!(registry.get("btc").map(|s| s.is_active), Some(false));

        registry.set_active("btc", true).unwrap();
        assert_eq!(registry.list_active().len(), 1);

        assert_eq!(
            registry.set_active("eth", true),
            Err(EngineError::NotFound("eth".to_string()))
        );
    }

    #[test]
    fn test_active_symbols_deduplicated() {
        let registry = StrategyRegistry::default();
        registry.add(strategy("one", "BTC-USD", "BTC-PERP")).unwrap();
        registry.add(strategy("two", "BTC-USD", "BTC-PERP-2")).unwrap();
        registry.add(strategy("off", "ETH-USD", "ETH-PERP").with_active(false)).unwrap();

        assert_eq!(registry.active_symbols(), vec!["BTC-USD", "BTC-PERP", "BTC-PERP-2"]);
    }
}
