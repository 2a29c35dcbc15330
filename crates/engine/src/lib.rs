//! Spot/perpetual basis trading engine.
//!
//! The engine watches the spread between a spot instrument and its perpetual
//! future on two independent venues, and opens or closes paired positions when
//! the spread crosses a strategy's thresholds:
//!
//! ```text
//! spot   BTC-USD  @ 100.00
//! future BTC-PERP @ 106.00
//! basis = (106 - 100) / 100 * 100 = 6.0%
//!
//! target 5.0%  -> enter: buy spot @ 100.10, sell future @ 105.894
//! basis <= 2.5% -> exit: buy future,        sell spot
//! ```
//!
//! # Modules
//!
//! - [`market_data`]: Latest-ticker cache with bounded concurrent refresh
//! - [`registry`]: Strategy definitions and validation
//! - [`evaluator`]: Basis computation and the enter/exit decision
//! - [`trade`]: Trade record and its state machine
//! - [`executor`]: Two-leg saga with compensation
//! - [`reconciler`]: Position cache from venue truth
//! - [`engine`]: [`BasisEngine`] and its periodic workers
//!
//! # Safety
//!
//! The two venues share no transaction. A failed hedge leg is compensated by
//! cancelling the first leg; if that cancel fails the trade is `Orphaned`,
//! logged at error level and published through
//! [`BasisEngine::subscribe_alerts`]. Orphaned trades need an operator.

pub mod engine;
pub mod error;
pub mod evaluator;
pub mod executor;
pub mod market_data;
pub mod reconciler;
pub mod registry;
pub mod trade;

pub use engine::{BasisEngine, CycleReport};
pub use error::{EngineError, Result};
pub use evaluator::{decide, evaluate, Signal, EXIT_THRESHOLD_RATIO};
pub use executor::{
    ExecutionOutcome, ExecutionToken, OrderExecutor, SkipReason, TradeAlert, SLIPPAGE_BUFFER,
};
pub use market_data::{MarketDataCache, RefreshSummary, SymbolClassifier};
pub use reconciler::{PositionReconciler, ReconcileSummary};
pub use registry::{validate_strategy, StrategyRegistry};
pub use trade::{Trade, TradeSide, TradeStatus, TransitionError};
