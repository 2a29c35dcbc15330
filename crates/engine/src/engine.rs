//! Wires the components together and drives the periodic workers.
//!
//! Three workers run for the lifetime of a started engine, each on its own
//! interval:
//!
//! - market data: refreshes tickers for every symbol an active strategy uses
//! - evaluation: computes basis per active strategy and launches sagas
//! - reconciliation: refreshes positions from both venues
//!
//! Each cycle can also be driven directly, which is how the tests exercise
//! the engine without timers.

use crate::error::{EngineError, Result};
use crate::evaluator::{decide, evaluate, Signal};
use crate::executor::{ExecutionOutcome, OrderExecutor, SkipReason, TradeAlert};
use crate::market_data::{MarketDataCache, RefreshSummary, SymbolClassifier};
use crate::reconciler::{PositionReconciler, ReconcileSummary};
use crate::registry::StrategyRegistry;
use crate::trade::{Trade, TradeSide};
use basis_trade_core::{BasisSnapshot, EngineConfig, Position, Strategy, Ticker, VenueClient};
use futures_util::future::join_all;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, info_span, Instrument};

// =============================================================================
// Cycle Report
// =============================================================================

/// What one evaluation cycle did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Strategies with a fresh snapshot.
    pub evaluated: usize,
    /// Strategies skipped for missing or stale tickers.
    pub skipped: usize,
    /// Signals dropped because a saga was already running.
    pub in_flight: usize,
    /// Sagas that ran this cycle, in any terminal state.
    pub trades: Vec<Trade>,
}

impl CycleReport {
    #[must_use]
    pub fn entered(&self) -> usize {
        self.trades.iter().filter(|t| t.side == TradeSide::Enter).count()
    }

    #[must_use]
    pub fn exited(&self) -> usize {
        self.trades.iter().filter(|t| t.side == TradeSide::Exit).count()
    }
}

// =============================================================================
// Components
// =============================================================================

struct Components {
    config: EngineConfig,
    spot: Arc<dyn VenueClient>,
    derivatives: Arc<dyn VenueClient>,
    market_data: MarketDataCache,
    registry: StrategyRegistry,
    executor: OrderExecutor,
    reconciler: PositionReconciler,
    span: tracing::Span,
}

impl Components {
    fn snapshot_for(&self, strategy: &Strategy) -> Option<BasisSnapshot> {
        let max_age = self.config.max_ticker_age;
        let spot = self.market_data.get_fresh(&strategy.spot_symbol, max_age);
        let future = self.market_data.get_fresh(&strategy.future_symbol, max_age);
        evaluate(strategy, spot.as_ref(), future.as_ref())
    }

    async fn run_market_data_cycle(&self) -> RefreshSummary {
        let symbols = self.registry.active_symbols();
        if symbols.is_empty() {
            return RefreshSummary::default();
        }
        self.market_data
            .refresh(&symbols, self.spot.as_ref(), self.derivatives.as_ref())
            .await
    }

    async fn run_evaluation_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();
        let mut sagas = Vec::new();

        for strategy in self.registry.list_active() {
            let Some(snapshot) = self.snapshot_for(&strategy) else {
                debug!(parent: &self.span, strategy_id = %strategy.id, "no fresh prices, skipping");
                report.skipped += 1;
                continue;
            };
            report.evaluated += 1;

            let position = self.reconciler.size(&strategy.spot_symbol);
            let side = match decide(&strategy, &snapshot, position) {
                Signal::Enter => TradeSide::Enter,
                Signal::Exit => TradeSide::Exit,
                Signal::Hold => continue,
            };

            info!(
                parent: &self.span,
                strategy_id = %strategy.id,
                basis_percent = %snapshot.basis_percent,
                target_basis = %strategy.target_basis,
                position = %position,
                %side,
                "basis signal"
            );
            sagas.push(async move { self.executor.execute(&strategy, &snapshot, side, position).await });
        }

        for outcome in join_all(sagas).await {
            match outcome {
                ExecutionOutcome::Finished(trade) => report.trades.push(trade),
                ExecutionOutcome::Skipped(SkipReason::InFlight) => report.in_flight += 1,
                ExecutionOutcome::Skipped(SkipReason::NothingToTrade) => {}
            }
        }
        report
    }

    async fn run_reconciliation_cycle(&self) -> ReconcileSummary {
        self.reconciler
            .reconcile(self.spot.as_ref(), self.derivatives.as_ref())
            .await
    }
}

// =============================================================================
// Engine
// =============================================================================

struct Workers {
    shutdown: watch::Sender<bool>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

/// The basis trading engine.
///
/// # Example
///
/// ```ignore
/// let engine = BasisEngine::new(config.engine, spot, derivatives);
/// engine.add_strategy(strategy)?;
/// engine.start()?;
/// // ...
/// engine.stop().await?;
/// ```
pub struct BasisEngine {
    inner: Arc<Components>,
    workers: Mutex<Option<Workers>>,
}

impl std::fmt::Debug for BasisEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BasisEngine")
            .field("spot", &self.inner.spot.name())
            .field("derivatives", &self.inner.derivatives.name())
            .field("strategies", &self.inner.registry.len())
            .field("running", &self.is_running())
            .finish()
    }
}

impl BasisEngine {
    #[must_use]
    pub fn new(config: EngineConfig, spot: Arc<dyn VenueClient>, derivatives: Arc<dyn VenueClient>) -> Self {
        Self::with_span(config, spot, derivatives, info_span!("basis_engine"))
    }

    /// Builds the engine with every component logging under `span`.
    #[must_use]
    pub fn with_span(
        config: EngineConfig,
        spot: Arc<dyn VenueClient>,
        derivatives: Arc<dyn VenueClient>,
        span: tracing::Span,
    ) -> Self {
        let market_data = MarketDataCache::new(
            SymbolClassifier::new(config.future_symbol_suffix.clone()),
            config.max_concurrent_fetches,
            info_span!(parent: &span, "market_data"),
        );
        let registry = StrategyRegistry::new(info_span!(parent: &span, "registry"));
        let executor = OrderExecutor::new(
            Arc::clone(&spot),
            Arc::clone(&derivatives),
            config.trade_history_limit,
            info_span!(parent: &span, "executor"),
        );
        let reconciler = PositionReconciler::new(info_span!(parent: &span, "reconciler"));

        Self {
            inner: Arc::new(Components {
                config,
                spot,
                derivatives,
                market_data,
                registry,
                executor,
                reconciler,
                span,
            }),
            workers: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    // ==================== Lifecycle ====================

    /// Spawns the three workers.
    ///
    /// # Errors
    ///
    /// [`EngineError::AlreadyRunning`] if the engine was already started.
    pub fn start(&self) -> Result<()> {
        let mut workers = self.workers.lock();
        if workers.is_some() {
            return Err(EngineError::AlreadyRunning);
        }

        let config = &self.inner.config;
        let (shutdown, rx) = watch::channel(false);

        let market_data = Arc::clone(&self.inner);
        let evaluation = Arc::clone(&self.inner);
        let reconciliation = Arc::clone(&self.inner);
        let handles = vec![
            (
                "market_data",
                self.spawn_worker("market_data", config.market_data_interval, rx.clone(), move || {
                    let inner = Arc::clone(&market_data);
                    async move {
                        inner.run_market_data_cycle().await;
                    }
                }),
            ),
            (
                "evaluation",
                self.spawn_worker("evaluation", config.evaluation_interval, rx.clone(), move || {
                    let inner = Arc::clone(&evaluation);
                    async move {
                        inner.run_evaluation_cycle().await;
                    }
                }),
            ),
            (
                "reconciliation",
                self.spawn_worker("reconciliation", config.reconciliation_interval, rx, move || {
                    let inner = Arc::clone(&reconciliation);
                    async move {
                        inner.run_reconciliation_cycle().await;
                    }
                }),
            ),
        ];

        *workers = Some(Workers { shutdown, handles });
        info!(
            parent: &self.inner.span,
            strategies = self.inner.registry.len(),
            spot = self.inner.spot.name(),
            derivatives = self.inner.derivatives.name(),
            "basis engine started"
        );
        Ok(())
    }

    fn spawn_worker<F, Fut>(
        &self,
        name: &'static str,
        period: Duration,
        mut shutdown: watch::Receiver<bool>,
        mut tick: F,
    ) -> JoinHandle<()>
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let span = info_span!(parent: &self.inner.span, "worker", worker = name);
        tokio::spawn(
            async move {
                let mut interval = tokio::time::interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                debug!(?period, "worker started");

                loop {
                    tokio::select! {
                        changed = shutdown.changed() => {
                            if changed.is_err() || *shutdown.borrow() {
                                break;
                            }
                        }
                        _ = interval.tick() => tick().await,
                    }
                }
                debug!("worker stopped");
            }
            .instrument(span),
        )
    }

    /// Signals the workers to stop and waits for them to exit.
    ///
    /// # Errors
    ///
    /// [`EngineError::NotRunning`] if the engine was not started.
    pub async fn stop(&self) -> Result<()> {
        let workers = self.workers.lock().take().ok_or(EngineError::NotRunning)?;
        info!(parent: &self.inner.span, "stopping basis engine");

        if workers.shutdown.send(true).is_err() {
            debug!(parent: &self.inner.span, "workers already gone");
        }
        for (name, handle) in workers.handles {
            if let Err(e) = handle.await {
                error!(parent: &self.inner.span, worker = name, error = %e, "worker terminated abnormally");
            }
        }

        info!(parent: &self.inner.span, "basis engine stopped");
        Ok(())
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.workers.lock().is_some()
    }

    // ==================== Cycles ====================

    /// Refreshes tickers for all symbols referenced by active strategies.
    pub async fn run_market_data_cycle(&self) -> RefreshSummary {
        self.inner.run_market_data_cycle().await
    }

    /// Evaluates every active strategy and runs the resulting sagas.
    pub async fn run_evaluation_cycle(&self) -> CycleReport {
        self.inner.run_evaluation_cycle().await
    }

    /// Refreshes positions from both venues.
    pub async fn run_reconciliation_cycle(&self) -> ReconcileSummary {
        self.inner.run_reconciliation_cycle().await
    }

    // ==================== Strategies ====================

    pub fn add_strategy(&self, strategy: Strategy) -> Result<()> {
        self.inner.registry.add(strategy)
    }

    pub fn remove_strategy(&self, id: &str) -> Result<Strategy> {
        self.inner.registry.remove(id)
    }

    pub fn set_strategy_active(&self, id: &str, active: bool) -> Result<()> {
        self.inner.registry.set_active(id, active)
    }

    #[must_use]
    pub fn strategy(&self, id: &str) -> Option<Strategy> {
        self.inner.registry.get(id)
    }

    #[must_use]
    pub fn strategies(&self) -> Vec<Strategy> {
        self.inner.registry.list()
    }

    // ==================== Inspection ====================

    /// Current basis for every active strategy with fresh prices.
    #[must_use]
    pub fn basis_snapshots(&self) -> Vec<BasisSnapshot> {
        self.inner
            .registry
            .list_active()
            .iter()
            .filter_map(|s| self.inner.snapshot_for(s))
            .collect()
    }

    /// Last cached ticker for `symbol`, whatever its age.
    #[must_use]
    pub fn ticker(&self, symbol: &str) -> Option<Ticker> {
        self.inner.market_data.get(symbol)
    }

    #[must_use]
    pub fn positions(&self) -> Vec<Position> {
        self.inner.reconciler.all()
    }

    #[must_use]
    pub fn recent_trades(&self) -> Vec<Trade> {
        self.inner.executor.recent_trades()
    }

    #[must_use]
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<TradeAlert> {
        self.inner.executor.subscribe_alerts()
    }
}

impl Drop for BasisEngine {
    fn drop(&mut self) {
        if let Some(workers) = self.workers.get_mut().take() {
            for (_, handle) in workers.handles {
                handle.abort();
            }
        }
    }
}
