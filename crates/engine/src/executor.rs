//! Two-leg saga execution across the spot and derivatives venues.
//!
//! The venues share no transaction, so a paired trade is committed as a saga:
//!
//! 1. Acquire the strategy's execution token, or skip
//! 2. Record a [`Trade`] in `Initiated`
//! 3. Place leg A; on failure the trade ends `Failed`
//! 4. Place leg B; on success the trade ends `Completed`
//! 5. On leg B failure cancel leg A exactly once; the trade ends `Compensated`
//!    if the cancel succeeds and `Orphaned` otherwise
//!
//! Enter trades buy spot first and sell the future as the hedge. Exit trades
//! mirror this: buy back the future first, then sell spot.
//!
//! # Safety
//!
//! - At most one saga per strategy id is in flight
//! - No leg is retried
//! - Orphaned trades are logged at error level and broadcast as
//!   [`TradeAlert::Orphaned`]

use crate::trade::{Trade, TradeSide, TradeStatus};
use basis_trade_core::{BasisSnapshot, OrderRequest, OrderSide, Strategy, VenueClient};
use chrono::Utc;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Adverse-price buffer applied to both limit prices.
pub const SLIPPAGE_BUFFER: Decimal = dec!(0.001);

const ALERT_CHANNEL_CAPACITY: usize = 64;

// =============================================================================
// Execution Token
// =============================================================================

/// Proof that the holder is the only saga running for a strategy.
///
/// Released on drop.
#[derive(Debug)]
pub struct ExecutionToken {
    strategy_id: String,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl ExecutionToken {
    #[must_use]
    pub fn strategy_id(&self) -> &str {
        &self.strategy_id
    }
}

impl Drop for ExecutionToken {
    fn drop(&mut self) {
        self.in_flight.lock().remove(&self.strategy_id);
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// Why an execution request did not start a saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Another saga holds the strategy's token.
    InFlight,
    /// The computed size was zero.
    NothingToTrade,
}

/// Result of [`OrderExecutor::execute`].
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Skipped(SkipReason),
    /// The saga ran to a terminal state.
    Finished(Trade),
}

impl ExecutionOutcome {
    #[must_use]
    pub fn trade(&self) -> Option<&Trade> {
        match self {
            Self::Finished(trade) => Some(trade),
            Self::Skipped(_) => None,
        }
    }

    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Operator-facing notification for trades that did not complete cleanly.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeAlert {
    /// Leg A could not be cancelled; one venue now holds an unhedged position.
    Orphaned(Trade),
    /// Leg B failed and leg A was cancelled.
    Compensated(Trade),
}

impl TradeAlert {
    #[must_use]
    pub fn trade(&self) -> &Trade {
        match self {
            Self::Orphaned(trade) | Self::Compensated(trade) => trade,
        }
    }
}

// =============================================================================
// Executor
// =============================================================================

struct Leg<'a> {
    venue: &'a dyn VenueClient,
    request: OrderRequest,
}

/// Runs trade sagas and keeps a bounded history of finished trades.
pub struct OrderExecutor {
    spot: Arc<dyn VenueClient>,
    derivatives: Arc<dyn VenueClient>,
    in_flight: Arc<Mutex<HashSet<String>>>,
    history: Mutex<VecDeque<Trade>>,
    history_limit: usize,
    alerts: broadcast::Sender<TradeAlert>,
    span: tracing::Span,
}

impl std::fmt::Debug for OrderExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderExecutor")
            .field("spot", &self.spot.name())
            .field("derivatives", &self.derivatives.name())
            .field("in_flight", &self.in_flight.lock().len())
            .field("history_limit", &self.history_limit)
            .finish()
    }
}

impl OrderExecutor {
    #[must_use]
    pub fn new(
        spot: Arc<dyn VenueClient>,
        derivatives: Arc<dyn VenueClient>,
        history_limit: usize,
        span: tracing::Span,
    ) -> Self {
        let (alerts, _) = broadcast::channel(ALERT_CHANNEL_CAPACITY);
        Self {
            spot,
            derivatives,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            history: Mutex::new(VecDeque::with_capacity(history_limit.min(1024))),
            history_limit,
            alerts,
            span,
        }
    }

    /// Claims the strategy's token, or `None` if a saga already holds it.
    #[must_use]
    pub fn try_acquire(&self, strategy_id: &str) -> Option<ExecutionToken> {
        let mut in_flight = self.in_flight.lock();
        if !in_flight.insert(strategy_id.to_string()) {
            return None;
        }
        Some(ExecutionToken {
            strategy_id: strategy_id.to_string(),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    #[must_use]
    pub fn is_in_flight(&self, strategy_id: &str) -> bool {
        self.in_flight.lock().contains(strategy_id)
    }

    /// Receiver for orphaned and compensated trade alerts.
    #[must_use]
    pub fn subscribe_alerts(&self) -> broadcast::Receiver<TradeAlert> {
        self.alerts.subscribe()
    }

    /// Finished trades, oldest first.
    #[must_use]
    pub fn recent_trades(&self) -> Vec<Trade> {
        self.history.lock().iter().cloned().collect()
    }

    /// Runs one saga for `strategy`.
    ///
    /// Enter trades are sized at `min_trade_size`; exit trades at
    /// `min(min_trade_size, position)`.
    pub async fn execute(
        &self,
        strategy: &Strategy,
        snapshot: &BasisSnapshot,
        side: TradeSide,
        position: Decimal,
    ) -> ExecutionOutcome {
        let Some(_token) = self.try_acquire(&strategy.id) else {
            debug!(parent: &self.span, strategy_id = %strategy.id, "saga already in flight, skipping");
            return ExecutionOutcome::Skipped(SkipReason::InFlight);
        };

        let size = match side {
            TradeSide::Enter => strategy.min_trade_size,
            TradeSide::Exit => strategy.min_trade_size.min(position),
        };
        if size <= Decimal::ZERO {
            debug!(parent: &self.span, strategy_id = %strategy.id, %side, "nothing to trade");
            return ExecutionOutcome::Skipped(SkipReason::NothingToTrade);
        }

        let id = Uuid::new_v4();
        let (leg_a, leg_b) = self.plan(id, side, snapshot, size);
        let trade = Trade {
            id,
            strategy_id: strategy.id.clone(),
            side,
            leg_a_symbol: leg_a.request.symbol.clone(),
            leg_b_symbol: leg_b.request.symbol.clone(),
            leg_a_order_id: None,
            leg_b_order_id: None,
            leg_a_price: leg_a.request.price,
            leg_b_price: leg_b.request.price,
            spot_price: snapshot.spot_price,
            future_price: snapshot.future_price,
            basis_percent: snapshot.basis_percent,
            size,
            status: TradeStatus::Initiated,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        };

        let span = info_span!(
            parent: &self.span,
            "saga",
            trade_id = %id,
            strategy_id = %strategy.id,
            %side
        );
        let trade = self.run_saga(trade, leg_a, leg_b).instrument(span).await;
        self.record(&trade);
        ExecutionOutcome::Finished(trade)
    }

    fn plan(&self, id: Uuid, side: TradeSide, snapshot: &BasisSnapshot, size: Decimal) -> (Leg<'_>, Leg<'_>) {
        let up = Decimal::ONE + SLIPPAGE_BUFFER;
        let down = Decimal::ONE - SLIPPAGE_BUFFER;

        let (a, b) = match side {
            TradeSide::Enter => (
                Leg {
                    venue: self.spot.as_ref(),
                    request: OrderRequest::limit(&snapshot.spot_symbol, OrderSide::Buy, snapshot.spot_price * up, size),
                },
                Leg {
                    venue: self.derivatives.as_ref(),
                    request: OrderRequest::limit(
                        &snapshot.future_symbol,
                        OrderSide::Sell,
                        snapshot.future_price * down,
                        size,
                    ),
                },
            ),
            TradeSide::Exit => (
                Leg {
                    venue: self.derivatives.as_ref(),
                    request: OrderRequest::limit(&snapshot.future_symbol, OrderSide::Buy, snapshot.future_price * up, size)
                        .reduce_only(),
                },
                Leg {
                    venue: self.spot.as_ref(),
                    request: OrderRequest::limit(&snapshot.spot_symbol, OrderSide::Sell, snapshot.spot_price * down, size),
                },
            ),
        };

        (
            Leg {
                venue: a.venue,
                request: a.request.with_client_order_id(format!("{id}-a")),
            },
            Leg {
                venue: b.venue,
                request: b.request.with_client_order_id(format!("{id}-b")),
            },
        )
    }

    async fn run_saga(&self, mut trade: Trade, leg_a: Leg<'_>, leg_b: Leg<'_>) -> Trade {
        info!(
            leg_a = %trade.leg_a_symbol,
            leg_b = %trade.leg_b_symbol,
            size = %trade.size,
            basis_percent = %trade.basis_percent,
            "starting trade"
        );

        let order_a = match leg_a.venue.place_order(&leg_a.request).await {
            Ok(order) => order,
            Err(e) => {
                warn!(venue = leg_a.venue.name(), error = %e, "leg A failed, nothing to unwind");
                trade.error = Some(e.to_string());
                advance(&mut trade, TradeStatus::Failed);
                return trade;
            }
        };
        trade.leg_a_order_id = Some(order_a.order_id.clone());
        advance(&mut trade, TradeStatus::LegAPlaced);
        debug!(order_id = %order_a.order_id, "leg A placed");

        match leg_b.venue.place_order(&leg_b.request).await {
            Ok(order_b) => {
                trade.leg_b_order_id = Some(order_b.order_id);
                advance(&mut trade, TradeStatus::Completed);
                info!(
                    leg_a_order = ?trade.leg_a_order_id,
                    leg_b_order = ?trade.leg_b_order_id,
                    "trade completed"
                );
            }
            Err(e) => {
                warn!(venue = leg_b.venue.name(), error = %e, "leg B failed, cancelling leg A");
                trade.error = Some(e.to_string());
                advance(&mut trade, TradeStatus::Compensating);
                self.compensate(&mut trade, leg_a.venue, &order_a.order_id).await;
            }
        }

        trade
    }

    async fn compensate(&self, trade: &mut Trade, venue: &dyn VenueClient, order_id: &str) {
        match venue.cancel_order(order_id).await {
            Ok(()) => {
                advance(trade, TradeStatus::Compensated);
                warn!(order_id, "leg A cancelled, trade compensated");
                self.publish(TradeAlert::Compensated(trade.clone()));
            }
            Err(e) => {
                trade.error = Some(format!("{}; cancel failed: {e}", trade.error.as_deref().unwrap_or("leg B failed")));
                advance(trade, TradeStatus::Orphaned);
                error!(
                    order_id,
                    venue = venue.name(),
                    symbol = %trade.leg_a_symbol,
                    size = %trade.size,
                    error = %e,
                    "ORPHANED TRADE: leg A could not be cancelled, manual intervention required"
                );
                self.publish(TradeAlert::Orphaned(trade.clone()));
            }
        }
    }

    fn publish(&self, alert: TradeAlert) {
        if self.alerts.send(alert).is_err() {
            debug!("no alert subscribers");
        }
    }

    fn record(&self, trade: &Trade) {
        if self.history_limit == 0 {
            return;
        }
        let mut history = self.history.lock();
        while history.len() >= self.history_limit {
            history.pop_front();
        }
        history.push_back(trade.clone());
    }
}

fn advance(trade: &mut Trade, next: TradeStatus) {
    if let Err(e) = trade.transition(next) {
        error!(trade_id = %trade.id, error = %e, "trade state machine violated");
    }
}
