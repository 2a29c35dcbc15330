//! Long-running engine command.

use super::build_engine;
use anyhow::{Context, Result};
use basis_trade_core::AppConfig;
use basis_trade_engine::{BasisEngine, TradeAlert};
use clap::Args;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};

/// Arguments for the run command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Seconds between status log lines (0 disables them)
    #[arg(long, default_value_t = 60)]
    pub status_interval_secs: u64,
}

/// Runs the engine until SIGINT or SIGTERM, then stops the workers.
///
/// # Errors
/// Returns an error if the engine cannot be built or started.
pub async fn run_engine(config: &AppConfig, args: RunArgs) -> Result<()> {
    let engine = build_engine(config)?;

    let alerts = tokio::spawn(log_alerts(engine.subscribe_alerts()));
    engine.start()?;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    let status_enabled = args.status_interval_secs > 0;
    let mut status = tokio::time::interval(Duration::from_secs(args.status_interval_secs.max(1)));
    status.tick().await;

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                break;
            }
            _ = status.tick(), if status_enabled => log_status(&engine),
        }
    }

    engine.stop().await?;
    alerts.abort();
    info!(trades = engine.recent_trades().len(), "basis engine exited");
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    let mut sigterm = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("failed to listen for SIGINT")?;
            info!("Received SIGINT (Ctrl+C), initiating graceful shutdown");
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
    Ok(())
}

async fn log_alerts(mut alerts: broadcast::Receiver<TradeAlert>) {
    loop {
        match alerts.recv().await {
            Ok(TradeAlert::Orphaned(trade)) => error!(
                trade_id = %trade.id,
                strategy_id = %trade.strategy_id,
                symbol = %trade.leg_a_symbol,
                order_id = ?trade.leg_a_order_id,
                size = %trade.size,
                error = ?trade.error,
                "ORPHANED TRADE: unhedged leg open, manual intervention required"
            ),
            Ok(TradeAlert::Compensated(trade)) => warn!(
                trade_id = %trade.id,
                strategy_id = %trade.strategy_id,
                error = ?trade.error,
                "trade compensated"
            ),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "alert receiver lagged"),
            Err(RecvError::Closed) => break,
        }
    }
}

fn log_status(engine: &BasisEngine) {
    for snapshot in engine.basis_snapshots() {
        info!(
            strategy_id = %snapshot.strategy_id,
            spot = %snapshot.spot_price,
            future = %snapshot.future_price,
            basis_percent = %snapshot.basis_percent.round_dp(4),
            "basis"
        );
    }
    info!(
        strategies = engine.strategies().len(),
        positions = engine.positions().len(),
        recent_trades = engine.recent_trades().len(),
        "status"
    );
}
