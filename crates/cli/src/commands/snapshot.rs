//! One-shot basis snapshot.
//!
//! Refreshes prices once through the same engine the run command uses and
//! prints the basis for each configured strategy. No orders are placed.

use super::build_engine;
use anyhow::{bail, Result};
use basis_trade_core::AppConfig;
use clap::Args;
use rust_decimal::Decimal;

/// Arguments for the snapshot command.
#[derive(Args, Debug, Clone)]
pub struct SnapshotArgs {
    /// Only show this strategy id
    #[arg(long)]
    pub strategy: Option<String>,

    /// Also reconcile and print venue positions
    #[arg(long)]
    pub positions: bool,
}

/// Runs the snapshot command.
///
/// # Errors
/// Returns an error if the engine cannot be built or the strategy filter
/// matches nothing.
pub async fn run_snapshot(config: &AppConfig, args: SnapshotArgs) -> Result<()> {
    let engine = build_engine(config)?;

    if let Some(id) = &args.strategy {
        if engine.strategy(id).is_none() {
            bail!("unknown strategy: {id}");
        }
    }

    let refresh = engine.run_market_data_cycle().await;
    if !refresh.failed.is_empty() {
        tracing::warn!(failed = ?refresh.failed, "some prices could not be fetched");
    }

    let snapshots = engine.basis_snapshots();
    println!(
        "{:<16} {:<12} {:>14} {:<14} {:>14} {:>10} {:>8}",
        "STRATEGY", "SPOT", "SPOT PX", "FUTURE", "FUTURE PX", "BASIS %", "TARGET"
    );
    for strategy in engine.strategies() {
        if args.strategy.as_ref().is_some_and(|id| *id != strategy.id) {
            continue;
        }
        match snapshots.iter().find(|s| s.strategy_id == strategy.id) {
            Some(snapshot) => println!(
                "{:<16} {:<12} {:>14} {:<14} {:>14} {:>10} {:>8}",
                strategy.id,
                strategy.spot_symbol,
                snapshot.spot_price,
                strategy.future_symbol,
                snapshot.future_price,
                format_percent(snapshot.basis_percent),
                strategy.target_basis,
            ),
            None => println!(
                "{:<16} {:<12} {:>14} {:<14} {:>14} {:>10} {:>8}",
                strategy.id, strategy.spot_symbol, "n/a", strategy.future_symbol, "n/a", "n/a", strategy.target_basis,
            ),
        }
    }

    if args.positions {
        let summary = engine.run_reconciliation_cycle().await;
        if !summary.is_complete() {
            tracing::warn!(?summary, "positions incomplete");
        }
        println!();
        println!("{:<16} {:<6} {:>14}", "SYMBOL", "SIDE", "SIZE");
        for position in engine.positions() {
            let side = format!("{:?}", position.side);
            println!("{:<16} {:<6} {:>14}", position.symbol, side, position.size);
        }
    }

    Ok(())
}

fn format_percent(value: Decimal) -> String {
    format!("{:.3}", value.round_dp(3))
}
