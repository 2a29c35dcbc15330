//! CLI commands for the basis trading engine.

pub mod check_config;
pub mod run;
pub mod snapshot;

pub use check_config::{run_check_config, CheckConfigArgs};
pub use run::{run_engine, RunArgs};
pub use snapshot::{run_snapshot, SnapshotArgs};

use anyhow::{Context, Result};
use basis_trade_coinbase::{CoinbaseClient, VenueRole};
use basis_trade_core::AppConfig;
use basis_trade_engine::BasisEngine;
use std::sync::Arc;

/// Builds both venue clients and an engine seeded with the configured
/// strategies.
///
/// # Errors
/// Returns an error if credentials are missing or a strategy is invalid.
pub fn build_engine(config: &AppConfig) -> Result<BasisEngine> {
    let span = tracing::info_span!("basis_engine");

    let spot = CoinbaseClient::from_config(
        &config.spot,
        VenueRole::Spot,
        tracing::info_span!(parent: &span, "venue", venue = %config.spot.name),
    )
    .with_context(|| format!("failed to create spot client '{}'", config.spot.name))?;

    let derivatives = CoinbaseClient::from_config(
        &config.derivatives,
        VenueRole::Derivatives,
        tracing::info_span!(parent: &span, "venue", venue = %config.derivatives.name),
    )
    .with_context(|| format!("failed to create derivatives client '{}'", config.derivatives.name))?;

    let engine = BasisEngine::with_span(config.engine.clone(), Arc::new(spot), Arc::new(derivatives), span);
    for strategy in &config.strategies {
        engine
            .add_strategy(strategy.to_strategy())
            .with_context(|| format!("failed to register strategy '{}'", strategy.id))?;
    }

    tracing::info!(
        strategies = config.strategies.len(),
        spot = %config.spot.base_url,
        derivatives = %config.derivatives.base_url,
        "engine ready"
    );
    Ok(engine)
}
