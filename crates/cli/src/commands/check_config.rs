//! Configuration check command.

use anyhow::{bail, Result};
use basis_trade_core::{AppConfig, AuthConfig, VenueConfig};
use basis_trade_engine::validate_strategy;
use clap::Args;

/// Arguments for the check-config command.
#[derive(Args, Debug, Clone)]
pub struct CheckConfigArgs {
    /// Fail if any credential environment variable is missing
    #[arg(long)]
    pub require_credentials: bool,
}

/// Runs the check-config command.
///
/// # Errors
/// Returns an error if a strategy is invalid, or credentials are missing and
/// `--require-credentials` was given.
pub fn run_check_config(config: &AppConfig, args: &CheckConfigArgs) -> Result<()> {
    let engine = &config.engine;
    println!("engine:");
    println!("  market data interval  {:?}", engine.market_data_interval);
    println!("  evaluation interval   {:?}", engine.evaluation_interval);
    println!("  reconcile interval    {:?}", engine.reconciliation_interval);
    println!("  max ticker age        {:?}", engine.max_ticker_age);
    println!("  max concurrent fetch  {}", engine.max_concurrent_fetches);
    println!("  future suffix         {}", engine.future_symbol_suffix);

    let mut missing = Vec::new();
    for (role, venue) in [("spot", &config.spot), ("derivatives", &config.derivatives)] {
        print_venue(role, venue);
        for (name, present) in credential_status(&venue.auth) {
            println!("    {name:<32} {}", if present { "set" } else { "MISSING" });
            if !present {
                missing.push(name);
            }
        }
    }

    println!("strategies:");
    let mut invalid = 0;
    for strategy in &config.strategies {
        let status = match validate_strategy(&strategy.to_strategy()) {
            Ok(()) if strategy.is_active => "ok".to_string(),
            Ok(()) => "ok (inactive)".to_string(),
            Err(e) => {
                invalid += 1;
                e.to_string()
            }
        };
        println!(
            "  {:<16} {} / {}  target {}%  {}",
            strategy.id, strategy.spot_symbol, strategy.future_symbol, strategy.target_basis, status
        );
    }

    if invalid > 0 {
        bail!("{invalid} invalid strateg{}", if invalid == 1 { "y" } else { "ies" });
    }
    if args.require_credentials && !missing.is_empty() {
        bail!("missing credential variables: {}", missing.join(", "));
    }
    Ok(())
}

fn print_venue(role: &str, venue: &VenueConfig) {
    let scheme = match venue.auth {
        AuthConfig::Hmac { .. } => "hmac",
        AuthConfig::Jwt { .. } => "jwt",
    };
    println!("{role} ({}):", venue.name);
    println!("  rest  {}", venue.base_url);
    println!("  ws    {}", venue.ws_url);
    println!("  rate  {} req/s, timeout {:?}", venue.requests_per_second, venue.timeout);
    println!("  auth  {scheme}");
}

/// Environment variables named by `auth` and whether each is set.
fn credential_status(auth: &AuthConfig) -> Vec<(&str, bool)> {
    let names: Vec<&str> = match auth {
        AuthConfig::Hmac {
            api_key_env,
            api_secret_env,
            passphrase_env,
        } => vec![api_key_env.as_str(), api_secret_env.as_str(), passphrase_env.as_str()],
        AuthConfig::Jwt {
            key_name_env,
            private_key_env,
        } => vec![key_name_env.as_str(), private_key_env.as_str()],
    };
    names
        .into_iter()
        .map(|name| (name, std::env::var_os(name).is_some()))
        .collect()
}
