use anyhow::Result;
use basis_trade_core::ConfigLoader;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod logging;

use commands::{CheckConfigArgs, RunArgs, SnapshotArgs};

#[derive(Parser)]
#[command(name = "basis-trade")]
#[command(about = "Spot/perpetual basis trading engine for Coinbase", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true, default_value = "config/Config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine until SIGINT or SIGTERM
    Run(RunArgs),
    /// Fetch prices once and print the current basis per strategy
    Snapshot(SnapshotArgs),
    /// Validate configuration and report which credentials are present
    CheckConfig(CheckConfigArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load_from(&cli.config)?;
    logging::init(&config.logging)?;
    tracing::debug!(path = %cli.config.display(), "configuration loaded");

    match cli.command {
        Commands::Run(args) => commands::run_engine(&config, args).await?,
        Commands::Snapshot(args) => commands::run_snapshot(&config, args).await?,
        Commands::CheckConfig(args) => commands::run_check_config(&config, &args)?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run_defaults() {
        let cli = Cli::try_parse_from(["basis-trade", "run"]).unwrap();
        assert_eq!(cli.config, PathBuf::from("config/Config.toml"));
        match cli.command {
            Commands::Run(args) => assert_eq!(args.status_interval_secs, 60),
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_parse_snapshot_with_global_config() {
        let cli = Cli::try_parse_from([
            "basis-trade",
            "snapshot",
            "--strategy",
            "btc-basis",
            "--positions",
            "-c",
            "/etc/basis.toml",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("/etc/basis.toml"));
        match cli.command {
            Commands::Snapshot(args) => {
                assert_eq!(args.strategy.as_deref(), Some("btc-basis"));
                assert!(args.positions);
            }
            _ => panic!("expected snapshot"),
        }
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(Cli::try_parse_from(["basis-trade", "backtest"]).is_err());
    }
}
