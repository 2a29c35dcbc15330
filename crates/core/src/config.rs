use crate::strategy::Strategy;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub spot: VenueConfig,
    pub derivatives: VenueConfig,
    pub logging: LoggingConfig,
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            spot: VenueConfig::spot(),
            derivatives: VenueConfig::derivatives(),
            logging: LoggingConfig::default(),
            strategies: Vec::new(),
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// Scheduling and sizing knobs for the basis engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Interval between ticker refreshes.
    #[serde(rename = "market_data_interval_ms", with = "duration_ms")]
    pub market_data_interval: Duration,

    /// Interval between strategy evaluations.
    #[serde(rename = "evaluation_interval_ms", with = "duration_ms")]
    pub evaluation_interval: Duration,

    /// Interval between position reconciliations.
    #[serde(rename = "reconciliation_interval_ms", with = "duration_ms")]
    pub reconciliation_interval: Duration,

    /// Upper bound on concurrent ticker fetches in one refresh.
    pub max_concurrent_fetches: usize,

    /// Tickers older than this are ignored by evaluation.
    #[serde(rename = "max_ticker_age_ms", with = "duration_ms")]
    pub max_ticker_age: Duration,

    /// Symbols ending with this suffix are routed to the derivatives venue.
    pub future_symbol_suffix: String,

    /// Number of finished trades kept in memory.
    pub trade_history_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            market_data_interval: Duration::from_secs(1),
            evaluation_interval: Duration::from_secs(5),
            reconciliation_interval: Duration::from_secs(10),
            max_concurrent_fetches: 8,
            max_ticker_age: Duration::from_secs(15),
            future_symbol_suffix: "-PERP".to_string(),
            trade_history_limit: 256,
        }
    }
}

// =============================================================================
// Venues
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Label used in logs.
    pub name: String,
    pub base_url: String,
    pub ws_url: String,
    pub requests_per_second: u32,
    #[serde(rename = "timeout_ms", with = "duration_ms")]
    pub timeout: Duration,
    /// Quote currency used to turn spot balances into positions.
    pub quote_currency: String,
    pub auth: AuthConfig,
}

impl VenueConfig {
    /// Defaults for the spot venue.
    #[must_use]
    pub fn spot() -> Self {
        Self {
            name: "spot".to_string(),
            base_url: "https://api.coinbase.com".to_string(),
            ws_url: "wss://advanced-trade-ws.coinbase.com".to_string(),
            requests_per_second: 10,
            timeout: Duration::from_secs(10),
            quote_currency: "USD".to_string(),
            auth: AuthConfig::Hmac {
                api_key_env: "BASIS_SPOT_API_KEY".to_string(),
                api_secret_env: "BASIS_SPOT_API_SECRET".to_string(),
                passphrase_env: "BASIS_SPOT_PASSPHRASE".to_string(),
            },
        }
    }

    /// Defaults for the derivatives venue.
    #[must_use]
    pub fn derivatives() -> Self {
        Self {
            name: "derivatives".to_string(),
            auth: AuthConfig::Hmac {
                api_key_env: "BASIS_DERIVATIVES_API_KEY".to_string(),
                api_secret_env: "BASIS_DERIVATIVES_API_SECRET".to_string(),
                passphrase_env: "BASIS_DERIVATIVES_PASSPHRASE".to_string(),
            },
            ..Self::spot()
        }
    }
}

/// Which signing scheme a venue uses, and where its secrets live.
///
/// Only environment variable names are stored here, never the secrets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AuthConfig {
    /// Timestamp-signed request headers.
    Hmac {
        api_key_env: String,
        api_secret_env: String,
        passphrase_env: String,
    },
    /// Short-lived ES256 bearer token.
    Jwt {
        key_name_env: String,
        private_key_env: String,
    },
}

// =============================================================================
// Logging
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

// =============================================================================
// Strategies
// =============================================================================

/// Strategy definition seeded into the registry at start-up.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub id: String,
    pub spot_symbol: String,
    pub future_symbol: String,
    pub target_basis: Decimal,
    pub max_position: Decimal,
    pub min_trade_size: Decimal,
    #[serde(default)]
    pub rebalance_threshold: Decimal,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl StrategyConfig {
    #[must_use]
    pub fn to_strategy(&self) -> Strategy {
        Strategy::new(
            &self.id,
            &self.spot_symbol,
            &self.future_symbol,
            self.target_basis,
            self.max_position,
            self.min_trade_size,
        )
        .with_rebalance_threshold(self.rebalance_threshold)
        .with_active(self.is_active)
    }
}

/// Serializes a `Duration` as whole milliseconds.
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
