//! Shared domain types for the basis trading system.
//!
//! This crate holds everything both the venue clients and the engine need:
//! market and order models, the [`VenueClient`] capability trait, the
//! venue error type, and layered configuration.

pub mod config;
pub mod config_loader;
pub mod error;
pub mod market;
pub mod order;
pub mod position;
pub mod strategy;
pub mod traits;

pub use config::{
    AppConfig, AuthConfig, EngineConfig, LogFormat, LoggingConfig, StrategyConfig, VenueConfig,
};
pub use config_loader::ConfigLoader;
pub use error::{VenueError, VenueResult};
pub use market::{BookLevel, MarketKind, OrderBook, Ticker};
pub use order::{Order, OrderRequest, OrderSide, OrderStatus, OrderType, TimeInForce};
pub use position::{Position, PositionSide};
pub use strategy::{BasisSnapshot, Strategy};
pub use traits::VenueClient;
