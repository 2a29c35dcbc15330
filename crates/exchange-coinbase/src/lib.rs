//! Coinbase Advanced Trade integration for the basis trading engine.
//!
//! This crate provides:
//! - REST client with rate limiting implementing [`basis_trade_core::VenueClient`]
//! - HMAC and ES256 JWT request authentication behind one trait
//! - Lazily connected websocket subscriptions
//! - Wire types for the v3 brokerage endpoints
//!
//! # Authentication
//!
//! Credentials are read from environment variables whose names come from the
//! venue's `auth` config section:
//!
//! - `type = "hmac"`: `api_key_env`, `api_secret_env`, `passphrase_env`
//! - `type = "jwt"`: `key_name_env`, `private_key_env` (EC P-256 PEM)
//!
//! # API Endpoints
//!
//! - `GET /products/{product_id}/ticker` - Latest trade and best quote
//! - `GET /product_book` - Aggregated order book
//! - `GET /accounts` - Spot balances (spot role)
//! - `GET /cfm/positions` - Futures positions (derivatives role)
//! - `POST /orders` - Submit order
//! - `POST /orders/batch_cancel` - Cancel order
//! - `GET /orders/historical/{order_id}` - Get order status

pub mod auth;
pub mod client;
pub mod error;
pub mod types;
pub mod websocket;

pub use auth::{Authenticator, HmacAuthenticator, JwtAuthenticator, SignedHeaders};
pub use client::{
    CoinbaseClient, CoinbaseClientConfig, VenueRole, COINBASE_API_URL, COINBASE_WS_URL,
};
pub use error::{CoinbaseError, Result};
pub use websocket::CoinbaseWebSocket;
