//! Request authentication for Coinbase APIs.
//!
//! Two schemes sit behind the [`Authenticator`] trait and are picked once,
//! at client construction, from [`AuthConfig`]:
//!
//! - [`HmacAuthenticator`]: key/secret/passphrase. Each request carries
//!   `CB-ACCESS-*` headers with a base64 HMAC-SHA256 signature over
//!   `timestamp + METHOD + path + body`.
//! - [`JwtAuthenticator`]: CDP API key. Each request carries a fresh ES256
//!   bearer token valid for two minutes.
//!
//! # Security
//!
//! - Secrets are read from environment variables named in config
//! - Secrets are never logged; `Debug` output is redacted

use crate::error::{CoinbaseError, Result};
use base64::engine::general_purpose::{STANDARD as BASE64, URL_SAFE_NO_PAD as BASE64_URL};
use base64::Engine;
use basis_trade_core::AuthConfig;
use hmac::{Hmac, Mac};
use p256::ecdsa::{signature::Signer, Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::Sha256;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Lifetime of a generated JWT, in seconds.
pub const JWT_TTL_SECS: u64 = 120;

/// JWT issuer claim expected by Coinbase.
pub const JWT_ISSUER: &str = "cdp";

/// Path signed for websocket subscriptions under HMAC auth.
const WS_VERIFY_PATH: &str = "/users/self/verify";

// =============================================================================
// Authenticator
// =============================================================================

/// Adds credentials to outgoing requests and subscription messages.
pub trait Authenticator: Send + Sync + std::fmt::Debug {
    /// Returns the headers to attach to a REST request.
    ///
    /// `host` is the bare host name (no scheme); `path` excludes the query.
    fn request_headers(&self, method: &str, host: &str, path: &str, body: &str)
        -> Result<SignedHeaders>;

    /// Returns the fields to merge into a websocket subscribe message.
    fn subscription_fields(&self) -> Result<Map<String, Value>>;

    /// Scheme label for logs.
    fn scheme(&self) -> &'static str;
}

/// Builds the authenticator selected by `config`, reading secrets from the
/// environment.
///
/// # Errors
/// Returns a configuration error if a variable is missing, or a signing error
/// if a private key cannot be parsed.
pub fn from_config(config: &AuthConfig) -> Result<Arc<dyn Authenticator>> {
    match config {
        AuthConfig::Hmac {
            api_key_env,
            api_secret_env,
            passphrase_env,
        } => Ok(Arc::new(HmacAuthenticator::new(
            read_env(api_key_env)?,
            SecretString::from(read_env(api_secret_env)?),
            SecretString::from(read_env(passphrase_env)?),
        ))),
        AuthConfig::Jwt {
            key_name_env,
            private_key_env,
        } => {
            let pem = read_env(private_key_env)?.replace("\\n", "\n");
            Ok(Arc::new(JwtAuthenticator::new(read_env(key_name_env)?, &pem)?))
        }
    }
}

fn read_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| {
        CoinbaseError::Configuration(format!("missing environment variable: {name}"))
    })
}

fn unix_now() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| CoinbaseError::Signing(format!("failed to get timestamp: {e}")))
}

// =============================================================================
// Signed Headers
// =============================================================================

/// Authentication headers for one request.
#[derive(Clone, Default)]
pub struct SignedHeaders(Vec<(&'static str, String)>);

impl SignedHeaders {
    fn push(&mut self, name: &'static str, value: String) {
        self.0.push((name, value));
    }

    /// Iterates `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        self.0.iter().map(|(k, v)| (*k, v.as_str()))
    }

    /// Looks up a header by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.iter().find(|(k, _)| *k == name).map(|(_, v)| v)
    }

    /// Number of headers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if no headers are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SignedHeaders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<_> = self.0.iter().map(|(k, _)| *k).collect();
        f.debug_struct("SignedHeaders").field("names", &names).finish()
    }
}

// =============================================================================
// HMAC
// =============================================================================

/// Key/secret/passphrase signer.
pub struct HmacAuthenticator {
    api_key: String,
    secret: SecretString,
    passphrase: SecretString,
}

impl std::fmt::Debug for HmacAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HmacAuthenticator")
            .field("api_key", &self.api_key)
            .field("secret", &"[REDACTED]")
            .field("passphrase", &"[REDACTED]")
            .finish()
    }
}

impl HmacAuthenticator {
    #[must_use]
    pub fn new(api_key: impl Into<String>, secret: SecretString, passphrase: SecretString) -> Self {
        Self {
            api_key: api_key.into(),
            secret,
            passphrase,
        }
    }

    /// Returns the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Base64 HMAC-SHA256 of `message` under the API secret.
    ///
    /// # Errors
    /// Returns a signing error if the MAC cannot be keyed.
    pub fn sign(&self, message: &str) -> Result<String> {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret.expose_secret().as_bytes())
            .map_err(|e| CoinbaseError::Signing(format!("invalid HMAC key: {e}")))?;
        mac.update(message.as_bytes());
        Ok(BASE64.encode(mac.finalize().into_bytes()))
    }

    /// Builds request headers for a fixed timestamp (unix seconds).
    ///
    /// # Errors
    /// Returns a signing error if signing fails.
    pub fn headers_at(&self, method: &str, path: &str, body: &str, timestamp: u64) -> Result<SignedHeaders> {
        let timestamp = timestamp.to_string();
        let signature = self.sign(&format!("{timestamp}{method}{path}{body}"))?;

        let mut headers = SignedHeaders::default();
        headers.push("CB-ACCESS-KEY", self.api_key.clone());
        headers.push("CB-ACCESS-SIGN", signature);
        headers.push("CB-ACCESS-TIMESTAMP", timestamp);
        headers.push("CB-ACCESS-PASSPHRASE", self.passphrase.expose_secret().to_string());
        Ok(headers)
    }

    fn subscription_fields_at(&self, timestamp: u64) -> Result<Map<String, Value>> {
        let timestamp = timestamp.to_string();
        let signature = self.sign(&format!("{timestamp}GET{WS_VERIFY_PATH}"))?;

        let mut fields = Map::new();
        fields.insert("signature".into(), Value::String(signature));
        fields.insert("key".into(), Value::String(self.api_key.clone()));
        fields.insert(
            "passphrase".into(),
            Value::String(self.passphrase.expose_secret().to_string()),
        );
        fields.insert("timestamp".into(), Value::String(timestamp));
        Ok(fields)
    }
}

impl Authenticator for HmacAuthenticator {
    fn request_headers(&self, method: &str, _host: &str, path: &str, body: &str) -> Result<SignedHeaders> {
        self.headers_at(method, path, body, unix_now()?)
    }

    fn subscription_fields(&self) -> Result<Map<String, Value>> {
        self.subscription_fields_at(unix_now()?)
    }

    fn scheme(&self) -> &'static str {
        "hmac"
    }
}

// =============================================================================
// JWT
// =============================================================================

#[derive(Serialize)]
struct JwtHeader<'a> {
    alg: &'static str,
    typ: &'static str,
    kid: &'a str,
    nonce: &'a str,
}

#[derive(Serialize)]
struct JwtClaims<'a> {
    sub: &'a str,
    iss: &'static str,
    nbf: u64,
    exp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    uri: Option<String>,
}

/// ES256 bearer-token signer for CDP API keys.
pub struct JwtAuthenticator {
    key_name: String,
    signing_key: SigningKey,
}

impl std::fmt::Debug for JwtAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtAuthenticator")
            .field("key_name", &self.key_name)
            .field("signing_key", &"[REDACTED]")
            .finish()
    }
}

impl JwtAuthenticator {
    /// Creates a signer from a key name and an EC P-256 private key in SEC1
    /// (`BEGIN EC PRIVATE KEY`) or PKCS#8 (`BEGIN PRIVATE KEY`) PEM form.
    ///
    /// # Errors
    /// Returns a signing error if the key cannot be parsed.
    pub fn new(key_name: impl Into<String>, private_key_pem: &str) -> Result<Self> {
        let secret = p256::SecretKey::from_sec1_pem(private_key_pem)
            .or_else(|_| p256::SecretKey::from_pkcs8_pem(private_key_pem))
            .map_err(|e| CoinbaseError::Signing(format!("failed to parse private key: {e}")))?;

        Ok(Self::with_signing_key(key_name, SigningKey::from(secret)))
    }

    /// Creates a signer from an already-parsed key.
    #[must_use]
    pub fn with_signing_key(key_name: impl Into<String>, signing_key: SigningKey) -> Self {
        Self {
            key_name: key_name.into(),
            signing_key,
        }
    }

    /// Returns the key name used as `sub` and `kid`.
    #[must_use]
    pub fn key_name(&self) -> &str {
        &self.key_name
    }

    /// Builds a signed token. `uri` is `"METHOD host/path"` for REST calls and
    /// `None` for websocket subscriptions.
    ///
    /// # Errors
    /// Returns a serialization error if the header or claims cannot be encoded.
    pub fn token_at(&self, uri: Option<String>, now: u64) -> Result<String> {
        let nonce = random_nonce();
        let header = JwtHeader {
            alg: "ES256",
            typ: "JWT",
            kid: &self.key_name,
            nonce: &nonce,
        };
        let claims = JwtClaims {
            sub: &self.key_name,
            iss: JWT_ISSUER,
            nbf: now,
            exp: now + JWT_TTL_SECS,
            uri,
        };

        let signing_input = format!(
            "{}.{}",
            BASE64_URL.encode(serde_json::to_vec(&header)?),
            BASE64_URL.encode(serde_json::to_vec(&claims)?)
        );
        let signature: Signature = self.signing_key.sign(signing_input.as_bytes());

        Ok(format!("{signing_input}.{}", BASE64_URL.encode(signature.to_bytes())))
    }
}

impl Authenticator for JwtAuthenticator {
    fn request_headers(&self, method: &str, host: &str, path: &str, _body: &str) -> Result<SignedHeaders> {
        let token = self.token_at(Some(format!("{method} {host}{path}")), unix_now()?)?;

        let mut headers = SignedHeaders::default();
        headers.push("Authorization", format!("Bearer {token}"));
        Ok(headers)
    }

    fn subscription_fields(&self) -> Result<Map<String, Value>> {
        let mut fields = Map::new();
        fields.insert("jwt".into(), Value::String(self.token_at(None, unix_now()?)?));
        Ok(fields)
    }

    fn scheme(&self) -> &'static str {
        "jwt"
    }
}

fn random_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

// =============================================================================
// Tests
// =============================================================================
