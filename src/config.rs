// src/config.rs

use std::env;
use std::time::Duration;
use dotenvy::dotenv;

/// Default lifetime of an admission token (24 hours).
pub const DEFAULT_JWT_EXPIRATION_SECS: u64 = 86_400;

/// Default bound on every store or cache call.
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 3_000;

/// Default lifetime of a staged order in the cache.
pub const DEFAULT_ORDER_TTL_SECS: u64 = 86_400;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    /// Admission token lifetime in seconds.
    pub jwt_expiration: u64,
    pub rust_log: String,
    pub bind_addr: String,
    pub store_timeout: Duration,
    pub order_ttl: Duration,
    pub payment: PaymentConfig,
}

/// Credentials and endpoint of the payment gateway.
#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub api_version: String,
}

impl Config {
    pub fn from_env() -> Self {
        dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .expect("DATABASE_URL must be set");

        let jwt_secret = env::var("JWT_SECRET")
            .expect("JWT_SECRET must be set");

        let jwt_expiration = parse_or("JWT_EXPIRATION", DEFAULT_JWT_EXPIRATION_SECS);

        let rust_log = env::var("RUST_LOG")
            .unwrap_or_else(|_| "info".to_string());

        let bind_addr = env::var("BIND_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let store_timeout =
            Duration::from_millis(parse_or("STORE_TIMEOUT_MS", DEFAULT_STORE_TIMEOUT_MS));

        let order_ttl = Duration::from_secs(parse_or("ORDER_TTL_SECS", DEFAULT_ORDER_TTL_SECS));

        let payment = PaymentConfig {
            base_url: env::var("PAYMENT_BASE_URL")
                .unwrap_or_else(|_| "https://sandbox.cashfree.com/pg".to_string()),
            client_id: env::var("PAYMENT_CLIENT_ID")
                .expect("PAYMENT_CLIENT_ID must be set"),
            client_secret: env::var("PAYMENT_CLIENT_SECRET")
                .expect("PAYMENT_CLIENT_SECRET must be set"),
            api_version: env::var("PAYMENT_API_VERSION")
                .unwrap_or_else(|_| "2023-08-01".to_string()),
        };

        Self {
            database_url,
            jwt_secret,
            jwt_expiration,
            rust_log,
            bind_addr,
            store_timeout,
            order_ttl,
            payment,
        }
    }
}

/// Reads a numeric variable, falling back to `default` when unset or unparsable.
fn parse_or(key: &str, default: u64) -> u64 {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("{} is not a valid number ({}), using {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}
