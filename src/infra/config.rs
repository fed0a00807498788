use std::net::SocketAddr;

use anyhow::Context;
use axum::http::HeaderValue;
use env_helpers::get_env_default;
use secrecy::SecretString;
use strum::{AsRefStr, EnumString};

/// Console output style chosen by `LOG_FORMAT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

pub struct AppConfig {
    pub database_url: SecretString,
    pub bind_addr: SocketAddr,
    pub cors_origin: HeaderValue,
    pub database_max_connections: u32,
    /// Spawn the background expiry sweep loop. Disable on all but one replica.
    pub expiry_sweep_enabled: bool,
    pub expiry_sweep_interval_secs: u64,
    pub log_format: LogFormat,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_url = SecretString::new(database_url.into());

        let bind_addr: SocketAddr = get_env_default("BIND_ADDR", String::from("127.0.0.1:8080"))
            .parse()
            .context("BIND_ADDR must be a socket address")?;
        let cors_origin: HeaderValue =
            get_env_default("CORS_ORIGIN", String::from("http://localhost:3000"))
                .parse()
                .context("CORS_ORIGIN must be a valid header value")?;
        let database_max_connections: u32 = get_env_default("DATABASE_MAX_CONNECTIONS", 5);
        let expiry_sweep_enabled: bool = get_env_default("EXPIRY_SWEEP_ENABLED", true);
        let expiry_sweep_interval_secs: u64 = get_env_default("EXPIRY_SWEEP_INTERVAL_SECS", 3600);
        let log_format: LogFormat = get_env_default("LOG_FORMAT", String::from("pretty"))
            .parse()
            .context("LOG_FORMAT must be 'pretty' or 'json'")?;

        Ok(Self {
            database_url,
            bind_addr,
            cors_origin,
            database_max_connections: database_max_connections.max(1),
            expiry_sweep_enabled,
            expiry_sweep_interval_secs: expiry_sweep_interval_secs.max(1),
            log_format,
        })
    }
}
