// src/config.rs
use std::{env, fmt::Display, net::SocketAddr, str::FromStr};

use tracing::{info, warn};

use crate::error::AppError;

pub struct Config {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub max_connections: u32,
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn load() -> Result<Self, AppError> {
        Ok(Self {
            database_url: try_load("DATABASE_URL", "sqlite://polls.db")?,
            host: try_load("HOST", "0.0.0.0")?,
            port: try_load("PORT", "3030")?,
            max_connections: try_load("DB_MAX_CONNECTIONS", "5")?,
            cors_origin: env::var("CORS_ORIGIN").ok(),
        })
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST/PORT pair: {e}")))
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T, AppError>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        AppError::Config(format!("invalid {key} value {raw:?}: {e}"))
    })
}
