//! Centralized configuration (environment variables + defaults).

use anyhow::anyhow;
use std::{env, fmt::Display, str::FromStr};
use tracing::{info, warn};

use crate::domain::query::DEFAULT_LIST_LIMIT;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` selects the in-memory document store.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub max_connections: u32,
    pub list_limit: u32,
    /// Raw `token:user_id:role` entries, comma separated.
    pub api_tokens: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = database_url();
        if database_url.is_none() {
            warn!("DATABASE_URL not set, falling back to the in-memory document store");
        }

        let list_limit: u32 = try_load("LIST_LIMIT", DEFAULT_LIST_LIMIT)?;
        if list_limit == 0 {
            return Err(anyhow!("LIST_LIMIT must be at least 1"));
        }

        Ok(Self {
            database_url,
            bind_addr: try_load("BIND_ADDR", DEFAULT_BIND_ADDR)?,
            max_connections: try_load::<u32>("DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS)?
                .max(1),
            list_limit,
            api_tokens: env::var("API_TOKENS").unwrap_or_default(),
        })
    }
}

/// Database URL. Empty or unset means "no database".
pub fn database_url() -> Option<String> {
    env::var("DATABASE_URL")
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn try_load<T>(key: &str, default: impl Display) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = match env::var(key) {
        Ok(v) if !v.trim().is_empty() => v,
        _ => {
            info!("{key} not set, using default: {default}");
            default.to_string()
        }
    };
    raw.trim().parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow!("Invalid {key} value '{raw}': {e}")
    })
}
