// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration loading from environment variables.

use dbsync_client::{ClientConfig, ClientError};

use crate::sync::SyncSettings;

/// dbsync configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite connection URL of the registry database
    pub database_url: String,
    /// User Database client settings
    pub client: ClientConfig,
    /// Paging, backoff and bootstrap settings
    pub sync: SyncSettings,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required:
    /// - `DBSYNC_DATABASE_URL`: SQLite connection string
    /// - `ACCESS_USERDB_URL`, `ACCESS_USERDB_REQUESTER`, `ACCESS_USERDB_API_KEY`
    ///
    /// Optional (with defaults):
    /// - `ACCESS_USERDB_REQUEST_TIMEOUT_MS` (default: 30000)
    /// - `DBSYNC_CO_ID`: CO to synchronize into (default: 1)
    /// - `DBSYNC_PAGE_INITIAL_OFFSET` (default: 0)
    /// - `DBSYNC_PAGE_LIMIT` (default: 100)
    /// - `DBSYNC_MAX_SLEEP_SECONDS`: backoff cap (default: 300)
    /// - `DBSYNC_BOOTSTRAP`: create the `accessid` identifier type (default: false)
    /// - `DBSYNC_DEBUG_ONE_PAGE_ONLY`: stop after the first page (default: false)
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url = database_url_from_env()?;

        let client = ClientConfig::from_env()?;

        let co_id: i64 = std::env::var("DBSYNC_CO_ID")
            .unwrap_or_else(|_| "1".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("DBSYNC_CO_ID", "must be an integer"))?;

        let initial_offset: u64 = std::env::var("DBSYNC_PAGE_INITIAL_OFFSET")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::Invalid("DBSYNC_PAGE_INITIAL_OFFSET", "must be a non-negative integer")
            })?;

        let limit = positive("DBSYNC_PAGE_LIMIT", "100")?;
        let max_sleep_secs = positive("DBSYNC_MAX_SLEEP_SECONDS", "300")?;
        let bootstrap = flag("DBSYNC_BOOTSTRAP")?;
        let one_page_only = flag("DBSYNC_DEBUG_ONE_PAGE_ONLY")?;

        Ok(Self {
            database_url,
            client,
            sync: SyncSettings {
                co_id,
                initial_offset,
                limit,
                max_sleep_secs,
                bootstrap,
                one_page_only,
            },
        })
    }
}

/// Only the database URL, for commands that never reach the User Database.
pub fn database_url_from_env() -> Result<String, ConfigError> {
    std::env::var("DBSYNC_DATABASE_URL").map_err(|_| ConfigError::Missing("DBSYNC_DATABASE_URL"))
}

fn positive(name: &'static str, default: &str) -> Result<u64, ConfigError> {
    std::env::var(name)
        .unwrap_or_else(|_| default.to_string())
        .parse::<u64>()
        .ok()
        .filter(|v| *v > 0)
        .ok_or(ConfigError::Invalid(name, "must be a positive integer"))
}

fn flag(name: &'static str) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Err(_) => Ok(false),
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "" | "0" | "false" => Ok(false),
            "1" | "true" => Ok(true),
            _ => Err(ConfigError::Invalid(name, "must be true, false, 1 or 0")),
        },
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A required environment variable is missing.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// An environment variable has an invalid value.
    #[error("invalid value for {0}: {1}")]
    Invalid(&'static str, &'static str),

    /// The User Database client settings are incomplete.
    #[error(transparent)]
    Client(#[from] ClientError),
}
