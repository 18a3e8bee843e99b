// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Configuration for the User Database client.

use std::time::Duration;

use crate::error::{ClientError, Result};

/// Configuration for the [`UserDbClient`](crate::UserDbClient).
#[derive(Clone)]
pub struct ClientConfig {
    /// Base URL of the API, e.g. `https://allocations-api.access-ci.org/identity/profiles/v1`.
    pub base_url: String,
    /// Value sent in the `XA-REQUESTER` header.
    pub requester: String,
    /// Value sent in the `XA-API-KEY` header.
    pub api_key: String,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

// The API key must never reach the logs.
impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("base_url", &self.base_url)
            .field("requester", &self.requester)
            .field("api_key", &"<redacted>")
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl ClientConfig {
    /// Create a configuration with the default request timeout.
    pub fn new(
        base_url: impl Into<String>,
        requester: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            requester: requester.into(),
            api_key: api_key.into(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Create a configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ACCESS_USERDB_URL`: API base URL (required)
    /// - `ACCESS_USERDB_REQUESTER`: requester identity header (required)
    /// - `ACCESS_USERDB_API_KEY`: API key header (required)
    /// - `ACCESS_USERDB_REQUEST_TIMEOUT_MS`: request timeout in milliseconds (default: 30000)
    pub fn from_env() -> Result<Self> {
        let base_url = required("ACCESS_USERDB_URL")?;
        let requester = required("ACCESS_USERDB_REQUESTER")?;
        let api_key = required("ACCESS_USERDB_API_KEY")?;

        let timeout_ms: u64 = std::env::var("ACCESS_USERDB_REQUEST_TIMEOUT_MS")
            .unwrap_or_else(|_| "30000".to_string())
            .parse()
            .map_err(|_| {
                ClientError::Config(
                    "ACCESS_USERDB_REQUEST_TIMEOUT_MS must be a positive integer".to_string(),
                )
            })?;

        Ok(Self::new(base_url, requester, api_key)
            .with_request_timeout(Duration::from_millis(timeout_ms)))
    }

    /// Set the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

fn required(name: &str) -> Result<String> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ClientError::Config(format!("{} is required", name))),
    }
}
