// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! UserDbClient for querying the ACCESS User Database.

use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use urlencoding::encode;

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::types::{ExternalProfile, PageEntry, PageRequest};

/// Header carrying the requester identity.
pub const REQUESTER_HEADER: &str = "XA-REQUESTER";

/// Header carrying the API key.
pub const API_KEY_HEADER: &str = "XA-API-KEY";

/// Client for the User Database people API.
///
/// Each call issues exactly one GET. Failures are returned to the caller
/// classified as [`ClientError::Transport`], [`ClientError::UnexpectedStatus`]
/// or [`ClientError::Decode`]; nothing is retried here.
#[derive(Debug, Clone)]
pub struct UserDbClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl UserDbClient {
    /// Create a client with the given configuration.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();

        let requester = HeaderValue::from_str(&config.requester).map_err(|_| {
            ClientError::Config(format!("invalid {} header value", REQUESTER_HEADER))
        })?;
        headers.insert(REQUESTER_HEADER, requester);

        let mut api_key = HeaderValue::from_str(&config.api_key).map_err(|_| {
            ClientError::Config(format!("invalid {} header value", API_KEY_HEADER))
        })?;
        api_key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, api_key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ClientError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    /// Get the client configuration.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Fetch one page of profiles. An empty list means the listing is exhausted.
    ///
    /// The body must be a JSON array, otherwise the whole page is a
    /// [`ClientError::Decode`]. Elements are decoded one by one, so a single
    /// malformed profile comes back as an `Err` entry next to its neighbours.
    #[instrument(skip(self), fields(offset = page.offset, limit = page.limit))]
    pub async fn fetch_page(&self, page: PageRequest) -> Result<Vec<PageEntry>> {
        let url = format!(
            "{}/people?limit={}&offset={}",
            self.config.base_url, page.limit, page.offset
        );

        let elements: Vec<serde_json::Value> = self.get_json(&url).await?;
        let entries: Vec<PageEntry> = elements
            .into_iter()
            .map(ExternalProfile::from_value)
            .collect();

        debug!(
            count = entries.len(),
            malformed = entries.iter().filter(|e| e.is_err()).count(),
            "Fetched profile page"
        );
        Ok(entries)
    }

    /// Fetch the profile for a single ACCESS ID.
    #[instrument(skip(self))]
    pub async fn fetch_one(&self, username: &str) -> Result<ExternalProfile> {
        let url = format!("{}/people/{}", self.config.base_url, encode(username));
        self.get_json(&url).await
    }

    // =========================================================================
    // Internal helpers
    // =========================================================================

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("GET {} failed: {}", url, e)))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ClientError::UnexpectedStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ClientError::Transport(format!("failed to read body: {}", e)))?;

        serde_json::from_str(&body).map_err(ClientError::from)
    }
}
