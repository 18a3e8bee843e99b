// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! ACCESS User Database client
//!
//! Thin async client for the User Database people API used by the registry
//! synchronization job.
//!
//! # Endpoints
//!
//! | Call | Request |
//! |------|---------|
//! | [`UserDbClient::fetch_page`] | `GET <base>/people?limit=<n>&offset=<n>` → JSON array |
//! | [`UserDbClient::fetch_one`] | `GET <base>/people/<username>` → JSON object |
//!
//! Both requests carry the `XA-REQUESTER` and `XA-API-KEY` headers.
//!
//! # Example
//!
//! ```no_run
//! use dbsync_client::{ClientConfig, PageRequest, UserDbClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = UserDbClient::new(ClientConfig::new(
//!     "https://userdb.example.org/v1",
//!     "registry",
//!     "api-key",
//! ))?;
//!
//! let page = client.fetch_page(PageRequest::new(0, 100)).await?;
//! println!("fetched {} profiles", page.len());
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod error;
mod types;

pub use client::{API_KEY_HEADER, REQUESTER_HEADER, UserDbClient};
pub use config::ClientConfig;
pub use error::{ClientError, Result};
pub use types::{ExternalProfile, MalformedProfile, PageEntry, PageRequest};
