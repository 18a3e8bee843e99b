// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Where profiles come from.

use async_trait::async_trait;
use dbsync_client::{ExternalProfile, PageEntry, PageRequest, UserDbClient};

use crate::error::SyncError;

/// Remote source of User Database profiles. Implementations do not retry.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Fetch one page. An empty page means there is no more data.
    ///
    /// Each element is decoded on its own; a malformed one is an `Err` entry
    /// and does not fail the page.
    async fn fetch_page(&self, page: PageRequest) -> Result<Vec<PageEntry>, SyncError>;

    /// Fetch a single profile by ACCESS ID.
    async fn fetch_one(&self, external_key: &str) -> Result<ExternalProfile, SyncError>;
}

#[async_trait]
impl ProfileSource for UserDbClient {
    async fn fetch_page(&self, page: PageRequest) -> Result<Vec<PageEntry>, SyncError> {
        Ok(UserDbClient::fetch_page(self, page).await?)
    }

    async fn fetch_one(&self, external_key: &str) -> Result<ExternalProfile, SyncError> {
        Ok(UserDbClient::fetch_one(self, external_key).await?)
    }
}
