// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Wire types returned by the User Database people API.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A person profile as returned by the User Database.
///
/// Every field is optional on the wire; unknown fields are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalProfile {
    /// ACCESS ID, the unique key issued by the User Database.
    #[serde(default)]
    pub username: Option<String>,
    /// Given name.
    #[serde(default)]
    pub first_name: Option<String>,
    /// Middle name.
    #[serde(default)]
    pub middle_name: Option<String>,
    /// Family name.
    #[serde(default)]
    pub last_name: Option<String>,
    /// Primary email address.
    #[serde(default)]
    pub email: Option<String>,
    /// Home organization.
    #[serde(default)]
    pub organization_name: Option<String>,
}

impl ExternalProfile {
    /// Create a profile carrying only a username.
    pub fn with_username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::default()
        }
    }

    /// Read one element of a people page.
    ///
    /// The rejection keeps the `username` when the element carries it as a
    /// string, so the failure can still be attributed.
    pub fn from_value(value: Value) -> PageEntry {
        let username = value
            .get("username")
            .and_then(Value::as_str)
            .map(str::to_string);

        serde_json::from_value(value).map_err(|e| MalformedProfile {
            username,
            reason: e.to_string(),
        })
    }
}

/// A page element that does not have the shape of an [`ExternalProfile`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedProfile {
    /// ACCESS ID, if the element has a string `username`.
    pub username: Option<String>,
    /// Deserialization error.
    pub reason: String,
}

/// One element of a people page, decoded independently of its neighbours.
pub type PageEntry = std::result::Result<ExternalProfile, MalformedProfile>;

/// One offset/limit window over the people listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Index of the first profile in the window.
    pub offset: u64,
    /// Maximum number of profiles returned.
    pub limit: u64,
}

impl PageRequest {
    /// Create a page request.
    pub fn new(offset: u64, limit: u64) -> Self {
        Self { offset, limit }
    }

    /// Job history key for this window.
    pub fn history_key(&self) -> String {
        format!("offset={}&limit={}", self.offset, self.limit)
    }

    /// The window immediately following this one.
    pub fn next(&self) -> Self {
        Self {
            offset: self.offset + self.limit,
            limit: self.limit,
        }
    }
}
