// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for dbsync-client.

use thiserror::Error;

/// Result type using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur when querying the User Database.
///
/// None of these are retried by the client; the caller owns retry policy.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Configuration error (missing or invalid values).
    #[error("configuration error: {0}")]
    Config(String),

    /// The request could not be sent or the response could not be received.
    #[error("transport error: {0}")]
    Transport(String),

    /// The User Database answered with something other than HTTP 200.
    #[error("unexpected status {status} from {url}")]
    UnexpectedStatus {
        /// HTTP status code returned by the server.
        status: u16,
        /// Request URL, without credentials.
        url: String,
    },

    /// The payload was not well-formed JSON of the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ClientError {
    /// Short machine-readable kind, stable across releases.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Config(_) => "CONFIG",
            Self::Transport(_) => "TRANSPORT",
            Self::UnexpectedStatus { .. } => "UNEXPECTED_STATUS",
            Self::Decode(_) => "DECODE",
        }
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::UnexpectedStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Decode(err.to_string())
    }
}
