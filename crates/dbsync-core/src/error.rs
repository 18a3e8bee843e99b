// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for dbsync-core.
//!
//! Provides a unified error type whose `Display` text is what ends up in job
//! history comments.

use dbsync_client::ClientError;
use std::fmt;

/// Result type using SyncError
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors that can occur while synchronizing profiles.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncError {
    /// The User Database could not be reached or the response was cut short.
    Transport {
        /// Error details.
        details: String,
    },

    /// The User Database answered with a non-200 status.
    UnexpectedStatus {
        /// HTTP status code.
        status: u16,
    },

    /// The User Database payload was not well-formed.
    Decode {
        /// Error details.
        details: String,
    },

    /// The profile carries no ACCESS ID.
    MissingKey,

    /// A write or read against the person store failed.
    Persistence {
        /// The operation that failed.
        operation: String,
        /// Validation or database error details.
        details: String,
    },

    /// A job parameter could not be parsed.
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// What is wrong with it.
        message: String,
    },
}

impl SyncError {
    /// Shorthand for a persistence failure.
    pub fn persistence(operation: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Persistence {
            operation: operation.into(),
            details: details.into(),
        }
    }

    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::UnexpectedStatus { .. } => "UNEXPECTED_STATUS",
            Self::Decode { .. } => "DECODE_ERROR",
            Self::MissingKey => "MISSING_KEY",
            Self::Persistence { .. } => "PERSISTENCE_ERROR",
            Self::InvalidParameter { .. } => "INVALID_PARAMETER",
        }
    }
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport { details } => {
                write!(f, "Unable to query ACCESS User Database: {}", details)
            }
            Self::UnexpectedStatus { status } => {
                write!(f, "Query to ACCESS User Database returned code {}", status)
            }
            Self::Decode { details } => {
                write!(f, "Error decoding JSON from User Database: {}", details)
            }
            Self::MissingKey => write!(f, "Profile does not carry an ACCESS ID"),
            Self::Persistence { operation, details } => {
                write!(f, "Could not {}: {}", operation, details)
            }
            Self::InvalidParameter { name, message } => {
                write!(f, "Invalid job parameter '{}': {}", name, message)
            }
        }
    }
}

impl std::error::Error for SyncError {}

impl From<ClientError> for SyncError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::UnexpectedStatus { status, .. } => SyncError::UnexpectedStatus { status },
            ClientError::Decode(details) => SyncError::Decode { details },
            ClientError::Transport(details) | ClientError::Config(details) => {
                SyncError::Transport { details }
            }
        }
    }
}

impl From<sqlx::Error> for SyncError {
    fn from(err: sqlx::Error) -> Self {
        SyncError::Persistence {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for SyncError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        SyncError::Persistence {
            operation: "migrate".to_string(),
            details: err.to_string(),
        }
    }
}
