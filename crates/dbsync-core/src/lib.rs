// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! dbsync Core - ACCESS User Database synchronization
//!
//! This crate keeps the registry's people in step with the ACCESS User
//! Database. It pages through the remote people listing (or looks up a single
//! ACCESS ID), creates the registry records for profiles it has not seen and
//! reconciles the ones it has.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐     ┌─────────────────────┐
//! │   SyncOrchestrator   │────►│    ProfileSource    │──► User Database (HTTP)
//! │  paging, backoff,    │     │  (dbsync-client)    │
//! │  history, cancel     │     └─────────────────────┘
//! └──────────┬───────────┘
//!            │ per profile
//!            ▼
//! ┌──────────────────────┐     ┌─────────────────────┐
//! │      reconcile       │────►│     PersonStore     │──► SQLite
//! │  mapper + decisions  │     │  (transactional)    │
//! └──────────────────────┘     └─────────────────────┘
//!            │
//!            ▼
//! ┌──────────────────────┐
//! │       JobHost        │──► co_jobs / co_job_history_records
//! └──────────────────────┘
//! ```
//!
//! # History keys
//!
//! | Key | Written when |
//! |-----|--------------|
//! | `offset=<o>&limit=<l>` | a page fetch fails, and once per processed page |
//! | `<ACCESS ID>` | a profile could not be synchronized |
//! | `Unknown ACCESS ID` | a profile without an ACCESS ID was returned |
//!
//! # Configuration
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `DBSYNC_DATABASE_URL` | Yes | - | SQLite connection string |
//! | `ACCESS_USERDB_URL` | Yes | - | User Database base URL |
//! | `ACCESS_USERDB_REQUESTER` | Yes | - | `XA-REQUESTER` header value |
//! | `ACCESS_USERDB_API_KEY` | Yes | - | `XA-API-KEY` header value |
//! | `ACCESS_USERDB_REQUEST_TIMEOUT_MS` | No | `30000` | Per-request timeout |
//! | `DBSYNC_CO_ID` | No | `1` | CO people are created in |
//! | `DBSYNC_PAGE_INITIAL_OFFSET` | No | `0` | First page offset |
//! | `DBSYNC_PAGE_LIMIT` | No | `100` | Page size |
//! | `DBSYNC_MAX_SLEEP_SECONDS` | No | `300` | Backoff cap |
//! | `DBSYNC_BOOTSTRAP` | No | `false` | Create the `accessid` identifier type |
//! | `DBSYNC_DEBUG_ONE_PAGE_ONLY` | No | `false` | Stop after one page |

#![deny(missing_docs)]

/// Configuration loaded from environment variables.
pub mod config;

/// Error types with stable error codes.
pub mod error;

/// Job parameters, history and the SQLite job host.
pub mod job;

/// Profile to registry field mapping.
pub mod mapper;

/// Embedded database migrations.
pub mod migrations;

/// Person store interface and SQLite implementation.
pub mod persistence;

/// Per-profile create-or-update logic.
pub mod reconcile;

/// Source of User Database profiles.
pub mod source;

/// Paging, retry and job orchestration.
pub mod sync;

#[cfg(test)]
mod testing;
