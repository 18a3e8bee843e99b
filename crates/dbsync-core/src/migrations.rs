// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Database migrations for dbsync-core.
//!
//! The registry schema (people graph plus job tables) is embedded so that the
//! binary and the tests can set up a database without external tooling.
//!
//! # Example
//!
//! ```ignore
//! use sqlx::SqlitePool;
//! use dbsync_core::migrations;
//!
//! let pool = SqlitePool::connect("sqlite:registry.db?mode=rwc").await?;
//! migrations::run_sqlite(&pool).await?;
//! ```

use sqlx::migrate::MigrateError;

/// SQLite migrator with all registry migrations embedded.
pub static SQLITE: sqlx::migrate::Migrator = sqlx::migrate!("./migrations/sqlite");

/// Run SQLite migrations.
///
/// Applies all pending migrations to the database. Safe to call multiple times;
/// already-applied migrations are skipped.
pub async fn run_sqlite(pool: &sqlx::SqlitePool) -> Result<(), MigrateError> {
    SQLITE.run(pool).await
}
