// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for dbsync-core E2E tests.
//!
//! Provides TestContext wiring a mock User Database, an in-memory registry
//! database and a job row together.

#![allow(dead_code)]

use std::sync::Arc;

use serde_json::{Value, json};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use dbsync_client::{ClientConfig, UserDbClient};
use dbsync_core::job::{HistoryRecord, JobParams, SqliteJobHost};
use dbsync_core::migrations;
use dbsync_core::persistence::SqlitePersonStore;
use dbsync_core::sync::{SyncOrchestrator, SyncSettings};

pub const REQUESTER: &str = "registry-test";
pub const API_KEY: &str = "test-api-key";

/// Test context that manages the mock server, database and job for E2E tests.
pub struct TestContext {
    pub server: MockServer,
    pub pool: SqlitePool,
    pub store: SqlitePersonStore,
}

impl TestContext {
    /// Create a new test context.
    ///
    /// This sets up:
    /// 1. A wiremock server standing in for the User Database
    /// 2. A migrated in-memory SQLite database
    pub async fn new() -> Self {
        let server = MockServer::start().await;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory SQLite pool");
        migrations::run_sqlite(&pool)
            .await
            .expect("Failed to run migrations");

        let store = SqlitePersonStore::new(pool.clone());

        Self {
            server,
            pool,
            store,
        }
    }

    /// Serve `profiles` for the page at `offset`/`limit`.
    pub async fn mount_page(&self, offset: u64, limit: u64, profiles: Value) {
        Mock::given(method("GET"))
            .and(path("/people"))
            .and(query_param("offset", offset.to_string()))
            .and(query_param("limit", limit.to_string()))
            .and(header("XA-REQUESTER", REQUESTER))
            .and(header("XA-API-KEY", API_KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(profiles))
            .mount(&self.server)
            .await;
    }

    /// Answer the page at `offset`/`limit` with `status`, `times` times.
    pub async fn mount_page_error(&self, offset: u64, limit: u64, status: u16, times: u64) {
        Mock::given(method("GET"))
            .and(path("/people"))
            .and(query_param("offset", offset.to_string()))
            .and(query_param("limit", limit.to_string()))
            .respond_with(ResponseTemplate::new(status))
            .up_to_n_times(times)
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Serve a single profile.
    pub async fn mount_record(&self, access_id: &str, status: u16, body: Value) {
        Mock::given(method("GET"))
            .and(path(format!("/people/{}", access_id)))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub fn client(&self) -> UserDbClient {
        UserDbClient::new(ClientConfig::new(self.server.uri(), REQUESTER, API_KEY))
            .expect("Failed to create client")
    }

    /// Create a job row and an orchestrator reporting to it.
    pub async fn job(&self, settings: &SyncSettings, params: &JobParams) -> (SqliteJobHost, SyncOrchestrator) {
        let host = SqliteJobHost::create_job(self.pool.clone(), settings.co_id, params)
            .await
            .expect("Failed to create job");
        let orchestrator = SyncOrchestrator::new(
            Arc::new(self.client()),
            Arc::new(self.store.clone()),
            Arc::new(host.clone()),
            settings.max_sleep_secs,
        );
        (host, orchestrator)
    }

    pub async fn history(&self, job_id: i64) -> Vec<HistoryRecord> {
        SqliteJobHost::history(&self.pool, job_id)
            .await
            .expect("Failed to load history")
    }

    pub async fn count(&self, table: &str) -> i64 {
        let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", table))
            .fetch_one(&self.pool)
            .await
            .expect("Failed to count rows");
        n
    }
}

/// A User Database profile as served on the wire.
pub fn profile_json(username: &str, first: &str, last: &str, organization: &str) -> Value {
    json!({
        "username": username,
        "firstName": first,
        "lastName": last,
        "email": format!("{}@example.org", username),
        "organizationName": organization,
        "isSuspended": false
    })
}
