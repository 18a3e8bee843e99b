// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Synchronization orchestrator.
//!
//! Drives either a full scan over the User Database (page by page) or a single
//! record lookup, reconciles every profile and records the outcome through the
//! [`JobHost`].
//!
//! # Full scan
//!
//! ```text
//! loop:
//!   canceled?            → stop (Canceled)
//!   fetch offset/limit
//!     error              → history(Failed), failed += 1, sleep backoff, retry
//!     empty              → stop (Complete)
//!     profiles           → reconcile each (malformed ones count as failures),
//!                          history per failure + page summary
//!                          reset backoff if anything succeeded, offset += limit
//!                          stop after one page when asked to
//! ```
//!
//! Work is strictly sequential; the only suspension points are the HTTP calls,
//! the store calls and the backoff sleep.

use std::sync::Arc;
use std::time::Duration;

use dbsync_client::{ExternalProfile, MalformedProfile, PageEntry, PageRequest};
use tracing::{error, info, instrument, warn};

use crate::error::SyncError;
use crate::job::{HistoryEntry, JobHost, JobParams, JobStatus};
use crate::persistence::{IDENTIFIER_TYPE_ACCESS_ID, PersonStore};
use crate::reconcile::{ReconcileOutcome, reconcile};
use crate::source::ProfileSource;

/// History key used for profiles without an ACCESS ID.
pub const UNKNOWN_ACCESS_ID_KEY: &str = "Unknown ACCESS ID";

/// Display name of the bootstrapped identifier type.
pub const ACCESS_ID_DISPLAY_NAME: &str = "ACCESS ID";

/// Doubling backoff between failed page fetches, in whole seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    current_secs: u64,
    max_secs: u64,
}

impl Backoff {
    /// Start at one second, never exceeding `max_secs` (at least one second).
    pub fn new(max_secs: u64) -> Self {
        Self {
            current_secs: 1,
            max_secs: max_secs.max(1),
        }
    }

    /// The delay the next failure will sleep for.
    pub fn current(&self) -> Duration {
        Duration::from_secs(self.current_secs)
    }

    /// Return the delay to sleep now and double the next one.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current();
        self.current_secs = self.current_secs.saturating_mul(2).min(self.max_secs);
        delay
    }

    /// Back to one second.
    pub fn reset(&mut self) {
        self.current_secs = 1;
    }
}

/// Settings the job runs with, usually from [`crate::config::Config`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// CO people are created in.
    pub co_id: i64,
    /// Offset the scan starts at.
    pub initial_offset: u64,
    /// Page size.
    pub limit: u64,
    /// Backoff cap in seconds.
    pub max_sleep_secs: u64,
    /// Ensure the `accessid` identifier type exists before running.
    pub bootstrap: bool,
    /// Stop after the first page.
    pub one_page_only: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            co_id: 1,
            initial_offset: 0,
            limit: 100,
            max_sleep_secs: 300,
            bootstrap: false,
            one_page_only: false,
        }
    }
}

/// What to synchronize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncMode {
    /// Page through every profile.
    FullScan {
        /// First page.
        start: PageRequest,
        /// Stop after the first successful page.
        one_only: bool,
    },
    /// Look up a single profile.
    SingleRecord {
        /// ACCESS ID to synchronize.
        access_id: String,
    },
}

/// One invocation of the job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncRequest {
    /// CO people are created in.
    pub co_id: i64,
    /// What to synchronize.
    pub mode: SyncMode,
}

impl SyncRequest {
    /// Combine configured defaults with the job's parameters.
    pub fn new(settings: &SyncSettings, params: &JobParams) -> Self {
        let mode = match &params.access_id {
            Some(access_id) => SyncMode::SingleRecord {
                access_id: access_id.clone(),
            },
            None => SyncMode::FullScan {
                start: PageRequest::new(
                    params.offset.unwrap_or(settings.initial_offset),
                    params.limit.unwrap_or(settings.limit),
                ),
                one_only: params.one_only || settings.one_page_only,
            },
        };

        Self {
            co_id: settings.co_id,
            mode,
        }
    }
}

/// Result of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Profiles created or reconciled.
    pub synchronized: u64,
    /// Page and record failures.
    pub failed: u64,
    /// Final status.
    pub status: JobStatus,
}

impl SyncReport {
    /// Summary reported to the job framework.
    pub fn summary(&self) -> String {
        format!(
            "Successfully synchronized {} records and recorded {} failures",
            self.synchronized, self.failed
        )
    }
}

/// History key for a profile.
fn record_key(username: Option<&str>) -> String {
    username
        .filter(|k| !k.is_empty())
        .unwrap_or(UNKNOWN_ACCESS_ID_KEY)
        .to_string()
}

/// Drives a synchronization run.
#[derive(Clone)]
pub struct SyncOrchestrator {
    source: Arc<dyn ProfileSource>,
    store: Arc<dyn PersonStore>,
    host: Arc<dyn JobHost>,
    max_sleep_secs: u64,
}

impl SyncOrchestrator {
    /// Create a new orchestrator.
    pub fn new(
        source: Arc<dyn ProfileSource>,
        store: Arc<dyn PersonStore>,
        host: Arc<dyn JobHost>,
        max_sleep_secs: u64,
    ) -> Self {
        Self {
            source,
            store,
            host,
            max_sleep_secs,
        }
    }

    /// Run the job: optional bootstrap, the synchronization itself and the
    /// completion report.
    ///
    /// A failed completion report is logged; the run's result is returned
    /// regardless.
    pub async fn run_job(&self, settings: &SyncSettings, params: &JobParams) -> SyncReport {
        if settings.bootstrap {
            self.bootstrap(settings.co_id).await;
        }

        let request = SyncRequest::new(settings, params);
        let report = self.run(&request).await;
        let summary = report.summary();

        info!(
            synchronized = report.synchronized,
            failed = report.failed,
            status = %report.status,
            "{}",
            summary
        );
        if let Err(e) = self.host.finish(&summary, report.status).await {
            error!(
                error_code = e.error_code(),
                status = %report.status,
                "Could not record job completion: {}",
                e
            );
        }

        report
    }

    /// Make sure the `accessid` identifier type exists. Failures are logged.
    pub async fn bootstrap(&self, co_id: i64) {
        match self
            .store
            .ensure_identifier_type(co_id, IDENTIFIER_TYPE_ACCESS_ID, ACCESS_ID_DISPLAY_NAME)
            .await
        {
            Ok(true) => info!(co_id = co_id, "Created identifier type {}", IDENTIFIER_TYPE_ACCESS_ID),
            Ok(false) => info!(co_id = co_id, "Identifier type {} already exists", IDENTIFIER_TYPE_ACCESS_ID),
            Err(e) => error!(
                co_id = co_id,
                error_code = e.error_code(),
                "Could not bootstrap identifier type {}: {}",
                IDENTIFIER_TYPE_ACCESS_ID,
                e
            ),
        }
    }

    /// Run one request.
    pub async fn run(&self, request: &SyncRequest) -> SyncReport {
        match &request.mode {
            SyncMode::FullScan { start, one_only } => {
                self.full_scan(request.co_id, *start, *one_only).await
            }
            SyncMode::SingleRecord { access_id } => {
                self.single_record(request.co_id, access_id).await
            }
        }
    }

    #[instrument(skip(self))]
    async fn full_scan(&self, co_id: i64, start: PageRequest, one_only: bool) -> SyncReport {
        let mut page = start;
        let mut backoff = Backoff::new(self.max_sleep_secs);
        let mut synchronized = 0;
        let mut failed = 0;

        loop {
            if self.canceled().await {
                info!(offset = page.offset, limit = page.limit, "Job canceled");
                return SyncReport {
                    synchronized,
                    failed,
                    status: JobStatus::Canceled,
                };
            }

            let entries = match self.source.fetch_page(page).await {
                Ok(entries) => entries,
                Err(e) => {
                    failed += 1;
                    let delay = backoff.next_delay();
                    warn!(
                        offset = page.offset,
                        limit = page.limit,
                        error_code = e.error_code(),
                        sleep_secs = delay.as_secs(),
                        "Page fetch failed: {}",
                        e
                    );
                    self.record(HistoryEntry::failed(page.history_key(), e.to_string()))
                        .await;
                    tokio::time::sleep(delay).await;
                    continue;
                }
            };

            if entries.is_empty() {
                info!(offset = page.offset, "No more profiles");
                break;
            }

            let (page_synchronized, page_failed) = self.sync_page(co_id, &entries).await;
            synchronized += page_synchronized;
            failed += page_failed;

            self.record(HistoryEntry::complete(
                page.history_key(),
                format!(
                    "Synchronized {} users starting with offset {}, recorded {} successes and {} failures",
                    page.limit, page.offset, page_synchronized, page_failed
                ),
            ))
            .await;
            info!(
                offset = page.offset,
                limit = page.limit,
                synchronized = page_synchronized,
                failed = page_failed,
                "Page synchronized"
            );

            if page_synchronized > 0 {
                backoff.reset();
            }

            page = page.next();

            if one_only {
                break;
            }
        }

        SyncReport {
            synchronized,
            failed,
            status: JobStatus::Complete,
        }
    }

    async fn sync_page(&self, co_id: i64, entries: &[PageEntry]) -> (u64, u64) {
        let mut synchronized = 0;
        let mut failed = 0;

        for entry in entries {
            let profile: &ExternalProfile = match entry {
                Ok(profile) => profile,
                Err(MalformedProfile { username, reason }) => {
                    failed += 1;
                    let err = SyncError::Decode {
                        details: reason.clone(),
                    };
                    self.record_failure(record_key(username.as_deref()), &err)
                        .await;
                    continue;
                }
            };

            match reconcile(self.store.as_ref(), co_id, profile).await {
                Ok(ReconcileOutcome::Skipped) => {}
                Ok(_) => synchronized += 1,
                Err(e) => {
                    failed += 1;
                    self.record_failure(record_key(profile.username.as_deref()), &e)
                        .await;
                }
            }
        }

        (synchronized, failed)
    }

    #[instrument(skip(self))]
    async fn single_record(&self, co_id: i64, access_id: &str) -> SyncReport {
        let failed = SyncReport {
            synchronized: 0,
            failed: 1,
            status: JobStatus::Failed,
        };

        let profile = match self.source.fetch_one(access_id).await {
            Ok(profile) => profile,
            Err(e) => {
                self.record_failure(access_id.to_string(), &e).await;
                return failed;
            }
        };

        match reconcile(self.store.as_ref(), co_id, &profile).await {
            Ok(ReconcileOutcome::Skipped) => SyncReport {
                synchronized: 0,
                failed: 0,
                status: JobStatus::Complete,
            },
            Ok(_) => SyncReport {
                synchronized: 1,
                failed: 0,
                status: JobStatus::Complete,
            },
            Err(e) => {
                self.record_failure(access_id.to_string(), &e).await;
                failed
            }
        }
    }

    async fn record_failure(&self, key: String, err: &SyncError) {
        warn!(
            access_id = %key,
            error_code = err.error_code(),
            "Could not synchronize profile: {}",
            err
        );
        self.record(HistoryEntry::failed(key, err.to_string())).await;
    }

    async fn record(&self, entry: HistoryEntry) {
        if let Err(e) = self.host.record_history(entry).await {
            error!(error_code = e.error_code(), "Could not record job history: {}", e);
        }
    }

    async fn canceled(&self) -> bool {
        match self.host.is_canceled().await {
            Ok(canceled) => canceled,
            Err(e) => {
                warn!(error_code = e.error_code(), "Could not check for cancellation: {}", e);
                false
            }
        }
    }
}
