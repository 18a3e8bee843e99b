// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Job framework integration: parameters, history and completion.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{Result, SyncError};

/// Name under which the job is registered.
pub const JOB_NAME: &str = "AccessDbsync";

/// Status of a job or of a single history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// The job row exists and the run has not finished.
    InProgress,
    /// Finished normally.
    Complete,
    /// Stopped because cancellation was requested.
    Canceled,
    /// Finished, but the work it was asked to do did not succeed.
    Failed,
}

impl JobStatus {
    /// Status as stored in the job tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "complete" => Ok(Self::Complete),
            "canceled" => Ok(Self::Canceled),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown job status '{}'", other)),
        }
    }
}

/// One job history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Page key (`offset=O&limit=L`), ACCESS ID or `Unknown ACCESS ID`.
    pub record_key: String,
    /// Human readable outcome.
    pub comment: String,
    /// Outcome status.
    pub status: JobStatus,
}

impl HistoryEntry {
    /// A failed entry.
    pub fn failed(record_key: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            record_key: record_key.into(),
            comment: comment.into(),
            status: JobStatus::Failed,
        }
    }

    /// A completed entry.
    pub fn complete(record_key: impl Into<String>, comment: impl Into<String>) -> Self {
        Self {
            record_key: record_key.into(),
            comment: comment.into(),
            status: JobStatus::Complete,
        }
    }
}

/// Callbacks into the hosting job framework.
#[async_trait]
pub trait JobHost: Send + Sync {
    /// Whether cancellation of this job has been requested.
    async fn is_canceled(&self) -> Result<bool>;

    /// Append a history entry.
    async fn record_history(&self, entry: HistoryEntry) -> Result<()>;

    /// Report the final summary and status.
    async fn finish(&self, summary: &str, status: JobStatus) -> Result<()>;
}

// ============================================================================
// Parameters
// ============================================================================

/// Parameters accepted by the job. All are optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobParams {
    /// Synchronize only this ACCESS ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_id: Option<String>,
    /// Paging limit override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Initial offset override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
    /// Stop after one page.
    #[serde(default)]
    pub one_only: bool,
}

impl JobParams {
    /// Parse raw string parameters as handed over by the job framework.
    ///
    /// Unknown keys are ignored. An empty `access_id` counts as absent.
    pub fn parse(raw: &HashMap<String, String>) -> Result<Self> {
        let mut params = Self::default();

        for (name, value) in raw {
            let value = value.trim();
            match name.as_str() {
                "access_id" => {
                    params.access_id = (!value.is_empty()).then(|| value.to_string());
                }
                "limit" => {
                    let limit = parse_u64(name, value, "must be a positive integer")?;
                    if limit == 0 {
                        return Err(invalid(name, "must be a positive integer"));
                    }
                    params.limit = Some(limit);
                }
                "offset" => {
                    params.offset = Some(parse_u64(name, value, "must be a non-negative integer")?);
                }
                "one_only" => {
                    params.one_only = parse_bool(name, value)?;
                }
                other => debug!(parameter = other, "Ignoring unknown job parameter"),
            }
        }

        Ok(params)
    }
}

fn invalid(name: &str, message: &str) -> SyncError {
    SyncError::InvalidParameter {
        name: name.to_string(),
        message: message.to_string(),
    }
}

fn parse_u64(name: &str, value: &str, message: &str) -> Result<u64> {
    value.parse::<u64>().map_err(|_| invalid(name, message))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(invalid(name, "must be true, false, 1 or 0")),
    }
}

/// Type of a job parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterType {
    /// Free text.
    String,
    /// Non-negative integer.
    Int,
    /// Boolean flag.
    Bool,
}

impl ParameterType {
    /// Lowercase type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Bool => "bool",
        }
    }
}

/// Description of one accepted job parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParameterHelp {
    /// Parameter name.
    pub name: &'static str,
    /// Help text.
    pub help: &'static str,
    /// Value type.
    #[serde(rename = "type")]
    pub param_type: ParameterType,
    /// Whether the parameter must be supplied.
    pub required: bool,
}

/// Parameters the job accepts, in display order.
pub fn parameter_format() -> Vec<ParameterHelp> {
    vec![
        ParameterHelp {
            name: "access_id",
            help: "ACCESS ID to synchronize",
            param_type: ParameterType::String,
            required: false,
        },
        ParameterHelp {
            name: "limit",
            help: "Profile paging query limit",
            param_type: ParameterType::Int,
            required: false,
        },
        ParameterHelp {
            name: "offset",
            help: "Profile paging query offset",
            param_type: ParameterType::Int,
            required: false,
        },
        ParameterHelp {
            name: "one_only",
            help: "Stop after one page",
            param_type: ParameterType::Bool,
            required: false,
        },
    ]
}

/// Jobs provided by this crate with their descriptions.
pub fn available_jobs() -> Vec<(&'static str, &'static str)> {
    vec![(JOB_NAME, "Synchronize with the ACCESS User Database")]
}

// ============================================================================
// SQLite job host
// ============================================================================

/// A job row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRecord {
    /// Database primary key.
    pub id: i64,
    /// CO the job runs for.
    pub co_id: i64,
    /// Registered job name.
    pub job_type: String,
    /// Parameters as JSON.
    pub params: String,
    /// Status as stored.
    pub status: String,
    /// Final summary, once finished.
    pub summary: Option<String>,
    /// Whether cancellation was requested.
    pub cancel_requested: bool,
    /// When the job row was created (UTC).
    pub created_at: NaiveDateTime,
    /// When the job finished (UTC).
    pub finished_at: Option<NaiveDateTime>,
}

/// A stored history entry.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct HistoryRecord {
    /// Database primary key.
    pub id: i64,
    /// Record key.
    pub record_key: String,
    /// Comment.
    pub comment: String,
    /// Status as stored.
    pub status: String,
    /// When the entry was written (UTC).
    pub created_at: NaiveDateTime,
}

/// [`JobHost`] backed by the `co_jobs` tables, bound to one job row.
#[derive(Clone)]
pub struct SqliteJobHost {
    pool: SqlitePool,
    job_id: i64,
}

impl SqliteJobHost {
    /// Insert a new in-progress job row and bind a host to it.
    pub async fn create_job(pool: SqlitePool, co_id: i64, params: &JobParams) -> Result<Self> {
        let params_json = serde_json::to_string(params)
            .map_err(|e| SyncError::persistence("serialize job parameters", e.to_string()))?;

        let result = sqlx::query(
            r#"
            INSERT INTO co_jobs (co_id, job_type, params, status)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(co_id)
        .bind(JOB_NAME)
        .bind(&params_json)
        .bind(JobStatus::InProgress.as_str())
        .execute(&pool)
        .await?;

        let job_id = result.last_insert_rowid();
        debug!(job_id = job_id, co_id = co_id, "Created job");

        Ok(Self { pool, job_id })
    }

    /// Bind a host to an existing job row.
    pub fn attach(pool: SqlitePool, job_id: i64) -> Self {
        Self { pool, job_id }
    }

    /// Id of the job this host reports for.
    pub fn job_id(&self) -> i64 {
        self.job_id
    }

    /// Flag a job for cancellation. Returns `false` if the job does not exist
    /// or has already finished.
    pub async fn request_cancel(pool: &SqlitePool, job_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE co_jobs
            SET cancel_requested = TRUE
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(job_id)
        .bind(JobStatus::InProgress.as_str())
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Load a job row.
    pub async fn job(pool: &SqlitePool, job_id: i64) -> Result<Option<JobRecord>> {
        let record = sqlx::query_as::<_, JobRecord>(
            r#"
            SELECT id, co_id, job_type, params, status, summary, cancel_requested,
                   created_at, finished_at
            FROM co_jobs
            WHERE id = ?
            "#,
        )
        .bind(job_id)
        .fetch_optional(pool)
        .await?;

        Ok(record)
    }

    /// History entries of a job in insertion order.
    pub async fn history(pool: &SqlitePool, job_id: i64) -> Result<Vec<HistoryRecord>> {
        let records = sqlx::query_as::<_, HistoryRecord>(
            r#"
            SELECT id, record_key, comment, status, created_at
            FROM co_job_history_records
            WHERE co_job_id = ?
            ORDER BY id
            "#,
        )
        .bind(job_id)
        .fetch_all(pool)
        .await?;

        Ok(records)
    }
}

#[async_trait]
impl JobHost for SqliteJobHost {
    async fn is_canceled(&self) -> Result<bool> {
        let canceled: Option<(bool,)> =
            sqlx::query_as("SELECT cancel_requested FROM co_jobs WHERE id = ?")
                .bind(self.job_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(canceled.is_some_and(|(c,)| c))
    }

    async fn record_history(&self, entry: HistoryEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO co_job_history_records (co_job_id, record_key, comment, status)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(self.job_id)
        .bind(&entry.record_key)
        .bind(&entry.comment)
        .bind(entry.status.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn finish(&self, summary: &str, status: JobStatus) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE co_jobs
            SET status = ?, summary = ?, finished_at = CURRENT_TIMESTAMP
            WHERE id = ?
            "#,
        )
        .bind(status.as_str())
        .bind(summary)
        .bind(self.job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
