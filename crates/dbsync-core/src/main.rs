// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! dbsync - ACCESS User Database synchronization job
//!
//! Runs the synchronization against the registry database and inspects or
//! cancels previous runs.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tracing::{error, info};

use dbsync_client::UserDbClient;
use dbsync_core::config::{self, Config};
use dbsync_core::job::{self, JobParams, JobStatus, SqliteJobHost};
use dbsync_core::migrations;
use dbsync_core::persistence::SqlitePersonStore;
use dbsync_core::sync::SyncOrchestrator;

/// Synchronize registry people with the ACCESS User Database
#[derive(Parser)]
#[command(name = "dbsync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a synchronization job
    Run {
        /// ACCESS ID to synchronize
        #[arg(long)]
        access_id: Option<String>,

        /// Profile paging query limit
        #[arg(long)]
        limit: Option<String>,

        /// Profile paging query offset
        #[arg(long)]
        offset: Option<String>,

        /// Stop after one page
        #[arg(long)]
        one_only: bool,
    },

    /// Request cancellation of a running job
    Cancel {
        /// Job id
        job_id: i64,
    },

    /// Show the history of a job
    History {
        /// Job id
        job_id: i64,
    },

    /// List the available jobs and their parameters
    Jobs,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file (from crate directory or parent directories)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("dbsync_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            access_id,
            limit,
            offset,
            one_only,
        } => {
            let mut raw = HashMap::new();
            raw.extend(access_id.map(|v| ("access_id".to_string(), v)));
            raw.extend(limit.map(|v| ("limit".to_string(), v)));
            raw.extend(offset.map(|v| ("offset".to_string(), v)));
            if one_only {
                raw.insert("one_only".to_string(), "true".to_string());
            }
            run(JobParams::parse(&raw)?).await
        }
        Commands::Cancel { job_id } => cancel(job_id).await,
        Commands::History { job_id } => history(job_id).await,
        Commands::Jobs => {
            list_jobs();
            Ok(())
        }
    }
}

async fn connect(database_url: &str) -> Result<SqlitePool> {
    info!("Connecting to database...");
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await?;

    migrations::run_sqlite(&pool).await?;
    info!("Migrations completed");

    Ok(pool)
}

async fn run(params: JobParams) -> Result<()> {
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {}", e);
        e
    })?;

    info!(
        base_url = %config.client.base_url,
        co_id = config.sync.co_id,
        limit = config.sync.limit,
        max_sleep_secs = config.sync.max_sleep_secs,
        "Configuration loaded"
    );

    let pool = connect(&config.database_url).await?;
    let client = UserDbClient::new(config.client.clone())?;
    let store = SqlitePersonStore::new(pool.clone());
    let host = SqliteJobHost::create_job(pool.clone(), config.sync.co_id, &params).await?;
    let job_id = host.job_id();

    info!(job_id = job_id, params = ?params, "Starting {}", job::JOB_NAME);

    let orchestrator = SyncOrchestrator::new(
        Arc::new(client),
        Arc::new(store),
        Arc::new(host),
        config.sync.max_sleep_secs,
    );
    let report = orchestrator.run_job(&config.sync, &params).await;

    pool.close().await;
    println!("job {}: {} ({})", job_id, report.summary(), report.status);

    if report.status == JobStatus::Failed {
        bail!("job {} failed", job_id);
    }
    Ok(())
}

async fn cancel(job_id: i64) -> Result<()> {
    let pool = connect(&config::database_url_from_env()?).await?;

    if SqliteJobHost::request_cancel(&pool, job_id).await? {
        println!("cancellation requested for job {}", job_id);
    } else {
        println!("job {} is not running", job_id);
    }

    pool.close().await;
    Ok(())
}

async fn history(job_id: i64) -> Result<()> {
    let pool = connect(&config::database_url_from_env()?).await?;

    let Some(job) = SqliteJobHost::job(&pool, job_id).await? else {
        bail!("job {} not found", job_id);
    };

    println!(
        "job {} [{}] {} started {} finished {}",
        job.id,
        job.job_type,
        job.status,
        job.created_at,
        job.finished_at
            .map(|f| f.to_string())
            .unwrap_or_else(|| "-".to_string())
    );
    if let Some(summary) = &job.summary {
        println!("{}", summary);
    }
    for record in SqliteJobHost::history(&pool, job_id).await? {
        println!(
            "{}  {:<9} {:<24} {}",
            record.created_at, record.status, record.record_key, record.comment
        );
    }

    pool.close().await;
    Ok(())
}

fn list_jobs() {
    for (name, description) in job::available_jobs() {
        println!("{}: {}", name, description);
        for param in job::parameter_format() {
            println!(
                "  {:<10} {:<7} {}",
                param.name,
                param.param_type.as_str(),
                param.help
            );
        }
    }
}
