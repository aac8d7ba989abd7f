use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use ingest_monitor::cli::{ConsoleSink, console};
use ingest_monitor::config::ClientConfig;
use ingest_monitor::context::AppContext;
use ingest_monitor::core::models::collection_name_for;
use ingest_monitor::core::{
    IngestTarget, JobMonitor, MonitorPhase, ResumeOutcome, TerminalState,
};
use ingest_monitor::logging::{self, LogConfig};
use serde::Serialize;
use tracing::warn;

#[derive(Parser)]
#[command(name = "ingest-monitor")]
#[command(about = "Submit ingestion jobs and follow them to completion", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ./ingest-monitor.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: ConfigArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit URLs for ingestion and follow the job
    Submit(SubmitArgs),
    /// Resume following the job stored by a previous run
    Resume,
    /// Print the status of a job once
    Status { job_id: String },
    /// List active jobs, or recent ones when none are active
    Jobs {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[derive(Args)]
struct SubmitArgs {
    #[arg(required = true)]
    urls: Vec<String>,

    /// Destination collection (derived from the URL's host when omitted)
    #[arg(long)]
    collection: Option<String>,
}

#[derive(Args, Serialize)]
struct ConfigArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    api_base: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    poll_interval_secs: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    verbose: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long, global = true)]
    json_logs: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ClientConfig::load(cli.config.as_deref(), None::<&ConfigArgs>)?
        .reconfigure(&cli.overrides)?;

    logging::init(LogConfig {
        json: config.json_logs,
        verbose: config.verbose,
    });

    let ctx = AppContext::new(config).context("Failed to initialize client")?;

    match cli.command {
        Commands::Submit(args) => run_submit(&ctx, args).await.context("Submission failed")?,
        Commands::Resume => run_resume(&ctx).await.context("Failed to resume job")?,
        Commands::Status { job_id } => run_status(&ctx, &job_id)
            .await
            .context("Failed to fetch job status")?,
        Commands::Jobs { limit } => run_jobs(&ctx, limit)
            .await
            .context("Failed to list jobs")?,
    }

    Ok(())
}

fn target_from(args: SubmitArgs) -> IngestTarget {
    let SubmitArgs { urls, collection } = args;
    if let [url] = urls.as_slice() {
        return match collection {
            Some(collection) => IngestTarget::url(collection, url.as_str()),
            None => IngestTarget::site(url),
        };
    }

    let collection = collection
        .or_else(|| urls.first().map(|u| collection_name_for(u)))
        .unwrap_or_default();
    IngestTarget::urls(collection, urls)
}

async fn run_submit(ctx: &AppContext, args: SubmitArgs) -> Result<()> {
    let monitor = ctx.monitor(Arc::new(ConsoleSink));
    monitor.submit(target_from(args)).await?;
    follow(&monitor).await
}

async fn run_resume(ctx: &AppContext) -> Result<()> {
    let monitor = ctx.monitor(Arc::new(ConsoleSink));
    match monitor.resume().await {
        ResumeOutcome::Resumed { .. } => follow(&monitor).await,
        ResumeOutcome::NothingStored => {
            println!("No stored job to resume.");
            Ok(())
        }
        ResumeOutcome::Discarded { job_id } | ResumeOutcome::Skipped { job_id } => {
            println!("Stored job {job_id} is no longer running.");
            Ok(())
        }
    }
}

/// Wait until the monitor stops tracking a job. Ctrl-C detaches instead, so
/// the job can be resumed by a later run.
async fn follow(monitor: &JobMonitor) -> Result<()> {
    let mut phases = monitor.phases();

    tokio::select! {
        settled = phases.wait_for(|phase| !phase.is_busy()) => {
            let phase = settled.context("Monitor went away")?.clone();
            if phase == MonitorPhase::Terminal(TerminalState::Failed) {
                anyhow::bail!("Ingestion job failed");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted, detaching from job");
            monitor.detach();
        }
    }

    Ok(())
}

async fn run_status(ctx: &AppContext, job_id: &str) -> Result<()> {
    let report = ctx.api.status(job_id).await?;
    println!("{}", console::format_report(job_id, &report));
    Ok(())
}

async fn run_jobs(ctx: &AppContext, limit: u32) -> Result<()> {
    let jobs = match ctx.api.active_jobs().await {
        Ok(active) if !active.is_empty() => active,
        Ok(_) => ctx.api.recent_jobs(limit).await?,
        Err(e) => {
            warn!(error = %e, "Active jobs unavailable, listing recent jobs");
            ctx.api.recent_jobs(limit).await?
        }
    };

    println!("{}", console::format_jobs(&jobs));
    Ok(())
}
