//! Crawl job commands

use super::{GlobalArgs, build_engine, runtime, to_json};
use crate::catalog::StartOutcome;
use crate::cli::error::CliError;
use crate::models::{JobRunStatus, JobStateChangeEvent};

/// Start a crawl job; an already running job is reported, not an error
pub fn handle_trigger_job(global: &GlobalArgs, job: &str) -> Result<(), CliError> {
    let rt = runtime()?;

    rt.block_on(async {
        let engine = build_engine(global).await?;
        match engine.reconciler().trigger(job).await? {
            StartOutcome::Started => println!("Started crawl job {}", job),
            StartOutcome::AlreadyRunning => println!("Crawl job {} is already running", job),
        }
        Ok::<_, CliError>(())
    })
}

/// Print the current state of a crawl job
pub fn handle_job_status(global: &GlobalArgs, job: &str) -> Result<(), CliError> {
    let rt = runtime()?;

    rt.block_on(async {
        let engine = build_engine(global).await?;
        let snapshot = engine
            .reconciler()
            .status(job)
            .await?
            .ok_or_else(|| CliError::InvalidArgument(format!("Crawl job '{}' not found", job)))?;
        println!("{}", to_json(&snapshot)?);
        Ok::<_, CliError>(())
    })
}

/// Complete command arguments
#[derive(Debug, Clone)]
pub struct CompleteArgs {
    pub global: GlobalArgs,
    pub job_id: String,
    pub namespace: String,
    pub table_root: String,
    pub failed: bool,
}

/// Post-process a finished crawl job and print the completion report
pub fn handle_complete(args: &CompleteArgs) -> Result<(), CliError> {
    let rt = runtime()?;

    let event = JobStateChangeEvent {
        job_id: args.job_id.clone(),
        status: if args.failed {
            JobRunStatus::Failed
        } else {
            JobRunStatus::Succeeded
        },
        namespace: args.namespace.clone(),
        table_root: args.table_root.clone(),
    };

    rt.block_on(async {
        let engine = build_engine(&args.global).await?;
        let report = engine.deduplicator().process(&event).await?;
        println!("{}", to_json(&report)?);
        Ok::<_, CliError>(())
    })
}
