//! Run and resume commands.

use crate::cli::output::short_id;
use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::jobs::{JobStatus, ProcessingJob};
use crate::orchestrator::{Orchestrator, RunOptions};
use anyhow::Result;
use indicatif::ProgressBar;
use std::sync::Arc;

fn preflight() -> Result<()> {
    if let Err(e) = preflight::check(Operation::Extract) {
        Output::error(&format!("{}", e));
        Output::info("Run 'harvest doctor' for detailed diagnostics.");
        return Err(e.into());
    }
    Ok(())
}

/// Orchestrator whose progress hook drives a progress bar.
fn orchestrator_with_progress(settings: Settings) -> Result<(Orchestrator, ProgressBar)> {
    let pb = Output::progress_bar(0, "Starting");
    let hook_pb = pb.clone();
    let orchestrator = Orchestrator::new(settings)?.with_progress(Arc::new(
        move |job: &ProcessingJob, step: &str| {
            hook_pb.set_length(job.videos_to_process as u64);
            hook_pb.set_position(job.current_video_index as u64);
            hook_pb.set_message(step.to_string());
        },
    ));
    Ok((orchestrator, pb))
}

fn summarize(job: &ProcessingJob) {
    Output::kv("Job", &job.id.to_string());
    Output::kv("Channel", job.channel_name.as_deref().unwrap_or(&job.channel_url));
    Output::kv(
        "Videos",
        &format!(
            "{} processed, {} skipped of {}",
            job.videos_processed, job.videos_skipped, job.videos_to_process
        ),
    );
    Output::kv(
        "Insights",
        &format!(
            "{} queued, {} below floor, {} duplicates",
            job.insights_found, job.insights_filtered, job.insights_duplicated
        ),
    );
    if !job.errors.is_empty() {
        Output::kv("Errors", &job.errors.len().to_string());
    }

    match job.status {
        JobStatus::Completed if job.insights_found > 0 => {
            Output::success("Job completed. Review with: harvest review list")
        }
        JobStatus::Completed => Output::success("Job completed with no new insights."),
        JobStatus::Paused => Output::warning(&format!(
            "Job paused. Continue with: harvest resume {}",
            short_id(&job.id.to_string())
        )),
        _ => Output::warning(&format!("Job ended as {}", job.status)),
    }
}

/// Run the run command.
pub async fn run_job(channel_url: &str, run: RunOptions, settings: Settings) -> Result<()> {
    preflight()?;
    Output::info(&format!("Harvesting: {}", channel_url));

    let (orchestrator, pb) = orchestrator_with_progress(settings)?;
    let result = orchestrator.start_job(channel_url, &run).await;
    pb.finish_and_clear();

    match result {
        Ok(job) => {
            summarize(&job);
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Job failed: {}", e));
            Err(e.into())
        }
    }
}

/// Run the resume command.
pub async fn run_resume(job_id: &str, settings: Settings) -> Result<()> {
    preflight()?;

    let (orchestrator, pb) = orchestrator_with_progress(settings)?;
    let id = orchestrator.jobs().resolve_id(job_id).await?;
    Output::info(&format!("Resuming job {}", short_id(&id.to_string())));

    let result = orchestrator.resume_job(id).await;
    pb.finish_and_clear();

    match result {
        Ok(job) => {
            summarize(&job);
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Resume failed: {}", e));
            Err(e.into())
        }
    }
}
