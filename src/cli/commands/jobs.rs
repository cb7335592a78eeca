//! Job listing, detail and pause commands.

use super::open_records;
use crate::cli::{JobsAction, Output};
use crate::config::Settings;
use crate::jobs::JobTracker;
use anyhow::Result;
use console::style;

/// Log lines shown by `jobs show`.
const SHOWN_LOG_LINES: usize = 20;

/// Run the jobs command.
pub async fn run_jobs(action: Option<&JobsAction>, settings: Settings) -> Result<()> {
    let tracker = JobTracker::new(open_records(&settings)?);

    match action {
        None => {
            let jobs = tracker.list().await?;
            if jobs.is_empty() {
                Output::info("No jobs yet. Start one with: harvest run <channel>");
                return Ok(());
            }
            Output::header(&format!("Jobs ({})", jobs.len()));
            for job in &jobs {
                Output::job_line(job);
            }
        }

        Some(JobsAction::Show { job_id }) => {
            let id = tracker.resolve_id(job_id).await?;
            let job = tracker.get(id).await?;

            Output::header(job.channel_name.as_deref().unwrap_or(&job.channel_url));
            Output::kv("Id", &job.id.to_string());
            Output::kv("Status", &job.status.to_string());
            Output::kv("Channel", &job.channel_url);
            Output::kv("Strategy", &job.strategy.to_string());
            Output::kv("Categories", &job.categories.join(", "));
            Output::kv(
                "Progress",
                &format!(
                    "{}/{} ({} processed, {} skipped)",
                    job.current_video_index,
                    job.videos_to_process,
                    job.videos_processed,
                    job.videos_skipped
                ),
            );
            Output::kv(
                "Insights",
                &format!(
                    "{} found, {} filtered, {} duplicates",
                    job.insights_found, job.insights_filtered, job.insights_duplicated
                ),
            );
            Output::kv("Created", &job.created_at.to_rfc3339());
            if let Some(done) = job.completed_at {
                Output::kv("Finished", &done.to_rfc3339());
            }

            if !job.errors.is_empty() {
                Output::header("Errors");
                for error in &job.errors {
                    Output::list_item(&format!("{}: {}", error.video_id, error.message));
                }
            }

            Output::header("Recent log");
            let skip = job.logs.len().saturating_sub(SHOWN_LOG_LINES);
            for entry in &job.logs[skip..] {
                println!(
                    "  {} {}",
                    style(entry.at.format("%H:%M:%S")).dim(),
                    entry.message
                );
            }
        }
    }

    Ok(())
}

/// Run the pause command.
pub async fn run_pause(job_id: &str, settings: Settings) -> Result<()> {
    let tracker = JobTracker::new(open_records(&settings)?);
    let id = tracker.resolve_id(job_id).await?;
    let job = tracker.pause(id).await?;
    Output::success(&format!(
        "Pause requested at video {}/{}. The runner stops before its next video.",
        job.current_video_index, job.videos_to_process
    ));
    Ok(())
}
