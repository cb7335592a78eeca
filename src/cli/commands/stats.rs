//! Stats command implementation.

use super::open_records;
use crate::cli::Output;
use crate::config::Settings;
use crate::jobs::{JobStatus, JobTracker, ProcessedVideos};
use crate::review::{PendingFilter, ReviewQueue};
use anyhow::Result;

/// Run the stats command.
pub async fn run_stats(settings: Settings) -> Result<()> {
    let records = open_records(&settings)?;
    let queue = ReviewQueue::new(records.clone());
    let stats = queue.stats().await?;
    let pending = queue.pending(&PendingFilter::default()).await?;
    let jobs = JobTracker::new(records.clone()).list().await?;
    let processed = ProcessedVideos::new(records).all().await?;

    Output::header("Extraction");
    Output::kv("Candidates", &stats.total_candidates.to_string());
    Output::kv("Accepted", &stats.accepted.to_string());
    Output::kv("Flagged for review", &stats.flagged.to_string());
    Output::kv("Below floor", &stats.rejected_low_quality.to_string());
    Output::kv("Duplicates", &stats.duplicates.to_string());
    Output::kv("Malformed", &stats.malformed.to_string());
    if stats.accepted > 0 {
        Output::kv(
            "Average scores",
            &format!(
                "quality {:.1}, specificity {:.1}, safety {:.1}, confidence {:.2}",
                stats.avg_quality, stats.avg_specificity, stats.avg_safety, stats.avg_confidence
            ),
        );
    }

    Output::header("Review");
    Output::kv("Pending", &pending.len().to_string());
    Output::kv("Approved", &stats.approved.to_string());
    Output::kv("Rejected", &stats.rejected.to_string());
    if let Some(rate) = stats.approval_rate() {
        Output::kv("Approval rate", &format!("{:.0}%", rate * 100.0));
    }

    if !stats.by_category.is_empty() {
        Output::header("By category");
        for (category, count) in &stats.by_category {
            Output::kv(category, &count.to_string());
        }
    }

    Output::header("Jobs");
    Output::kv("Total", &jobs.len().to_string());
    for status in [JobStatus::Completed, JobStatus::Paused, JobStatus::Failed] {
        let count = jobs.iter().filter(|j| j.status == status).count();
        if count > 0 {
            Output::kv(&status.to_string(), &count.to_string());
        }
    }
    Output::kv("Videos processed", &processed.len().to_string());
    println!();

    Ok(())
}
