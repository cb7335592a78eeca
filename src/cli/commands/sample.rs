//! Sample command: dry-run resolution and sampling.

use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::{Orchestrator, RunOptions};
use crate::sampling::engagement_score;
use anyhow::Result;
use console::style;

/// Run the sample command.
pub async fn run_sample(channel_url: &str, run: RunOptions, settings: Settings) -> Result<()> {
    let orchestrator = Orchestrator::new(settings)?;

    let spinner = Output::spinner("Resolving channel...");
    let report = orchestrator.sample_channel(channel_url, &run).await;
    spinner.finish_and_clear();
    let report = report?;

    Output::header(&report.channel_name);
    Output::kv("Channel id", &report.channel_id);
    Output::kv("Candidates", &report.candidates.to_string());
    Output::kv("After filters", &report.after_filter.to_string());
    if report.already_processed > 0 {
        Output::kv("Already processed", &report.already_processed.to_string());
    }
    Output::kv("Selected", &report.selected.len().to_string());
    println!();

    for video in &report.selected {
        let published = video
            .published_at
            .map(|t| t.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let views = video
            .view_count
            .map(|v| format!("{} views", v))
            .unwrap_or_else(|| "views unknown".to_string());
        println!(
            "  {} {} {}",
            style("*").cyan(),
            style(&video.title).bold(),
            style(&video.id).dim()
        );
        println!(
            "    {}, {}, engagement {:.3}",
            published,
            views,
            engagement_score(video)
        );
    }

    if report.selected.is_empty() {
        Output::warning("Nothing selected. Try --force or loosen the [sampling] filters.");
    }
    Ok(())
}
