//! CLI output formatting utilities.

use crate::insight::Insight;
use crate::jobs::{JobStatus, ProcessingJob};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

/// Output helper for CLI formatting.
pub struct Output;

impl Output {
    /// Print an info message.
    pub fn info(msg: &str) {
        println!("{} {}", style(">>").cyan().bold(), msg);
    }

    /// Print a success message.
    pub fn success(msg: &str) {
        println!("{} {}", style(">>").green().bold(), msg);
    }

    /// Print a warning message.
    pub fn warning(msg: &str) {
        eprintln!("{} {}", style(">>").yellow().bold(), msg);
    }

    /// Print an error message.
    pub fn error(msg: &str) {
        eprintln!("{} {}", style(">>").red().bold(), msg);
    }

    /// Print a header.
    pub fn header(msg: &str) {
        println!("\n{}", style(msg).bold().underlined());
    }

    /// Print a key-value pair.
    pub fn kv(key: &str, value: &str) {
        println!("  {}: {}", style(key).dim(), value);
    }

    /// Print a list item.
    pub fn list_item(msg: &str) {
        println!("  {} {}", style("*").cyan(), msg);
    }

    /// Print a one-line job summary.
    pub fn job_line(job: &ProcessingJob) {
        let status = match job.status {
            JobStatus::Completed => style(job.status.to_string()).green(),
            JobStatus::Failed => style(job.status.to_string()).red(),
            JobStatus::Paused => style(job.status.to_string()).yellow(),
            _ => style(job.status.to_string()).cyan(),
        };
        println!(
            "  {} {} {} {}/{} videos, {} insights ({})",
            style(short_id(&job.id.to_string())).dim(),
            status,
            style(job.channel_name.as_deref().unwrap_or(&job.channel_url)).bold(),
            job.current_video_index,
            job.videos_to_process,
            job.insights_found,
            job.created_at.format("%Y-%m-%d %H:%M"),
        );
    }

    /// Print a pending insight.
    pub fn insight(insight: &Insight, full: bool) {
        let flag = if insight.needs_human_review {
            format!(" {}", style(format!("[{}]", insight.review_reasons.join(", "))).yellow())
        } else {
            String::new()
        };
        println!(
            "\n{} {} {}{}",
            style(short_id(&insight.id.to_string())).dim(),
            style(&insight.title).bold(),
            style(format!("({})", insight.category)).cyan(),
            flag
        );
        println!(
            "   q{} s{} a{} safety{} conf {:.2}  {}",
            insight.scores.quality,
            insight.scores.specificity,
            insight.scores.actionability,
            insight.scores.safety,
            insight.confidence,
            style(&insight.source.video_title).dim()
        );
        if full {
            println!("   {}", insight.insight);
            if !insight.coaching_guidance.is_empty() {
                println!("   {} {}", style("Guidance:").dim(), insight.coaching_guidance);
            }
            for quote in &insight.supporting_quotes {
                println!("   {} \"{}\"", style(">").dim(), quote);
            }
        } else {
            println!("   {}", content_preview(&insight.insight, 160));
        }
    }

    /// Create a progress bar.
    pub fn progress_bar(len: u64, msg: &str) -> ProgressBar {
        let pb = ProgressBar::new(len);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        pb.set_message(msg.to_string());
        pb
    }

    /// Create a spinner.
    pub fn spinner(msg: &str) -> ProgressBar {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb
    }
}

/// First eight characters of an id.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((end, _)) => &id[..end],
        None => id,
    }
}

/// Truncate content with ellipsis.
fn content_preview(content: &str, max_chars: usize) -> String {
    let content = content.replace('\n', " ");
    match content.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &content[..end]),
        None => content,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id() {
        assert_eq!(short_id("0123456789abcdef"), "01234567");
        assert_eq!(short_id("abc"), "abc");
    }

    #[test]
    fn test_content_preview() {
        assert_eq!(content_preview("line one\nline two", 100), "line one line two");
        assert_eq!(content_preview("ééééé", 2), "éé...");
    }
}
