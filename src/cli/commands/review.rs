//! Review commands: list, approve, reject and export.

use super::open_records;
use crate::cli::{Output, ReviewAction};
use crate::config::{Prompts, Settings};
use crate::review::{export_to_path, PendingFilter, ReviewQueue};
use anyhow::Result;
use std::path::Path;

/// Run the review command.
pub async fn run_review(action: &ReviewAction, settings: Settings) -> Result<()> {
    let queue = ReviewQueue::new(open_records(&settings)?);

    match action {
        ReviewAction::List {
            category,
            flagged,
            full,
        } => {
            let filter = PendingFilter {
                category: category.clone(),
                needs_review_only: *flagged,
            };
            let pending = queue.pending(&filter).await?;
            if pending.is_empty() {
                Output::info("Nothing pending review.");
                return Ok(());
            }
            Output::header(&format!("Pending insights ({})", pending.len()));
            for insight in &pending {
                Output::insight(insight, *full);
            }
            println!();
        }

        ReviewAction::Approve { id } => {
            let id = queue.resolve_id(id).await?;
            let insight = queue.approve(id).await?;
            Output::success(&format!("Approved '{}'", insight.title));
        }

        ReviewAction::Reject { id, reason } => {
            let id = queue.resolve_id(id).await?;
            let insight = queue.reject(id, reason).await?;
            Output::success(&format!("Rejected '{}'", insight.title));
        }

        ReviewAction::Export { path } => {
            let prompts = Prompts::load(
                settings.prompts.custom_dir.as_deref(),
                Some(&settings.prompts.variables),
            )?;
            let system = prompts.render_with_custom(&prompts.export.system, &Default::default());

            let approved = queue.approved().await?;
            if approved.is_empty() {
                Output::warning("No approved insights to export.");
                return Ok(());
            }
            let written = export_to_path(&approved, &system, Path::new(path))?;
            Output::success(&format!("Exported {} examples to {}", written, path));
        }
    }

    Ok(())
}
