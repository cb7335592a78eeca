//! Curated channel registry commands.

use super::open_records;
use crate::channel::parse_channel_input;
use crate::cli::{ChannelsAction, Output};
use crate::config::Settings;
use crate::jobs::{ChannelRecord, ChannelRegistry};
use anyhow::Result;
use console::style;

/// Run the channels command.
pub async fn run_channels(action: &ChannelsAction, settings: Settings) -> Result<()> {
    let registry = ChannelRegistry::new(open_records(&settings)?);

    match action {
        ChannelsAction::Add { url, tier, category } => {
            let input = parse_channel_input(url)?;
            let mut record = ChannelRecord::new(url, *tier, category.clone());
            record.channel_id = input.channel_id().map(str::to_string);
            registry.add(record).await?;
            Output::success(&format!("Added {} ({} trust)", url, tier));
        }

        ChannelsAction::List => {
            let channels = registry.list().await?;
            if channels.is_empty() {
                Output::info("No channels registered. Add one with: harvest channels add <url>");
                return Ok(());
            }
            Output::header(&format!("Channels ({})", channels.len()));
            for channel in &channels {
                println!(
                    "  {} {} [{}]{}",
                    style("*").cyan(),
                    style(channel.name.as_deref().unwrap_or(&channel.url)).bold(),
                    channel.trust_tier,
                    channel
                        .category
                        .as_ref()
                        .map(|c| format!(" {}", style(c).cyan()))
                        .unwrap_or_default()
                );
                let last = channel
                    .last_processed_at
                    .map(|t| t.format("%Y-%m-%d").to_string())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "    {} jobs, {} videos, {} insights, avg quality {:.1}, last run {}",
                    channel.jobs_run,
                    channel.videos_processed,
                    channel.insights_found,
                    channel.avg_quality,
                    last
                );
                if channel.name.is_some() {
                    println!("    {}", style(&channel.url).dim());
                }
            }
        }

        ChannelsAction::Remove { key } => {
            if registry.remove(key).await? {
                Output::success(&format!("Removed {}", key));
            } else {
                Output::warning(&format!("No channel matches {}", key));
            }
        }
    }

    Ok(())
}
