//! CLI module for Harvest.

pub mod commands;
mod output;
pub mod preflight;

pub use output::Output;

use crate::jobs::TrustTier;
use crate::sampling::SamplingStrategy;
use clap::{Parser, Subcommand};

/// Harvest - coaching insights from video transcripts
///
/// Resolves a creator's channel, samples videos, pulls their transcripts and
/// extracts scored insights into a human review queue.
#[derive(Parser, Debug)]
#[command(name = "harvest")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for info, -vv for debug, -vvv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the data directory and a default config file
    Init,

    /// Check configuration and connectivity
    Doctor,

    /// Run a harvesting job over a channel
    Run {
        /// Channel URL (@handle, /channel/UC..., /c/name or /user/name)
        channel_url: String,

        /// Sampling strategy (random, popular, recent, balanced, engagement)
        #[arg(short, long)]
        strategy: Option<SamplingStrategy>,

        /// Maximum number of videos to process
        #[arg(short, long)]
        max_videos: Option<usize>,

        /// Comma-separated category names (default: all configured)
        #[arg(long, value_delimiter = ',')]
        categories: Vec<String>,

        /// Include videos already processed by earlier runs
        #[arg(short, long)]
        force: bool,
    },

    /// Resume a paused or interrupted job
    Resume {
        /// Job id or unique prefix
        job_id: String,
    },

    /// Ask a running job to pause before its next video
    Pause {
        /// Job id or unique prefix
        job_id: String,
    },

    /// List jobs, or show one in detail
    Jobs {
        #[command(subcommand)]
        action: Option<JobsAction>,
    },

    /// Review extracted insights
    Review {
        #[command(subcommand)]
        action: ReviewAction,
    },

    /// Manage the curated channel list
    Channels {
        #[command(subcommand)]
        action: ChannelsAction,
    },

    /// Show extraction and review statistics
    Stats,

    /// Fetch and print one video's transcript
    Transcript {
        /// Video URL or id
        video: String,

        /// Output format (text, json)
        #[arg(long, default_value = "text")]
        format: String,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },

    /// Resolve and sample a channel without processing anything
    Sample {
        /// Channel URL
        channel_url: String,

        /// Sampling strategy (random, popular, recent, balanced, engagement)
        #[arg(short, long)]
        strategy: Option<SamplingStrategy>,

        /// Maximum number of videos to select
        #[arg(short, long)]
        max_videos: Option<usize>,

        /// Include videos already processed by earlier runs
        #[arg(short, long)]
        force: bool,
    },

    /// Start the HTTP review API
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to bind to
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum JobsAction {
    /// Show one job with its errors and recent log
    Show {
        /// Job id or unique prefix
        job_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ReviewAction {
    /// List pending insights
    List {
        /// Only this category
        #[arg(long)]
        category: Option<String>,

        /// Only insights flagged for human review
        #[arg(long)]
        flagged: bool,

        /// Print full insight text and guidance
        #[arg(long)]
        full: bool,
    },

    /// Approve a pending insight
    Approve {
        /// Insight id or unique prefix
        id: String,
    },

    /// Reject a pending insight
    Reject {
        /// Insight id or unique prefix
        id: String,

        /// Why it was rejected
        #[arg(short, long)]
        reason: String,
    },

    /// Export approved insights as JSONL training examples
    Export {
        /// Output file
        path: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ChannelsAction {
    /// Register a channel
    Add {
        /// Channel URL
        url: String,

        /// Trust tier (high, medium, low)
        #[arg(short, long, default_value = "medium")]
        tier: TrustTier,

        /// Category the channel mostly covers
        #[arg(long)]
        category: Option<String>,
    },

    /// List registered channels
    List,

    /// Remove a channel by URL or channel id
    Remove {
        /// Channel URL or id
        key: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Open configuration file in editor
    Edit,

    /// Show configuration file path
    Path,
}
