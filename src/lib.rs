//! Harvest - coaching insights from video transcripts
//!
//! Harvest resolves a creator's channel, samples a bounded set of videos,
//! acquires their transcripts through a chain of fallback methods, and asks a
//! reasoning service to extract scored insights. Accepted insights are
//! deduplicated and land in a durable queue for human review.
//!
//! # Architecture
//!
//! - `transport` - rate-limited fetching with relay fallback
//! - `channel` - channel URL parsing, id resolution and feed parsing
//! - `sampling` - video filtering and selection strategies
//! - `transcript` - the transcript acquisition chain and caption parsers
//! - `insight` - extraction, score gating and the reasoning service seam
//! - `dedup` - content hashing and the accepted-hash set
//! - `review` - the review queue, statistics and training export
//! - `jobs` - job state machine, tracker and channel registry
//! - `store` - key-value persistence (SQLite or in-memory)
//! - `orchestrator` - pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use harvest::config::Settings;
//! use harvest::orchestrator::{Orchestrator, RunOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let orchestrator = Orchestrator::new(settings)?;
//!
//!     let job = orchestrator
//!         .start_job("https://www.youtube.com/@calmcoach", &RunOptions::default())
//!         .await?;
//!     println!("Queued {} insights for review", job.insights_found);
//!
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod cli;
pub mod config;
pub mod dedup;
pub mod error;
pub mod insight;
pub mod jobs;
pub mod openai;
pub mod orchestrator;
pub mod review;
pub mod sampling;
pub mod server;
pub mod store;
pub mod text;
pub mod transcript;
pub mod transport;

pub use error::{HarvestError, Result};
