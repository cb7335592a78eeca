//! Processing job record and its lifecycle.

use crate::channel::VideoRef;
use crate::error::{HarvestError, Result};
use crate::sampling::SamplingStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Step-level log entries kept per job; older entries are dropped.
pub const MAX_JOB_LOGS: usize = 200;

/// Job status. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Fetching,
    Processing,
    Filtering,
    Paused,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match (self, next) {
            (from, Failed) => !from.is_terminal(),
            (Fetching, Processing)
            | (Processing, Filtering)
            | (Filtering, Completed)
            | (Processing, Paused)
            | (Paused, Processing) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStatus::Fetching => "fetching",
            JobStatus::Processing => "processing",
            JobStatus::Filtering => "filtering",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Timestamped step log line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

/// Per-video error kept on the job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    pub video_id: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// One end-to-end run over a bounded video set from one channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessingJob {
    pub id: Uuid,
    pub channel_url: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub channel_name: Option<String>,
    pub status: JobStatus,
    pub strategy: SamplingStrategy,
    pub categories: Vec<String>,
    pub videos: Vec<VideoRef>,
    pub current_video_index: usize,
    pub videos_to_process: usize,
    pub videos_processed: usize,
    pub videos_skipped: usize,
    pub insights_found: usize,
    pub insights_filtered: usize,
    pub insights_duplicated: usize,
    /// Sum of quality scores over accepted insights.
    #[serde(default)]
    pub insight_quality_total: u64,
    pub errors: Vec<JobError>,
    pub logs: Vec<JobLogEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ProcessingJob {
    pub fn new(channel_url: &str, strategy: SamplingStrategy, categories: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            channel_url: channel_url.to_string(),
            channel_id: None,
            channel_name: None,
            status: JobStatus::Fetching,
            strategy,
            categories,
            videos: Vec::new(),
            current_video_index: 0,
            videos_to_process: 0,
            videos_processed: 0,
            videos_skipped: 0,
            insights_found: 0,
            insights_filtered: 0,
            insights_duplicated: 0,
            insight_quality_total: 0,
            errors: Vec::new(),
            logs: Vec::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn transition(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(HarvestError::InvalidTransition(format!(
                "job {}: {} -> {}",
                self.id, self.status, next
            )));
        }
        self.status = next;
        self.updated_at = Utc::now();
        if next.is_terminal() {
            self.completed_at = Some(self.updated_at);
        }
        self.log(format!("Status changed to {}", next));
        Ok(())
    }

    /// Mark failed from any non-terminal state, recording why.
    pub fn fail(&mut self, reason: &str) -> Result<()> {
        self.transition(JobStatus::Failed)?;
        self.log(format!("Failed: {}", reason));
        Ok(())
    }

    /// Install the video list to process.
    pub fn set_videos(&mut self, videos: Vec<VideoRef>) {
        self.videos_to_process = videos.len();
        self.videos = videos;
        self.current_video_index = 0;
        self.updated_at = Utc::now();
    }

    /// The next unprocessed video, if any.
    pub fn current_video(&self) -> Option<&VideoRef> {
        self.videos.get(self.current_video_index)
    }

    /// Advance past the current video. `processed` is false for skips.
    pub fn advance(&mut self, processed: bool) {
        if self.current_video_index >= self.videos.len() {
            return;
        }
        self.current_video_index += 1;
        if processed {
            self.videos_processed = (self.videos_processed + 1).min(self.videos_to_process);
        } else {
            self.videos_skipped += 1;
        }
        self.updated_at = Utc::now();
    }

    pub fn record_error(&mut self, video_id: &str, message: &str) {
        let at = Utc::now();
        self.errors.push(JobError {
            video_id: video_id.to_string(),
            message: message.to_string(),
            at,
        });
        self.log(format!("{}: {}", video_id, message));
    }

    /// Append a log line, dropping the oldest beyond [`MAX_JOB_LOGS`].
    pub fn log(&mut self, message: impl Into<String>) {
        self.logs.push(JobLogEntry {
            at: Utc::now(),
            message: message.into(),
        });
        if self.logs.len() > MAX_JOB_LOGS {
            let excess = self.logs.len() - MAX_JOB_LOGS;
            self.logs.drain(..excess);
        }
    }

    pub fn remaining(&self) -> usize {
        self.videos.len().saturating_sub(self.current_video_index)
    }
}
