//! Job tracking and the records that outlive a single run.

mod job;
mod registry;
mod tracker;

pub use job::{JobError, JobLogEntry, JobStatus, ProcessingJob, MAX_JOB_LOGS};
pub use registry::{ChannelRecord, ChannelRegistry, JobTotals, ProcessedVideos, TrustTier};
pub use tracker::JobTracker;
