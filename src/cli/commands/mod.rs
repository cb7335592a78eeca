//! CLI command implementations.

mod channels;
mod config;
mod doctor;
mod init;
mod jobs;
mod review;
mod run;
mod sample;
mod serve;
mod stats;
mod transcript;

pub use channels::run_channels;
pub use config::run_config;
pub use doctor::run_doctor;
pub use init::run_init;
pub use jobs::{run_jobs, run_pause};
pub use review::run_review;
pub use run::{run_job, run_resume};
pub use sample::run_sample;
pub use serve::run_serve;
pub use stats::run_stats;
pub use transcript::run_transcript;

use crate::config::Settings;
use crate::store::{Records, SqliteKeyValueStore};
use std::sync::Arc;

/// Open the record store without building the full pipeline.
pub(crate) fn open_records(settings: &Settings) -> crate::Result<Records> {
    let path = settings.sqlite_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Records::new(Arc::new(SqliteKeyValueStore::new(&path)?)))
}
