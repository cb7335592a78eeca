//! Durable job queue.

use super::job::{JobStatus, ProcessingJob};
use crate::error::{HarvestError, Result};
use crate::store::{keys, Records};
use tracing::{debug, info};
use uuid::Uuid;

/// Persists jobs and arbitrates pause requests against the runner.
///
/// Every write is an atomic update of the stored job list, so a pause from
/// another process is never overwritten by a runner's stale copy.
pub struct JobTracker {
    records: Records,
}

fn find_mut(jobs: &mut [ProcessingJob], id: Uuid) -> Result<&mut ProcessingJob> {
    jobs.iter_mut()
        .find(|j| j.id == id)
        .ok_or_else(|| HarvestError::NotFound(format!("job {}", id)))
}

impl JobTracker {
    pub fn new(records: Records) -> Self {
        Self { records }
    }

    async fn load_all(&self) -> Result<Vec<ProcessingJob>> {
        self.records.load(keys::JOBS).await
    }

    /// Persist `job`.
    ///
    /// A pause written by another caller wins over the runner's in-memory
    /// `processing` status, and `job` is updated to reflect it.
    pub async fn save(&self, job: &mut ProcessingJob) -> Result<()> {
        self.records
            .update(keys::JOBS, |jobs: &mut Vec<ProcessingJob>| {
                match jobs.iter_mut().find(|j| j.id == job.id) {
                    Some(stored) => {
                        if stored.status == JobStatus::Paused && job.status == JobStatus::Processing {
                            debug!(job_id = %job.id, "Adopting stored pause");
                            job.status = JobStatus::Paused;
                            job.log("Paused");
                        }
                        *stored = job.clone();
                    }
                    None => jobs.push(job.clone()),
                }
                Ok(())
            })
            .await
    }

    pub async fn get(&self, id: Uuid) -> Result<ProcessingJob> {
        self.load_all()
            .await?
            .into_iter()
            .find(|j| j.id == id)
            .ok_or_else(|| HarvestError::NotFound(format!("job {}", id)))
    }

    /// All jobs, newest first.
    pub async fn list(&self) -> Result<Vec<ProcessingJob>> {
        let mut jobs = self.load_all().await?;
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(jobs)
    }

    /// Request a cooperative pause; the runner stops before its next video.
    pub async fn pause(&self, id: Uuid) -> Result<ProcessingJob> {
        let paused = self
            .records
            .update(keys::JOBS, |jobs: &mut Vec<ProcessingJob>| {
                let job = find_mut(jobs, id)?;
                job.transition(JobStatus::Paused)?;
                Ok(job.clone())
            })
            .await?;
        info!(job_id = %id, "Job paused");
        Ok(paused)
    }

    /// Move a paused job back to `processing`, or adopt one a crashed
    /// runner left in `processing`, and persist it unconditionally.
    pub async fn resume(&self, id: Uuid) -> Result<ProcessingJob> {
        let resumed = self
            .records
            .update(keys::JOBS, |jobs: &mut Vec<ProcessingJob>| {
                let job = find_mut(jobs, id)?;
                match job.status {
                    JobStatus::Paused => job.transition(JobStatus::Processing)?,
                    JobStatus::Processing => job.log("Resuming interrupted run"),
                    other => {
                        return Err(HarvestError::InvalidTransition(format!(
                            "job {} is {} and cannot be resumed",
                            id, other
                        )))
                    }
                }
                Ok(job.clone())
            })
            .await?;
        info!(job_id = %id, remaining = resumed.remaining(), "Job resumed");
        Ok(resumed)
    }

    /// Status as currently stored, which may differ from a runner's copy.
    pub async fn stored_status(&self, id: Uuid) -> Result<Option<JobStatus>> {
        Ok(self
            .load_all()
            .await?
            .iter()
            .find(|j| j.id == id)
            .map(|j| j.status))
    }

    /// Accept a full id or a unique prefix of one.
    pub async fn resolve_id(&self, raw: &str) -> Result<Uuid> {
        if let Ok(id) = Uuid::parse_str(raw) {
            return Ok(id);
        }
        let prefix = raw.to_lowercase();
        let matches: Vec<Uuid> = self
            .load_all()
            .await?
            .iter()
            .map(|j| j.id)
            .filter(|id| id.to_string().starts_with(&prefix))
            .collect();
        match matches.as_slice() {
            [id] => Ok(*id),
            [] => Err(HarvestError::NotFound(format!("no job matches '{}'", raw))),
            _ => Err(HarvestError::InvalidInput(format!(
                "'{}' matches {} jobs",
                raw,
                matches.len()
            ))),
        }
    }
}
