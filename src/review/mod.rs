//! Human review queue for accepted insights.
//!
//! Pending, approved and rejected insights live in separate collections.
//! Moving an insight first takes it out of `pending` atomically, so only one
//! reviewer can move it; if the destination write then fails, the insight is
//! put back.

mod export;
mod stats;

pub use export::{export_to_path, write_jsonl};
pub use stats::{load_stats, update_stats, QualityStats};

use crate::error::{HarvestError, Result};
use crate::insight::Insight;
use crate::store::{keys, Records};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Filter for listing pending insights.
#[derive(Debug, Clone, Default)]
pub struct PendingFilter {
    pub category: Option<String>,
    /// Only insights flagged for human review.
    pub needs_review_only: bool,
}

impl PendingFilter {
    fn matches(&self, insight: &Insight) -> bool {
        self.category.as_ref().is_none_or(|c| &insight.category == c)
            && (!self.needs_review_only || insight.needs_human_review)
    }
}

/// Durable review queue.
pub struct ReviewQueue {
    records: Records,
}

impl ReviewQueue {
    pub fn new(records: Records) -> Self {
        Self { records }
    }

    async fn load(&self, key: &str) -> Result<Vec<Insight>> {
        self.records.load(key).await
    }

    /// Append newly accepted insights to `pending`.
    pub async fn enqueue(&self, insights: &[Insight]) -> Result<()> {
        if insights.is_empty() {
            return Ok(());
        }
        self.records
            .update(keys::PENDING_INSIGHTS, |pending: &mut Vec<Insight>| {
                pending.extend(insights.iter().cloned());
                Ok(())
            })
            .await
    }

    pub async fn pending(&self, filter: &PendingFilter) -> Result<Vec<Insight>> {
        let pending = self.load(keys::PENDING_INSIGHTS).await?;
        Ok(pending.into_iter().filter(|i| filter.matches(i)).collect())
    }

    pub async fn approved(&self) -> Result<Vec<Insight>> {
        self.load(keys::APPROVED_INSIGHTS).await
    }

    pub async fn rejected(&self) -> Result<Vec<Insight>> {
        self.load(keys::REJECTED_INSIGHTS).await
    }

    /// Error for an id that is not pending: a transition error if it was
    /// already reviewed, otherwise not found.
    async fn not_pending(&self, id: Uuid) -> Result<HarvestError> {
        for (key, state) in [
            (keys::APPROVED_INSIGHTS, "approved"),
            (keys::REJECTED_INSIGHTS, "rejected"),
        ] {
            if self.load(key).await?.iter().any(|i| i.id == id) {
                return Ok(HarvestError::InvalidTransition(format!(
                    "insight {} is already {}",
                    id, state
                )));
            }
        }
        Ok(HarvestError::NotFound(format!("insight {}", id)))
    }

    async fn take_pending<F>(&self, id: Uuid, destination: &str, transition: F) -> Result<Insight>
    where
        F: FnOnce(&mut Insight) -> Result<()> + Send,
    {
        let taken = self
            .records
            .update(keys::PENDING_INSIGHTS, |pending: &mut Vec<Insight>| {
                let Some(position) = pending.iter().position(|i| i.id == id) else {
                    return Ok(None);
                };
                let mut insight = pending[position].clone();
                transition(&mut insight)?;
                let original = pending.remove(position);
                Ok(Some((original, insight)))
            })
            .await?;
        let Some((original, insight)) = taken else {
            return Err(self.not_pending(id).await?);
        };

        let stored = self
            .records
            .update(destination, |reviewed: &mut Vec<Insight>| {
                reviewed.push(insight.clone());
                Ok(())
            })
            .await;
        if let Err(e) = stored {
            if let Err(restore_error) = self.enqueue(std::slice::from_ref(&original)).await {
                warn!(%id, error = %restore_error, "Could not return insight to pending");
            }
            return Err(e);
        }
        Ok(insight)
    }

    /// `pending -> approved`.
    #[instrument(skip(self))]
    pub async fn approve(&self, id: Uuid) -> Result<Insight> {
        let insight = self
            .take_pending(id, keys::APPROVED_INSIGHTS, |i| i.approve())
            .await?;
        update_stats(&self.records, |s| s.record_approval(&insight)).await?;
        info!(title = %insight.title, "Insight approved");
        Ok(insight)
    }

    /// `pending -> rejected` with a reason.
    #[instrument(skip(self))]
    pub async fn reject(&self, id: Uuid, reason: &str) -> Result<Insight> {
        let insight = self
            .take_pending(id, keys::REJECTED_INSIGHTS, |i| i.reject(reason))
            .await?;
        update_stats(&self.records, |s| s.record_rejection(&insight)).await?;
        info!(title = %insight.title, reason, "Insight rejected");
        Ok(insight)
    }

    /// Find an insight in any collection.
    pub async fn find(&self, id: Uuid) -> Result<Option<Insight>> {
        for key in [
            keys::PENDING_INSIGHTS,
            keys::APPROVED_INSIGHTS,
            keys::REJECTED_INSIGHTS,
        ] {
            if let Some(found) = self.load(key).await?.into_iter().find(|i| i.id == id) {
                return Ok(Some(found));
            }
        }
        Ok(None)
    }

    /// Accept a full id or a unique prefix of one.
    pub async fn resolve_id(&self, raw: &str) -> Result<Uuid> {
        if let Ok(id) = Uuid::parse_str(raw) {
            return Ok(id);
        }
        let prefix = raw.to_lowercase();
        let pending = self.load(keys::PENDING_INSIGHTS).await?;
        let matches: Vec<Uuid> = pending
            .iter()
            .map(|i| i.id)
            .filter(|id| id.to_string().starts_with(&prefix))
            .collect();
        match matches.as_slice() {
            [id] => Ok(*id),
            [] => Err(HarvestError::NotFound(format!("no pending insight matches '{}'", raw))),
            _ => Err(HarvestError::InvalidInput(format!(
                "'{}' matches {} pending insights",
                raw,
                matches.len()
            ))),
        }
    }

    pub async fn stats(&self) -> Result<QualityStats> {
        load_stats(&self.records).await
    }
}
