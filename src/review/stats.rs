//! Aggregate quality statistics across runs and reviews.

use crate::error::Result;
use crate::insight::{ExtractionOutcome, Insight};
use crate::store::{keys, Records};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted quality aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityStats {
    pub total_candidates: u64,
    pub accepted: u64,
    pub rejected_low_quality: u64,
    pub duplicates: u64,
    pub flagged: u64,
    pub malformed: u64,
    pub approved: u64,
    pub rejected: u64,
    /// Running means over accepted insights.
    pub avg_quality: f64,
    pub avg_specificity: f64,
    pub avg_safety: f64,
    pub avg_confidence: f64,
    /// Accepted insights per category.
    pub by_category: BTreeMap<String, u64>,
    pub updated_at: Option<DateTime<Utc>>,
}

fn running_mean(mean: f64, count: u64, value: f64) -> f64 {
    mean + (value - mean) / count as f64
}

impl QualityStats {
    /// Fold one video's extraction outcome in.
    pub fn record_extraction(&mut self, outcome: &ExtractionOutcome) {
        self.total_candidates += outcome.candidates as u64;
        self.rejected_low_quality += outcome.rejected_low_quality as u64;
        self.duplicates += outcome.duplicates as u64;
        self.flagged += outcome.flagged as u64;
        self.malformed += outcome.malformed as u64;

        for insight in &outcome.accepted {
            self.accepted += 1;
            let n = self.accepted;
            self.avg_quality = running_mean(self.avg_quality, n, insight.scores.quality as f64);
            self.avg_specificity =
                running_mean(self.avg_specificity, n, insight.scores.specificity as f64);
            self.avg_safety = running_mean(self.avg_safety, n, insight.scores.safety as f64);
            self.avg_confidence = running_mean(self.avg_confidence, n, insight.confidence);
            *self.by_category.entry(insight.category.clone()).or_insert(0) += 1;
        }
        self.updated_at = Some(Utc::now());
    }

    pub fn record_approval(&mut self, _insight: &Insight) {
        self.approved += 1;
        self.updated_at = Some(Utc::now());
    }

    pub fn record_rejection(&mut self, _insight: &Insight) {
        self.rejected += 1;
        self.updated_at = Some(Utc::now());
    }

    /// Share of reviewed insights that were approved.
    pub fn approval_rate(&self) -> Option<f64> {
        let reviewed = self.approved + self.rejected;
        (reviewed > 0).then(|| self.approved as f64 / reviewed as f64)
    }
}

pub async fn load_stats(records: &Records) -> Result<QualityStats> {
    records.load(keys::QUALITY_STATS).await
}

/// Atomically modify the aggregate and return the new value.
pub async fn update_stats<F>(records: &Records, update: F) -> Result<QualityStats>
where
    F: FnOnce(&mut QualityStats) + Send,
{
    records
        .update(keys::QUALITY_STATS, |stats: &mut QualityStats| {
            update(stats);
            Ok(stats.clone())
        })
        .await
}
