//! Processed-video set and curated channel registry.

use crate::error::{HarvestError, Result};
use crate::store::{keys, Records};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Ids of videos already run through extraction.
pub struct ProcessedVideos {
    records: Records,
}

impl ProcessedVideos {
    pub fn new(records: Records) -> Self {
        Self { records }
    }

    pub async fn all(&self) -> Result<BTreeSet<String>> {
        self.records.load(keys::PROCESSED_VIDEOS).await
    }

    pub async fn contains(&self, video_id: &str) -> Result<bool> {
        Ok(self.all().await?.contains(video_id))
    }

    pub async fn mark(&self, video_id: &str) -> Result<()> {
        self.records
            .update(keys::PROCESSED_VIDEOS, |set: &mut BTreeSet<String>| {
                set.insert(video_id.to_string());
                Ok(())
            })
            .await
    }
}

/// How much a channel's output is trusted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustTier {
    High,
    #[default]
    Medium,
    Low,
}

impl FromStr for TrustTier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "high" => Ok(TrustTier::High),
            "medium" => Ok(TrustTier::Medium),
            "low" => Ok(TrustTier::Low),
            _ => Err(format!("Unknown trust tier: {}", s)),
        }
    }
}

impl fmt::Display for TrustTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustTier::High => write!(f, "high"),
            TrustTier::Medium => write!(f, "medium"),
            TrustTier::Low => write!(f, "low"),
        }
    }
}

/// A curated channel and its running totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub url: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub trust_tier: TrustTier,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub jobs_run: u64,
    #[serde(default)]
    pub videos_processed: u64,
    #[serde(default)]
    pub insights_found: u64,
    /// Mean quality over every insight found on this channel.
    #[serde(default)]
    pub avg_quality: f64,
    pub added_at: DateTime<Utc>,
    #[serde(default)]
    pub last_processed_at: Option<DateTime<Utc>>,
}

impl ChannelRecord {
    pub fn new(url: &str, trust_tier: TrustTier, category: Option<String>) -> Self {
        Self {
            url: url.to_string(),
            channel_id: None,
            name: None,
            trust_tier,
            category,
            jobs_run: 0,
            videos_processed: 0,
            insights_found: 0,
            avg_quality: 0.0,
            added_at: Utc::now(),
            last_processed_at: None,
        }
    }

    fn matches(&self, key: &str) -> bool {
        self.url == key || self.channel_id.as_deref() == Some(key)
    }
}

/// Totals from one finished job.
#[derive(Debug, Clone, Default)]
pub struct JobTotals {
    pub channel_url: String,
    pub channel_id: Option<String>,
    pub channel_name: Option<String>,
    pub videos_processed: u64,
    pub insights_found: u64,
    /// Sum of quality scores over the insights the job accepted.
    pub quality_total: u64,
}

/// Curated channel list.
pub struct ChannelRegistry {
    records: Records,
}

impl ChannelRegistry {
    pub fn new(records: Records) -> Self {
        Self { records }
    }

    pub async fn list(&self) -> Result<Vec<ChannelRecord>> {
        self.records.load(keys::CHANNELS).await
    }

    pub async fn add(&self, record: ChannelRecord) -> Result<()> {
        self.records
            .update(keys::CHANNELS, |channels: &mut Vec<ChannelRecord>| {
                if channels.iter().any(|c| c.matches(&record.url)) {
                    return Err(HarvestError::InvalidInput(format!(
                        "channel {} is already registered",
                        record.url
                    )));
                }
                channels.push(record);
                Ok(())
            })
            .await
    }

    /// Remove by URL or channel id. Returns whether anything was removed.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        self.records
            .update(keys::CHANNELS, |channels: &mut Vec<ChannelRecord>| {
                let before = channels.len();
                channels.retain(|c| !c.matches(key));
                Ok(channels.len() != before)
            })
            .await
    }

    /// Fold a finished job into the matching record, registering the
    /// channel at the default tier if it is not curated yet.
    pub async fn record_job(&self, totals: &JobTotals) -> Result<ChannelRecord> {
        self.records
            .update(keys::CHANNELS, |channels: &mut Vec<ChannelRecord>| {
                Ok(fold_job(channels, totals))
            })
            .await
    }
}

fn fold_job(channels: &mut Vec<ChannelRecord>, totals: &JobTotals) -> ChannelRecord {
    let position = channels.iter().position(|c| {
        c.matches(&totals.channel_url)
            || totals.channel_id.as_deref().is_some_and(|id| c.matches(id))
    });
    let record = match position {
        Some(i) => &mut channels[i],
        None => {
            channels.push(ChannelRecord::new(&totals.channel_url, TrustTier::default(), None));
            let last = channels.len() - 1;
            &mut channels[last]
        }
    };

    if record.channel_id.is_none() {
        record.channel_id = totals.channel_id.clone();
    }
    if totals.channel_name.is_some() {
        record.name = totals.channel_name.clone();
    }

    let total = record.insights_found + totals.insights_found;
    if total > 0 {
        record.avg_quality = (record.avg_quality * record.insights_found as f64
            + totals.quality_total as f64)
            / total as f64;
    }
    record.insights_found = total;
    record.videos_processed += totals.videos_processed;
    record.jobs_run += 1;
    record.last_processed_at = Some(Utc::now());
    record.clone()
}
