//! Insight records and their extraction from transcripts.

mod extractor;
mod parse;
mod reasoning;

pub use extractor::{assess, ExtractionOutcome, InsightExtractor, Verdict};
pub use parse::{parse_candidates, Candidate, ParsedCandidates};
pub use reasoning::{OpenAIReasoningService, ReasoningService};

#[cfg(test)]
pub(crate) use reasoning::testing;

use crate::channel::VideoRef;
use crate::error::{HarvestError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Review reason for candidates below the confidence floor.
pub const REASON_LOW_CONFIDENCE: &str = "Low confidence";
/// Review reason for candidates below the review quality trigger.
pub const REASON_BORDERLINE_QUALITY: &str = "Quality below review threshold";

/// Where an insight came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightSource {
    pub video_id: String,
    pub video_title: String,
    pub channel_id: String,
    pub channel_name: String,
    pub video_url: String,
}

impl From<&VideoRef> for InsightSource {
    fn from(video: &VideoRef) -> Self {
        Self {
            video_id: video.id.clone(),
            video_title: video.title.clone(),
            channel_id: video.channel_id.clone(),
            channel_name: video.channel_name.clone(),
            video_url: video.watch_url(),
        }
    }
}

/// Tone and openness tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionalProfile {
    pub tone: String,
    /// 0-100.
    pub warmth: u8,
    /// 0-100.
    pub vulnerability: u8,
}

/// Five quality dimensions, each within 0-100.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightScores {
    pub quality: u8,
    pub specificity: u8,
    pub actionability: u8,
    pub authenticity: u8,
    pub safety: u8,
}

/// Clamp an arbitrary model-reported number into a 0-100 score.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        0
    } else {
        raw.round().clamp(0.0, 100.0) as u8
    }
}

/// Clamp an arbitrary model-reported number into a 0-1 confidence.
pub fn clamp_confidence(raw: f64) -> f64 {
    if raw.is_nan() {
        0.0
    } else {
        raw.clamp(0.0, 1.0)
    }
}

/// Review state. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl fmt::Display for ReviewState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReviewState::Pending => write!(f, "pending"),
            ReviewState::Approved => write!(f, "approved"),
            ReviewState::Rejected => write!(f, "rejected"),
        }
    }
}

/// A scored unit of extracted knowledge from one transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: Uuid,
    pub source: InsightSource,
    pub category: String,
    pub title: String,
    pub insight: String,
    pub supporting_quotes: Vec<String>,
    pub coaching_guidance: String,
    pub anti_patterns: Vec<String>,
    pub emotional_profile: EmotionalProfile,
    pub scores: InsightScores,
    pub confidence: f64,
    pub review_state: ReviewState,
    pub needs_human_review: bool,
    pub review_reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
}

impl Insight {
    fn ensure_pending(&self, action: &str) -> Result<()> {
        if self.review_state == ReviewState::Pending {
            Ok(())
        } else {
            Err(HarvestError::InvalidTransition(format!(
                "cannot {} insight {} in state {}",
                action, self.id, self.review_state
            )))
        }
    }

    /// `pending -> approved`.
    pub fn approve(&mut self) -> Result<()> {
        self.ensure_pending("approve")?;
        self.review_state = ReviewState::Approved;
        self.reviewed_at = Some(Utc::now());
        Ok(())
    }

    /// `pending -> rejected`, keeping the reason.
    pub fn reject(&mut self, reason: &str) -> Result<()> {
        self.ensure_pending("reject")?;
        self.review_state = ReviewState::Rejected;
        self.rejection_reason = Some(reason.to_string());
        self.reviewed_at = Some(Utc::now());
        Ok(())
    }
}
