//! Video sampling: choose a bounded subset of a channel's candidates.
//!
//! Filtering always runs first; the selected strategy then picks at most
//! `max_videos` entries from what survives.

mod strategy;

pub use strategy::engagement_score;

use crate::channel::VideoRef;
use chrono::{DateTime, Months, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SamplingStrategy {
    Random,
    Popular,
    Recent,
    #[default]
    Balanced,
    Engagement,
}

impl std::str::FromStr for SamplingStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" => Ok(SamplingStrategy::Random),
            "popular" => Ok(SamplingStrategy::Popular),
            "recent" => Ok(SamplingStrategy::Recent),
            "balanced" => Ok(SamplingStrategy::Balanced),
            "engagement" => Ok(SamplingStrategy::Engagement),
            _ => Err(format!(
                "Unknown sampling strategy: {}. Use random, popular, recent, balanced or engagement.",
                s
            )),
        }
    }
}

impl std::fmt::Display for SamplingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SamplingStrategy::Random => "random",
            SamplingStrategy::Popular => "popular",
            SamplingStrategy::Recent => "recent",
            SamplingStrategy::Balanced => "balanced",
            SamplingStrategy::Engagement => "engagement",
        };
        write!(f, "{}", name)
    }
}

/// Sampling options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingOptions {
    pub strategy: SamplingStrategy,
    pub max_videos: usize,
    /// Balanced bucket weights, normalized by their sum.
    pub popular_percent: u32,
    pub recent_percent: u32,
    pub random_percent: u32,
    pub min_duration_minutes: u32,
    pub max_age_months: u32,
    pub exclude_shorts: bool,
}

impl Default for SamplingOptions {
    fn default() -> Self {
        Self {
            strategy: SamplingStrategy::Balanced,
            max_videos: 25,
            popular_percent: 40,
            recent_percent: 40,
            random_percent: 20,
            min_duration_minutes: 5,
            max_age_months: 24,
            exclude_shorts: true,
        }
    }
}

/// Longest duration treated as a short-form clip.
const SHORT_FORM_MAX_SECONDS: u32 = 60;

fn is_short_form(video: &VideoRef) -> bool {
    let title = video.title.to_lowercase();
    title.contains("#shorts")
        || title.contains("#short ")
        || title.ends_with("#short")
        || video
            .duration_seconds
            .is_some_and(|d| d <= SHORT_FORM_MAX_SECONDS)
}

/// Apply age, duration and short-form filters.
///
/// Missing publish time or duration never excludes a video.
pub fn filter_videos(videos: &[VideoRef], opts: &SamplingOptions, now: DateTime<Utc>) -> Vec<VideoRef> {
    let cutoff = now.checked_sub_months(Months::new(opts.max_age_months));
    let min_seconds = opts.min_duration_minutes.saturating_mul(60);

    videos
        .iter()
        .filter(|v| match (cutoff, v.published_at) {
            (Some(cutoff), Some(published)) => published >= cutoff,
            _ => true,
        })
        .filter(|v| v.duration_seconds.is_none_or(|d| d >= min_seconds))
        .filter(|v| !(opts.exclude_shorts && is_short_form(v)))
        .cloned()
        .collect()
}

/// Filter then select at most `opts.max_videos` videos.
pub fn select_videos<R: Rng + ?Sized>(
    videos: &[VideoRef],
    opts: &SamplingOptions,
    now: DateTime<Utc>,
    rng: &mut R,
) -> Vec<VideoRef> {
    let filtered = filter_videos(videos, opts, now);
    debug!(
        candidates = videos.len(),
        after_filter = filtered.len(),
        strategy = %opts.strategy,
        "Sampling videos"
    );

    let mut selected = match opts.strategy {
        SamplingStrategy::Random => strategy::random(filtered, opts.max_videos, rng),
        SamplingStrategy::Popular => strategy::popular(filtered, opts.max_videos, rng),
        SamplingStrategy::Recent => strategy::recent(filtered, opts.max_videos),
        SamplingStrategy::Engagement => strategy::engagement(filtered, opts.max_videos),
        SamplingStrategy::Balanced => strategy::balanced(filtered, opts, rng),
    };
    selected.truncate(opts.max_videos);
    selected
}
