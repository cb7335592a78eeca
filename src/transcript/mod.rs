//! Transcript acquisition through an ordered chain of fallback methods.
//!
//! Methods run in fixed priority order and the first one that yields
//! segments wins. An empty result moves on to the next method; an explicit
//! "no captions" signal stops the chain and is reported as definitive.

mod formats;
mod methods;
mod tracks;

pub use formats::{parse_captions, sniff, CaptionFormat};
pub use tracks::{
    default_extractors, extract_caption_tracks, has_no_captions_signal, select_track,
    CaptionTrack, TrackExtractor,
};

use crate::config::TranscriptSettings;
use crate::error::{HarvestError, Result};
use crate::transport::Transport;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Error text reported when a video definitively has no captions.
pub const NO_CAPTIONS: &str = "no captions available";

static VIDEO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[?&]v=|youtu\.be/|/shorts/|/embed/|/live/)([A-Za-z0-9_-]{11})").expect("valid regex")
});

static BARE_VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("valid regex"));

/// Extract a video id from a bare id or any common watch URL shape.
pub fn parse_video_id(input: &str) -> Option<String> {
    let input = input.trim();
    if BARE_VIDEO_ID.is_match(input) {
        return Some(input.to_string());
    }
    VIDEO_ID.captures(input).map(|c| c[1].to_string())
}

/// One timed caption fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    /// Seconds from the start of the video.
    pub start: f64,
    /// Seconds.
    pub duration: f64,
}

impl TranscriptSegment {
    pub fn new(text: String, start: f64, duration: f64) -> Self {
        Self {
            text,
            start,
            duration,
        }
    }
}

/// Which method produced a transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionMethod {
    Backend,
    PlayerConfig,
    TimedText,
    Mirror,
    PageScrape,
}

impl fmt::Display for AcquisitionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AcquisitionMethod::Backend => "backend",
            AcquisitionMethod::PlayerConfig => "player-config",
            AcquisitionMethod::TimedText => "timedtext",
            AcquisitionMethod::Mirror => "mirror",
            AcquisitionMethod::PageScrape => "page-scrape",
        };
        write!(f, "{}", name)
    }
}

/// Outcome of acquiring one video's transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub video_id: String,
    /// Segment texts joined by single spaces.
    pub transcript: String,
    pub segments: Vec<TranscriptSegment>,
    pub method: Option<AcquisitionMethod>,
    pub error: Option<String>,
    /// True when the failure is final and retrying is pointless.
    pub definitive: bool,
}

impl TranscriptResult {
    fn success(video_id: &str, method: AcquisitionMethod, segments: Vec<TranscriptSegment>) -> Self {
        let transcript = segments
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            video_id: video_id.to_string(),
            transcript,
            segments,
            method: Some(method),
            error: None,
            definitive: false,
        }
    }

    fn failure(video_id: &str, error: String, definitive: bool) -> Self {
        Self {
            video_id: video_id.to_string(),
            transcript: String::new(),
            segments: Vec::new(),
            method: None,
            error: Some(error),
            definitive,
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && !self.segments.is_empty()
    }

    /// Transcript text cut to at most `max_chars` characters.
    pub fn truncated(&self, max_chars: usize) -> &str {
        match self.transcript.char_indices().nth(max_chars) {
            Some((end, _)) => &self.transcript[..end],
            None => &self.transcript,
        }
    }
}

/// How the mirror list is ordered for each acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MirrorOrdering {
    /// Shuffle per call to spread load.
    Shuffled,
    AsConfigured,
}

/// Obtains transcripts through the fallback chain.
pub struct TranscriptAcquirer {
    transport: Arc<Transport>,
    settings: TranscriptSettings,
    extractors: Vec<Box<dyn TrackExtractor>>,
    mirror_ordering: MirrorOrdering,
    rng: Mutex<StdRng>,
}

impl TranscriptAcquirer {
    pub fn new(transport: Arc<Transport>, settings: TranscriptSettings) -> Self {
        Self {
            transport,
            settings,
            extractors: default_extractors(),
            mirror_ordering: MirrorOrdering::Shuffled,
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn with_mirror_ordering(mut self, ordering: MirrorOrdering) -> Self {
        self.mirror_ordering = ordering;
        self
    }

    /// Fix the random source used for mirror ordering.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn settings(&self) -> &TranscriptSettings {
        &self.settings
    }

    fn timeout(secs: u64) -> Duration {
        Duration::from_secs(secs)
    }

    fn ordered_mirrors(&self) -> Vec<String> {
        let mut mirrors = self.settings.mirror_urls.clone();
        if self.mirror_ordering == MirrorOrdering::Shuffled {
            if let Ok(mut rng) = self.rng.lock() {
                mirrors.shuffle(&mut *rng);
            }
        }
        mirrors
    }

    fn enabled_methods(&self) -> Vec<AcquisitionMethod> {
        let mut methods = Vec::with_capacity(5);
        if self.settings.backend_url.is_some() {
            methods.push(AcquisitionMethod::Backend);
        }
        methods.push(AcquisitionMethod::PlayerConfig);
        methods.push(AcquisitionMethod::TimedText);
        if !self.settings.mirror_urls.is_empty() {
            methods.push(AcquisitionMethod::Mirror);
        }
        methods.push(AcquisitionMethod::PageScrape);
        methods
    }

    async fn run_method(
        &self,
        method: AcquisitionMethod,
        video_id: &str,
    ) -> Result<Vec<TranscriptSegment>> {
        match method {
            AcquisitionMethod::Backend => self.via_backend(video_id).await,
            AcquisitionMethod::PlayerConfig => self.via_player_config(video_id).await,
            AcquisitionMethod::TimedText => self.via_timedtext(video_id).await,
            AcquisitionMethod::Mirror => self.via_mirrors(video_id).await,
            AcquisitionMethod::PageScrape => self.via_page_scrape(video_id).await,
        }
    }

    /// Acquire the transcript for `video_id`.
    ///
    /// Never returns an error: failures are reported in the result so the
    /// caller can decide whether to skip the video or record a job error.
    #[instrument(skip(self))]
    pub async fn acquire(&self, video_id: &str) -> TranscriptResult {
        let mut failures: Vec<String> = Vec::new();

        for method in self.enabled_methods() {
            match self.run_method(method, video_id).await {
                Ok(segments) if !segments.is_empty() => {
                    info!(
                        video_id,
                        method = %method,
                        segments = segments.len(),
                        "Transcript acquired"
                    );
                    return TranscriptResult::success(video_id, method, segments);
                }
                Ok(_) => {
                    debug!(video_id, method = %method, "Method returned no segments");
                    failures.push(format!("{}: no segments", method));
                }
                Err(HarvestError::NoCaptions(_)) => {
                    info!(video_id, method = %method, "Video has no captions");
                    return TranscriptResult::failure(video_id, NO_CAPTIONS.to_string(), true);
                }
                Err(e) => {
                    debug!(video_id, method = %method, error = %e, "Method failed");
                    failures.push(format!("{}: {}", method, e));
                }
            }
        }

        warn!(video_id, attempts = failures.len(), "All transcript methods failed");
        TranscriptResult::failure(
            video_id,
            format!("all methods failed ({})", failures.join("; ")),
            false,
        )
    }
}
