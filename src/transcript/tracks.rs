//! Caption-track discovery inside the watch page's inlined player config.
//!
//! The host's markup drifts, so discovery is a ranked chain of extractors:
//! the first one that yields tracks wins. New patterns are added by
//! appending to [`default_extractors`].

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

/// One caption track advertised by the player config.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    pub base_url: String,
    #[serde(rename = "languageCode", default)]
    pub language_code: String,
    /// `asr` for speech-recognition tracks.
    #[serde(default)]
    pub kind: Option<String>,
}

impl CaptionTrack {
    pub fn is_generated(&self) -> bool {
        self.kind.as_deref() == Some("asr")
    }

    /// Absolute URL requesting compact JSON events.
    pub fn fetch_url(&self) -> String {
        let base = if self.base_url.starts_with('/') {
            format!("https://www.youtube.com{}", self.base_url)
        } else {
            self.base_url.clone()
        };
        if base.contains("fmt=") {
            base
        } else {
            format!("{}&fmt=json3", base)
        }
    }
}

/// A strategy for locating caption tracks in page markup.
pub trait TrackExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, html: &str) -> Option<Vec<CaptionTrack>>;
}

fn parse_track_array(raw: &str) -> Option<Vec<CaptionTrack>> {
    serde_json::from_str::<Vec<CaptionTrack>>(raw)
        .ok()
        .filter(|tracks| !tracks.is_empty())
}

static EXACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""captionTracks":(\[[^\]]*\])"#).expect("valid regex"));

static LENIENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?s)"?captionTracks"?\s*:\s*(\[.*?\])\s*,\s*"(?:audioTracks|translationLanguages|defaultAudioTrackIndex)""#,
    )
    .expect("valid regex")
});

static PLAYER_RESPONSE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:var\s+|window\[.ytInitialPlayerResponse.\]\s*=\s*|\b)ytInitialPlayerResponse\s*=\s*\{")
        .expect("valid regex")
});

static ESCAPED_BASE_URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\\"baseUrl\\":\\"(.*?)\\""#).expect("valid regex"));

static ESCAPED_LANGUAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\\"languageCode\\":\\"([A-Za-z-]+)\\""#).expect("valid regex"));

/// Exact `"captionTracks":[...]` with no nested arrays.
pub struct ExactPattern;

impl TrackExtractor for ExactPattern {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn extract(&self, html: &str) -> Option<Vec<CaptionTrack>> {
        EXACT.captures(html).and_then(|c| parse_track_array(&c[1]))
    }
}

/// Whitespace- and quote-tolerant match bounded by the next known key.
pub struct LenientPattern;

impl TrackExtractor for LenientPattern {
    fn name(&self) -> &'static str {
        "lenient"
    }

    fn extract(&self, html: &str) -> Option<Vec<CaptionTrack>> {
        LENIENT.captures(html).and_then(|c| parse_track_array(&c[1]))
    }
}

/// Structural fallback: brace-count the whole player response object.
pub struct BraceCounting;

impl TrackExtractor for BraceCounting {
    fn name(&self) -> &'static str {
        "brace-counting"
    }

    fn extract(&self, html: &str) -> Option<Vec<CaptionTrack>> {
        let response = find_player_response(html)?;
        let tracks = response
            .pointer("/captions/playerCaptionsTracklistRenderer/captionTracks")?
            .clone();
        serde_json::from_value::<Vec<CaptionTrack>>(tracks)
            .ok()
            .filter(|t| !t.is_empty())
    }
}

/// Player config embedded as an escaped string literal.
pub struct EscapedString;

fn unescape_js(raw: &str) -> String {
    raw.replace("\\\\u0026", "&")
        .replace("\\u0026", "&")
        .replace("\\\\u003d", "=")
        .replace("\\u003d", "=")
        .replace("\\\\/", "/")
        .replace("\\/", "/")
}

impl TrackExtractor for EscapedString {
    fn name(&self) -> &'static str {
        "escaped-string"
    }

    fn extract(&self, html: &str) -> Option<Vec<CaptionTrack>> {
        let start = html.find("\\\"captionTracks\\\"")?;
        let region = &html[start..];

        let tracks: Vec<CaptionTrack> = ESCAPED_BASE_URL
            .captures_iter(region)
            .map(|caps| {
                let after = &region[caps.get(0).map_or(0, |m| m.end())..];
                let window_end = after.char_indices().nth(400).map_or(after.len(), |(i, _)| i);
                let window = &after[..window_end];
                CaptionTrack {
                    base_url: unescape_js(&caps[1]),
                    language_code: ESCAPED_LANGUAGE
                        .captures(window)
                        .map(|c| c[1].to_string())
                        .unwrap_or_default(),
                    kind: window.contains("\\\"kind\\\":\\\"asr\\\"").then(|| "asr".to_string()),
                }
            })
            .collect();

        (!tracks.is_empty()).then_some(tracks)
    }
}

/// Extractors in priority order.
pub fn default_extractors() -> Vec<Box<dyn TrackExtractor>> {
    vec![
        Box::new(ExactPattern),
        Box::new(LenientPattern),
        Box::new(BraceCounting),
        Box::new(EscapedString),
    ]
}

/// Run the chain; returns the winning extractor's name and its tracks.
pub fn extract_caption_tracks(
    html: &str,
    extractors: &[Box<dyn TrackExtractor>],
) -> Option<(&'static str, Vec<CaptionTrack>)> {
    extractors.iter().find_map(|extractor| {
        let tracks = extractor.extract(html)?;
        debug!(extractor = extractor.name(), tracks = tracks.len(), "Caption tracks found");
        Some((extractor.name(), tracks))
    })
}

/// Byte length of the balanced JSON object starting at `text[0] == '{'`.
fn balanced_object_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Locate and parse the inlined player response object.
pub fn find_player_response(html: &str) -> Option<Value> {
    let m = PLAYER_RESPONSE_START.find(html)?;
    let object_start = m.end() - 1;
    let len = balanced_object_len(&html[object_start..])?;
    serde_json::from_str(&html[object_start..object_start + len]).ok()
}

/// Whether the page explicitly says the video is playable but has no captions.
pub fn has_no_captions_signal(html: &str) -> bool {
    match find_player_response(html) {
        Some(response) => {
            response.pointer("/playabilityStatus/status").and_then(Value::as_str) == Some("OK")
                && response.get("captions").is_none()
        }
        None => false,
    }
}

/// Prefer a human-authored track in `language`, then a generated one, then
/// any track.
pub fn select_track<'a>(tracks: &'a [CaptionTrack], language: &str) -> Option<&'a CaptionTrack> {
    let matches_language = |t: &&CaptionTrack| {
        t.language_code == language || t.language_code.starts_with(&format!("{}-", language))
    };

    tracks
        .iter()
        .filter(matches_language)
        .find(|t| !t.is_generated())
        .or_else(|| tracks.iter().find(matches_language))
        .or_else(|| tracks.first())
}
