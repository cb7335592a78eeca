//! Canonical channel id extraction from profile-page markup.
//!
//! The host's markup drifts, so several patterns are tried in order and
//! the first match wins.

use regex::Regex;
use std::sync::LazyLock;

static ID_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    [
        ("meta-channel-id", r#"<meta itemprop="(?:channelId|identifier)" content="(UC[0-9A-Za-z_-]{22})""#),
        ("canonical-link", r#"<link rel="canonical" href="https?://www\.youtube\.com/channel/(UC[0-9A-Za-z_-]{22})""#),
        ("external-id", r#""externalId"\s*:\s*"(UC[0-9A-Za-z_-]{22})""#),
        ("channel-id-json", r#""channelId"\s*:\s*"(UC[0-9A-Za-z_-]{22})""#),
        ("browse-id", r#""browseId"\s*:\s*"(UC[0-9A-Za-z_-]{22})""#),
        ("channel-path", r#"/channel/(UC[0-9A-Za-z_-]{22})"#),
    ]
    .into_iter()
    .map(|(name, pattern)| (name, Regex::new(pattern).expect("valid regex")))
    .collect()
});

static OG_TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<meta property="og:title" content="([^"]*)""#).expect("valid regex"));

/// Extract the canonical channel id from a profile page.
pub fn extract_channel_id(html: &str) -> Option<String> {
    ID_PATTERNS.iter().find_map(|(name, pattern)| {
        pattern.captures(html).map(|caps| {
            tracing::debug!(pattern = name, "Channel id matched");
            caps[1].to_string()
        })
    })
}

/// Extract the display name from a profile page.
pub fn extract_channel_name(html: &str) -> Option<String> {
    OG_TITLE
        .captures(html)
        .map(|caps| crate::text::decode_entities(&caps[1]))
        .filter(|name| !name.is_empty())
}
