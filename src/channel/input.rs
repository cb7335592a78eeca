//! Channel URL parsing.

use super::ResolveError;
use regex::Regex;
use std::sync::LazyLock;

static CHANNEL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^UC[0-9A-Za-z_-]{22}$").expect("valid regex"));

static HANDLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@[0-9A-Za-z._-]{3,30}$").expect("valid regex"));

/// Path segments that are host features rather than vanity names.
const RESERVED_PATHS: &[&str] = &[
    "watch", "feed", "results", "playlist", "shorts", "live", "embed", "channel", "c", "user",
    "feeds", "about", "account", "premium",
];

/// A parsed creator-profile reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelInput {
    /// Already canonical (`UC` + 22 characters).
    Id(String),
    /// `@handle`, stored without the `@`.
    Handle(String),
    /// Legacy `/c/<name>` custom URL.
    Custom(String),
    /// Legacy `/user/<name>` URL.
    User(String),
    /// Bare `youtube.com/<name>` vanity URL.
    Vanity(String),
}

impl ChannelInput {
    /// Canonical channel id, when already known.
    pub fn channel_id(&self) -> Option<&str> {
        match self {
            ChannelInput::Id(id) => Some(id),
            _ => None,
        }
    }

    /// Public profile page used to discover the canonical id.
    pub fn profile_url(&self) -> String {
        match self {
            ChannelInput::Id(id) => format!("https://www.youtube.com/channel/{}", id),
            ChannelInput::Handle(h) => format!("https://www.youtube.com/@{}", h),
            ChannelInput::Custom(c) => format!("https://www.youtube.com/c/{}", c),
            ChannelInput::User(u) => format!("https://www.youtube.com/user/{}", u),
            ChannelInput::Vanity(v) => format!("https://www.youtube.com/{}", v),
        }
    }
}

/// Parse a channel URL, handle, or bare id.
pub fn parse_channel_input(input: &str) -> Result<ChannelInput, ResolveError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ResolveError::InvalidUrl("empty channel reference".to_string()));
    }

    if CHANNEL_ID.is_match(trimmed) {
        return Ok(ChannelInput::Id(trimmed.to_string()));
    }
    if HANDLE.is_match(trimmed) {
        return Ok(ChannelInput::Handle(trimmed[1..].to_string()));
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = url::Url::parse(&with_scheme)
        .map_err(|e| ResolveError::InvalidUrl(format!("{}: {}", trimmed, e)))?;

    let host = url.host_str().unwrap_or_default().to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let host = host.strip_prefix("m.").unwrap_or(host);
    if host != "youtube.com" {
        return Err(ResolveError::InvalidUrl(format!(
            "{} is not a youtube.com channel URL",
            trimmed
        )));
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|p| !p.is_empty()).collect())
        .unwrap_or_default();

    match segments.as_slice() {
        ["channel", id, ..] if CHANNEL_ID.is_match(id) => Ok(ChannelInput::Id(id.to_string())),
        ["c", name, ..] => Ok(ChannelInput::Custom(name.to_string())),
        ["user", name, ..] => Ok(ChannelInput::User(name.to_string())),
        [first, ..] if first.starts_with('@') && first.len() > 1 => {
            Ok(ChannelInput::Handle(first[1..].to_string()))
        }
        [first, ..] if !RESERVED_PATHS.contains(first) => {
            Ok(ChannelInput::Vanity(first.to_string()))
        }
        _ => Err(ResolveError::InvalidUrl(format!(
            "{} does not identify a channel",
            trimmed
        ))),
    }
}
