//! Channel resolution: creator URL to canonical id plus candidate videos.

mod extract;
mod feed;
mod input;

pub use extract::{extract_channel_id, extract_channel_name};
pub use feed::{parse_feed, ParsedFeed};
pub use input::{parse_channel_input, ChannelInput};

#[cfg(test)]
pub(crate) use feed::tests::{sample_entry, sample_feed, CHANNEL};

use crate::error::HarvestError;
use crate::transport::{FetchRequest, Transport};
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, instrument, warn};

/// A video discovered on a channel. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRef {
    pub id: String,
    pub title: String,
    pub channel_id: String,
    pub channel_name: String,
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration_seconds: Option<u32>,
    #[serde(default)]
    pub view_count: Option<u64>,
    #[serde(default)]
    pub like_count: Option<u64>,
    #[serde(default)]
    pub comment_count: Option<u64>,
}

impl VideoRef {
    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.id)
    }
}

/// Result of resolving a channel.
#[derive(Debug, Clone)]
pub struct ChannelVideos {
    pub videos: Vec<VideoRef>,
    pub channel_name: String,
    pub channel_id: String,
}

/// Tagged channel resolution failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Invalid channel URL: {0}")]
    InvalidUrl(String),

    #[error("Network failure fetching channel page: {0}")]
    Network(String),

    #[error("Could not resolve channel id from {0}")]
    ChannelIdNotFound(String),

    #[error("Failed to fetch channel feed: {0}")]
    FeedFetch(String),
}

impl From<ResolveError> for HarvestError {
    fn from(e: ResolveError) -> Self {
        match e {
            ResolveError::InvalidUrl(_) => HarvestError::InvalidInput(e.to_string()),
            ResolveError::ChannelIdNotFound(_) => HarvestError::NotFound(e.to_string()),
            ResolveError::Network(_) | ResolveError::FeedFetch(_) => {
                HarvestError::Transport(e.to_string())
            }
        }
    }
}

/// Resolves channel references into video lists through the transport.
pub struct ChannelResolver {
    transport: Arc<Transport>,
    max_videos: usize,
    timeout: Duration,
    rng: Mutex<StdRng>,
}

impl ChannelResolver {
    pub fn new(transport: Arc<Transport>, max_videos: usize) -> Self {
        Self {
            transport,
            max_videos,
            timeout: Duration::from_secs(15),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// Fix the random source used when capping large feeds.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn feed_url(channel_id: &str) -> String {
        format!("https://www.youtube.com/feeds/videos.xml?channel_id={}", channel_id)
    }

    /// Resolve a channel URL into its id, name and candidate videos.
    #[instrument(skip(self))]
    pub async fn resolve(&self, channel_url: &str) -> Result<ChannelVideos, ResolveError> {
        let input = parse_channel_input(channel_url)?;

        let (channel_id, page_name) = match input.channel_id() {
            Some(id) => (id.to_string(), None),
            None => self.resolve_id(&input).await?,
        };

        let request = FetchRequest::get(Self::feed_url(&channel_id)).with_timeout(self.timeout);
        let response = self
            .transport
            .fetch_with_relay_fallback(&request, None)
            .await
            .map_err(|e| ResolveError::FeedFetch(e.to_string()))?;

        let feed = parse_feed(&response.body, &channel_id);
        let channel_name = feed
            .channel_name
            .or(page_name)
            .unwrap_or_else(|| channel_id.clone());

        let videos = self.cap(feed.videos);
        info!(
            channel_id = %channel_id,
            videos = videos.len(),
            "Resolved channel '{}'",
            channel_name
        );

        Ok(ChannelVideos {
            videos,
            channel_name,
            channel_id,
        })
    }

    async fn resolve_id(
        &self,
        input: &ChannelInput,
    ) -> Result<(String, Option<String>), ResolveError> {
        let profile_url = input.profile_url();
        let request = FetchRequest::get(&profile_url).with_timeout(self.timeout);
        let response = self
            .transport
            .fetch_with_relay_fallback(&request, None)
            .await
            .map_err(|e| ResolveError::Network(e.to_string()))?;

        match extract_channel_id(&response.body) {
            Some(id) => Ok((id, extract_channel_name(&response.body))),
            None => {
                warn!(url = %profile_url, "No channel id pattern matched");
                Err(ResolveError::ChannelIdNotFound(profile_url))
            }
        }
    }

    /// Uniformly sample down to the configured cap.
    fn cap(&self, videos: Vec<VideoRef>) -> Vec<VideoRef> {
        if videos.len() <= self.max_videos {
            return videos;
        }
        match self.rng.lock() {
            Ok(mut rng) => videos
                .choose_multiple(&mut *rng, self.max_videos)
                .cloned()
                .collect(),
            Err(_) => videos.into_iter().take(self.max_videos).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::feed::tests::{sample_entry, sample_feed, CHANNEL};
    use super::*;
    use crate::transport::testing::{ok, status, ScriptedFetcher};

    fn resolver(fetcher: Arc<ScriptedFetcher>, cap: usize) -> ChannelResolver {
        let transport = Arc::new(
            Transport::new(fetcher, Duration::ZERO)
                .with_backoff(Duration::ZERO)
                .with_retries(1),
        );
        ChannelResolver::new(transport, cap).with_seed(7)
    }

    fn feed_of(n: usize) -> String {
        let entries: Vec<String> = (0..n)
            .map(|i| sample_entry(&format!("vid{:08}", i), "t", "2026-01-01T00:00:00+00:00", 10))
            .collect();
        sample_feed(&entries)
    }

    #[tokio::test]
    async fn test_canonical_id_skips_profile_page() {
        let feed = feed_of(3);
        let fetcher = Arc::new(ScriptedFetcher::new(move |req| {
            assert!(req.url.contains("feeds/videos.xml"));
            ok(&feed)
        }));
        let resolver = resolver(fetcher.clone(), 50);

        let result = resolver
            .resolve(&format!("https://www.youtube.com/channel/{}", CHANNEL))
            .await
            .unwrap();
        assert_eq!(result.channel_id, CHANNEL);
        assert_eq!(result.channel_name, "Calm Coach");
        assert_eq!(result.videos.len(), 3);
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_handle_resolves_through_profile_page() {
        let feed = feed_of(2);
        let fetcher = Arc::new(ScriptedFetcher::new(move |req| {
            if req.url.contains("/@calmcoach") {
                ok(&format!(r#"<link rel="canonical" href="https://www.youtube.com/channel/{}">"#, CHANNEL))
            } else {
                ok(&feed)
            }
        }));
        let resolver = resolver(fetcher.clone(), 50);

        let result = resolver.resolve("youtube.com/@calmcoach").await.unwrap();
        assert_eq!(result.channel_id, CHANNEL);
        assert_eq!(fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_unresolvable_and_feed_errors_are_tagged() {
        let fetcher = Arc::new(ScriptedFetcher::new(|_| ok("<html>nothing here</html>")));
        let err = resolver(fetcher, 50).resolve("@calmcoach").await.unwrap_err();
        assert!(matches!(err, ResolveError::ChannelIdNotFound(_)));

        let fetcher = Arc::new(ScriptedFetcher::new(|_| status(500)));
        let err = resolver(fetcher, 50).resolve(CHANNEL).await.unwrap_err();
        assert!(matches!(err, ResolveError::FeedFetch(_)));

        let fetcher = Arc::new(ScriptedFetcher::new(|_| ok("")));
        let err = resolver(fetcher.clone(), 50).resolve("not a url at all").await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidUrl(_)));
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_large_feed_is_capped() {
        let feed = feed_of(15);
        let fetcher = Arc::new(ScriptedFetcher::new(move |_| ok(&feed)));
        let result = resolver(fetcher, 10).resolve(CHANNEL).await.unwrap();

        assert_eq!(result.videos.len(), 10);
        let mut ids: Vec<_> = result.videos.iter().map(|v| v.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 10);
    }
}
