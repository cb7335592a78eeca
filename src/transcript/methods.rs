//! The five acquisition methods.

use super::formats::{parse_captions, parse_simple_json};
use super::tracks::{extract_caption_tracks, has_no_captions_signal, select_track, CaptionTrack};
use super::{TranscriptAcquirer, TranscriptSegment};
use crate::error::{HarvestError, Result};
use crate::transport::FetchRequest;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};
use url::form_urlencoded::byte_serialize;

const WATCH_BASE: &str = "https://www.youtube.com/watch";
const TIMEDTEXT_BASE: &str = "https://www.youtube.com/api/timedtext";

/// Error markers the backend uses for videos without captions.
const BACKEND_NO_CAPTION_MARKERS: [&str; 3] =
    ["TranscriptsDisabled", "NoTranscriptFound", "no captions"];

fn encode(value: &str) -> String {
    byte_serialize(value.as_bytes()).collect()
}

/// Track list returned by a caption mirror.
#[derive(Debug, Deserialize)]
struct MirrorTrackList {
    #[serde(default)]
    captions: Vec<MirrorTrack>,
}

#[derive(Debug, Deserialize)]
struct MirrorTrack {
    #[serde(default)]
    label: String,
    #[serde(rename = "languageCode", default)]
    language_code: String,
    url: String,
}

impl TranscriptAcquirer {
    fn watch_url(video_id: &str) -> String {
        format!("{}?v={}&hl=en", WATCH_BASE, encode(video_id))
    }

    /// Tracks from a watch page, or a definitive error if the page says
    /// there are none. `Ok(None)` means nothing was found either way.
    fn tracks_from_page(&self, video_id: &str, html: &str) -> Result<Option<Vec<CaptionTrack>>> {
        if let Some((extractor, tracks)) = extract_caption_tracks(html, &self.extractors) {
            debug!(video_id, extractor, "Caption tracks located");
            return Ok(Some(tracks));
        }
        if has_no_captions_signal(html) {
            return Err(HarvestError::NoCaptions(video_id.to_string()));
        }
        Ok(None)
    }

    async fn fetch_track_via_relays(
        &self,
        track: &CaptionTrack,
        timeout: Duration,
    ) -> Result<Vec<TranscriptSegment>> {
        let request = FetchRequest::get(track.fetch_url()).with_timeout(timeout);
        let response = self.transport.fetch_with_relay_fallback(&request, None).await?;
        Ok(parse_captions(&response.body))
    }

    /// Method 1: the local transcript backend.
    pub(super) async fn via_backend(&self, video_id: &str) -> Result<Vec<TranscriptSegment>> {
        let Some(base) = self.settings.backend_url.as_deref() else {
            return Ok(Vec::new());
        };
        let url = format!(
            "{}/transcript?video_id={}&lang={}",
            base.trim_end_matches('/'),
            encode(video_id),
            encode(&self.settings.preferred_language)
        );
        let request = FetchRequest::get(&url)
            .with_timeout(Self::timeout(self.settings.backend_timeout_secs));
        let response = self.transport.local_fetch(&request).await?;

        let body: Value = serde_json::from_str(&response.body).unwrap_or(Value::Null);
        let error = body["error"].as_str().unwrap_or_default();
        if body["no_captions"].as_bool() == Some(true)
            || BACKEND_NO_CAPTION_MARKERS.iter().any(|m| error.contains(m))
        {
            return Err(HarvestError::NoCaptions(video_id.to_string()));
        }
        if !response.is_success() {
            return Err(HarvestError::Transport(format!(
                "backend returned HTTP {}{}",
                response.status,
                if error.is_empty() { String::new() } else { format!(": {}", error) }
            )));
        }

        let segments = parse_simple_json(&response.body);
        if !segments.is_empty() {
            return Ok(segments);
        }
        // Some backend builds return only the flattened text.
        Ok(body["transcript"]
            .as_str()
            .map(parse_captions)
            .unwrap_or_default())
    }

    /// Method 2: caption tracks from the watch page's player config.
    pub(super) async fn via_player_config(&self, video_id: &str) -> Result<Vec<TranscriptSegment>> {
        let timeout = Self::timeout(self.settings.player_timeout_secs);
        let url = Self::watch_url(video_id);
        let page = self
            .transport
            .rate_limited_fetch(&FetchRequest::get(&url).with_timeout(timeout))
            .await?
            .error_for_status(&url)?;

        let Some(tracks) = self.tracks_from_page(video_id, &page.body)? else {
            return Ok(Vec::new());
        };
        let Some(track) = select_track(&tracks, &self.settings.preferred_language) else {
            return Ok(Vec::new());
        };

        let request = FetchRequest::get(track.fetch_url()).with_timeout(timeout);
        match self.transport.rate_limited_fetch(&request).await {
            Ok(response) if response.is_success() => {
                let segments = parse_captions(&response.body);
                if !segments.is_empty() {
                    return Ok(segments);
                }
                debug!(video_id, "Direct track fetch was empty, trying relays");
            }
            Ok(response) => {
                debug!(video_id, status = response.status, "Direct track fetch failed, trying relays");
            }
            Err(e) => debug!(video_id, error = %e, "Direct track fetch failed, trying relays"),
        }
        self.fetch_track_via_relays(track, timeout).await
    }

    /// Method 3: the caption endpoint, human-authored first then generated.
    pub(super) async fn via_timedtext(&self, video_id: &str) -> Result<Vec<TranscriptSegment>> {
        let timeout = Self::timeout(self.settings.timedtext_timeout_secs);
        let base = format!(
            "{}?v={}&lang={}",
            TIMEDTEXT_BASE,
            encode(video_id),
            encode(&self.settings.preferred_language)
        );
        let mut last_error = None;

        for url in [base.clone(), format!("{}&kind=asr", base)] {
            match self
                .transport
                .rate_limited_fetch(&FetchRequest::get(&url).with_timeout(timeout))
                .await
            {
                Ok(response) if response.is_success() => {
                    let segments = parse_captions(&response.body);
                    if !segments.is_empty() {
                        return Ok(segments);
                    }
                }
                Ok(response) => {
                    last_error = Some(HarvestError::Transport(format!(
                        "HTTP {} from {}",
                        response.status, url
                    )))
                }
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(Vec::new()),
        }
    }

    /// Method 4: third-party caption mirrors.
    pub(super) async fn via_mirrors(&self, video_id: &str) -> Result<Vec<TranscriptSegment>> {
        let timeout = Self::timeout(self.settings.mirror_timeout_secs);

        for mirror in self.ordered_mirrors() {
            match self.try_mirror(&mirror, video_id, timeout).await {
                Ok(segments) if !segments.is_empty() => return Ok(segments),
                Ok(_) => debug!(video_id, mirror = %mirror, "Mirror had no usable captions"),
                Err(e) => warn!(video_id, mirror = %mirror, error = %e, "Mirror failed"),
            }
        }
        Ok(Vec::new())
    }

    async fn try_mirror(
        &self,
        mirror: &str,
        video_id: &str,
        timeout: Duration,
    ) -> Result<Vec<TranscriptSegment>> {
        let base = mirror.trim_end_matches('/');
        let list_url = format!("{}/api/v1/captions/{}", base, encode(video_id));
        let listing = self
            .transport
            .rate_limited_fetch(&FetchRequest::get(&list_url).with_timeout(timeout))
            .await?
            .error_for_status(&list_url)?;

        let tracks: MirrorTrackList = serde_json::from_str(&listing.body)?;
        let language = &self.settings.preferred_language;
        let Some(track) = tracks
            .captions
            .iter()
            .find(|t| t.language_code.starts_with(language.as_str()))
            .or_else(|| tracks.captions.first())
        else {
            return Ok(Vec::new());
        };
        debug!(video_id, label = %track.label, "Selected mirror track");

        let track_url = if track.url.starts_with("http") {
            track.url.clone()
        } else {
            format!("{}{}", base, track.url)
        };
        let body = self
            .transport
            .rate_limited_fetch(&FetchRequest::get(&track_url).with_timeout(timeout))
            .await?
            .error_for_status(&track_url)?;
        Ok(parse_captions(&body.body))
    }

    /// Method 5: the full watch page through the relay chain.
    pub(super) async fn via_page_scrape(&self, video_id: &str) -> Result<Vec<TranscriptSegment>> {
        let timeout = Self::timeout(self.settings.page_timeout_secs);
        let request = FetchRequest::get(Self::watch_url(video_id)).with_timeout(timeout);
        let page = self.transport.fetch_with_relay_fallback(&request, None).await?;

        let Some(tracks) = self.tracks_from_page(video_id, &page.body)? else {
            return Ok(Vec::new());
        };
        match select_track(&tracks, &self.settings.preferred_language) {
            Some(track) => self.fetch_track_via_relays(track, timeout).await,
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tracks::tests::{player_page, TRACKS};
    use super::super::{AcquisitionMethod, MirrorOrdering, NO_CAPTIONS};
    use super::*;
    use crate::config::TranscriptSettings;
    use crate::transport::testing::{ok, status, ScriptedFetcher};
    use crate::transport::{RelayConfig, Transport};
    use std::sync::Arc;

    const JSON3: &str = r#"{"events":[{"tStartMs":0,"dDurationMs":1000,"segs":[{"utf8":"hello"}]},{"tStartMs":1000,"dDurationMs":1000,"segs":[{"utf8":"world"}]}]}"#;
    const XML: &str = r#"<?xml version="1.0"?><transcript><text start="0" dur="2">first line</text><text start="2" dur="2">second line</text></transcript>"#;
    const NO_CAPTIONS_PAGE: &str = r#"<script>var ytInitialPlayerResponse = {"playabilityStatus":{"status":"OK"},"videoDetails":{"videoId":"abc"}};</script>"#;

    fn acquirer(fetcher: Arc<ScriptedFetcher>, settings: TranscriptSettings) -> TranscriptAcquirer {
        let transport = Transport::new(fetcher, Duration::ZERO)
            .with_relays(vec![
                RelayConfig::direct(),
                RelayConfig::prefix("relay", "https://relay.example/"),
            ])
            .with_backoff(Duration::ZERO)
            .with_retries(1);
        TranscriptAcquirer::new(Arc::new(transport), settings)
            .with_mirror_ordering(MirrorOrdering::AsConfigured)
    }

    #[tokio::test]
    async fn test_no_captions_short_circuits_chain() {
        let fetcher = Arc::new(ScriptedFetcher::new(|req| {
            if req.url.contains("/watch") {
                ok(NO_CAPTIONS_PAGE)
            } else {
                ok(XML)
            }
        }));
        let settings = TranscriptSettings {
            mirror_urls: vec!["https://mirror.example".to_string()],
            ..TranscriptSettings::default()
        };
        let result = acquirer(fetcher.clone(), settings).acquire("abc").await;

        assert_eq!(result.transcript, "");
        assert_eq!(result.error.as_deref(), Some(NO_CAPTIONS));
        assert!(result.definitive);
        assert_eq!(fetcher.calls().len(), 1);
        assert_eq!(fetcher.count_matching("timedtext"), 0);
        assert_eq!(fetcher.count_matching("mirror.example"), 0);
    }

    #[tokio::test]
    async fn test_player_config_success() {
        let page = player_page(TRACKS);
        let fetcher = Arc::new(ScriptedFetcher::new(move |req| {
            if req.url.contains("/watch") {
                ok(&page)
            } else if req.url.contains("name=manual") {
                ok(JSON3)
            } else {
                status(404)
            }
        }));
        let result = acquirer(fetcher.clone(), TranscriptSettings::default())
            .acquire("abc")
            .await;

        assert!(result.is_success());
        assert_eq!(result.method, Some(AcquisitionMethod::PlayerConfig));
        assert_eq!(result.transcript, "hello world");
        assert_eq!(result.segments[1].start, 1.0);
        assert_eq!(fetcher.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_timedtext_falls_back_to_generated_captions() {
        let fetcher = Arc::new(ScriptedFetcher::new(|req| {
            if req.url.contains("/watch") {
                status(500)
            } else if req.url.contains("kind=asr") {
                ok(XML)
            } else {
                ok("")
            }
        }));
        let result = acquirer(fetcher.clone(), TranscriptSettings::default())
            .acquire("abc")
            .await;

        assert_eq!(result.method, Some(AcquisitionMethod::TimedText));
        assert_eq!(result.transcript, "first line second line");
        assert_eq!(fetcher.count_matching("kind=asr"), 1);
    }

    #[tokio::test]
    async fn test_backend_no_captions_is_definitive() {
        let fetcher = Arc::new(ScriptedFetcher::new(|req| {
            if req.url.starts_with("http://127.0.0.1:8765/transcript") {
                ok(r#"{"error":"TranscriptsDisabled","no_captions":true}"#)
            } else {
                ok(XML)
            }
        }));
        let settings = TranscriptSettings {
            backend_url: Some("http://127.0.0.1:8765".to_string()),
            ..TranscriptSettings::default()
        };
        let result = acquirer(fetcher.clone(), settings).acquire("abc").await;

        assert!(result.definitive);
        assert_eq!(result.error.as_deref(), Some(NO_CAPTIONS));
        assert_eq!(fetcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_backend_segments_win() {
        let fetcher = Arc::new(ScriptedFetcher::new(|_| {
            ok(r#"{"segments":[{"text":"from backend","start":0.0,"duration":1.5}]}"#)
        }));
        let settings = TranscriptSettings {
            backend_url: Some("http://127.0.0.1:8765/".to_string()),
            ..TranscriptSettings::default()
        };
        let result = acquirer(fetcher.clone(), settings).acquire("abc").await;

        assert_eq!(result.method, Some(AcquisitionMethod::Backend));
        assert_eq!(result.transcript, "from backend");
        assert_eq!(
            fetcher.calls(),
            vec!["http://127.0.0.1:8765/transcript?video_id=abc&lang=en".to_string()]
        );
    }

    #[tokio::test]
    async fn test_mirrors_tried_until_one_answers() {
        let vtt = "WEBVTT\n\n00:00:00.000 --> 00:00:02.000\nmirror text\n";
        let fetcher = Arc::new(ScriptedFetcher::new(move |req| {
            let url = req.url.as_str();
            if url.starts_with("https://down.example") {
                status(503)
            } else if url == "https://up.example/api/v1/captions/abc" {
                ok(r#"{"captions":[{"label":"Deutsch","languageCode":"de","url":"/api/v1/captions/abc?label=Deutsch"},{"label":"English","languageCode":"en","url":"/api/v1/captions/abc?label=English"}]}"#)
            } else if url == "https://up.example/api/v1/captions/abc?label=English" {
                ok(vtt)
            } else if url.contains("/watch") {
                ok("<html>consent</html>")
            } else {
                ok("")
            }
        }));
        let settings = TranscriptSettings {
            mirror_urls: vec![
                "https://down.example".to_string(),
                "https://up.example/".to_string(),
            ],
            ..TranscriptSettings::default()
        };
        let result = acquirer(fetcher.clone(), settings).acquire("abc").await;

        assert_eq!(result.method, Some(AcquisitionMethod::Mirror));
        assert_eq!(result.transcript, "mirror text");
        assert_eq!(fetcher.count_matching("down.example"), 1);
        assert_eq!(fetcher.count_matching("label=Deutsch"), 0);
    }

    #[tokio::test]
    async fn test_page_scrape_through_relay() {
        let page = player_page(TRACKS);
        let fetcher = Arc::new(ScriptedFetcher::new(move |req| {
            let url = req.url.as_str();
            if let Some(target) = url.strip_prefix("https://relay.example/") {
                if target.contains("/watch") {
                    ok(&page)
                } else {
                    ok(XML)
                }
            } else {
                status(403)
            }
        }));
        let result = acquirer(fetcher.clone(), TranscriptSettings::default())
            .acquire("abc")
            .await;

        assert_eq!(result.method, Some(AcquisitionMethod::PageScrape));
        assert_eq!(result.transcript, "first line second line");
    }

    #[tokio::test]
    async fn test_all_methods_failing_is_not_definitive() {
        let fetcher = Arc::new(ScriptedFetcher::new(|_| status(500)));
        let result = acquirer(fetcher, TranscriptSettings::default())
            .acquire("abc")
            .await;

        assert!(!result.is_success());
        assert!(!result.definitive);
        assert!(result.error.unwrap().starts_with("all methods failed"));
    }
}
