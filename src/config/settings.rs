//! Configuration settings for Harvest.

use crate::sampling::SamplingOptions;
use crate::transport::{HttpFetcher, RelayConfig, Transport, DEFAULT_USER_AGENT};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub transport: TransportSettings,
    pub transcript: TranscriptSettings,
    pub extraction: ExtractionSettings,
    pub quality: QualityThresholds,
    pub sampling: SamplingOptions,
    pub channel: ChannelSettings,
    pub store: StoreSettings,
    pub prompts: PromptSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory for storing application data.
    pub data_dir: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.harvest".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Rate limiting and relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Minimum gap between any two host requests.
    pub min_request_interval_ms: u64,
    pub max_retries_per_relay: u32,
    /// First retry delay; doubles on each further attempt.
    pub base_backoff_ms: u64,
    pub user_agent: String,
    /// Relays in preference order. Empty means direct only.
    pub relays: Vec<RelayConfig>,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            min_request_interval_ms: 1000,
            max_retries_per_relay: 3,
            base_backoff_ms: 1000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            relays: vec![RelayConfig::direct()],
        }
    }
}

impl TransportSettings {
    /// Build the process-wide transport over `fetcher`.
    pub fn build(&self, fetcher: Arc<dyn HttpFetcher>) -> Transport {
        Transport::new(fetcher, Duration::from_millis(self.min_request_interval_ms))
            .with_relays(self.relays.clone())
            .with_retries(self.max_retries_per_relay)
            .with_backoff(Duration::from_millis(self.base_backoff_ms))
    }
}

/// Transcript acquisition settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptSettings {
    /// Local transcript-extraction backend, e.g. `http://127.0.0.1:8765`.
    pub backend_url: Option<String>,
    /// Open caption mirrors, tried in shuffled order.
    pub mirror_urls: Vec<String>,
    pub backend_timeout_secs: u64,
    pub player_timeout_secs: u64,
    pub timedtext_timeout_secs: u64,
    pub mirror_timeout_secs: u64,
    pub page_timeout_secs: u64,
    pub preferred_language: String,
}

impl Default for TranscriptSettings {
    fn default() -> Self {
        Self {
            backend_url: None,
            mirror_urls: Vec::new(),
            backend_timeout_secs: 30,
            player_timeout_secs: 15,
            timedtext_timeout_secs: 10,
            mirror_timeout_secs: 10,
            page_timeout_secs: 20,
            preferred_language: "en".to_string(),
        }
    }
}

/// An extraction category and the hint given to the model for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    #[serde(default)]
    pub hint: String,
}

impl CategorySpec {
    pub fn new(name: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            hint: hint.to_string(),
        }
    }
}

/// Insight extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// Chat model used for extraction.
    pub model: String,
    /// Transcripts longer than this are truncated, not chunked.
    pub max_transcript_chars: usize,
    pub temperature: f32,
    /// Request timeout for the reasoning service.
    pub timeout_secs: u64,
    pub categories: Vec<CategorySpec>,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_transcript_chars: 15_000,
            temperature: 0.4,
            timeout_secs: 120,
            categories: vec![
                CategorySpec::new(
                    "emotional_regulation",
                    "How people notice, name and settle strong feelings in the moment",
                ),
                CategorySpec::new(
                    "communication",
                    "Concrete phrasing that helps people feel heard during hard conversations",
                ),
                CategorySpec::new(
                    "relationships",
                    "Patterns that build or erode trust between partners, friends and family",
                ),
                CategorySpec::new(
                    "self_compassion",
                    "Ways people respond to their own mistakes without shame",
                ),
                CategorySpec::new(
                    "habits",
                    "Small repeatable practices that make change stick",
                ),
            ],
        }
    }
}

impl ExtractionSettings {
    /// Categories restricted to `names`, or all configured ones when empty.
    /// Unknown names get an empty hint.
    pub fn select_categories(&self, names: &[String]) -> Vec<CategorySpec> {
        if names.is_empty() {
            return self.categories.clone();
        }
        names
            .iter()
            .map(|name| {
                self.categories
                    .iter()
                    .find(|c| c.name == *name)
                    .cloned()
                    .unwrap_or_else(|| CategorySpec::new(name, ""))
            })
            .collect()
    }
}

/// Score floors and review triggers applied to extracted candidates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityThresholds {
    pub min_quality: u8,
    pub min_specificity: u8,
    pub min_safety: u8,
    /// Below this the candidate is accepted but flagged for review.
    pub min_confidence: f64,
    /// Quality below this is accepted but flagged for review.
    pub human_review_trigger: u8,
    /// Reserved for semantic dedup; unused by exact hashing.
    pub duplicate_similarity: f64,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_quality: 60,
            min_specificity: 50,
            min_safety: 80,
            min_confidence: 0.6,
            human_review_trigger: 75,
            duplicate_similarity: 0.85,
        }
    }
}

/// Channel resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    /// Feeds with more entries are sampled down uniformly.
    pub max_feed_videos: usize,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self { max_feed_videos: 50 }
    }
}

/// Record store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    /// Path to the SQLite database.
    pub sqlite_path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            sqlite_path: "~/.harvest/harvest.db".to_string(),
        }
    }
}

/// Prompt customization settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct PromptSettings {
    /// Directory for custom prompts (overrides defaults).
    pub custom_dir: Option<String>,
    /// Custom variables available in all prompts as {{variable_name}}.
    pub variables: std::collections::HashMap<String, String>,
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::HarvestError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("harvest")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded SQLite database path.
    pub fn sqlite_path(&self) -> PathBuf {
        Self::expand_path(&self.store.sqlite_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::SamplingStrategy;
    use crate::transport::RelayKind;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let settings: Settings = toml::from_str(
            r#"
[transport]
min_request_interval_ms = 250
relays = [
  { name = "direct" },
  { name = "edge", kind = "query", url = "https://edge.example/?u=" },
]

[sampling]
strategy = "engagement"
max_videos = 10

[quality]
min_safety = 90
"#,
        )
        .unwrap();

        assert_eq!(settings.transport.min_request_interval_ms, 250);
        assert_eq!(settings.transport.max_retries_per_relay, 3);
        assert_eq!(settings.transport.relays[1].kind, RelayKind::Query);
        assert_eq!(settings.sampling.strategy, SamplingStrategy::Engagement);
        assert_eq!(settings.sampling.popular_percent, 40);
        assert_eq!(settings.quality.min_safety, 90);
        assert_eq!(settings.quality.min_quality, 60);
        assert_eq!(settings.extraction.max_transcript_chars, 15_000);
        assert_eq!(settings.transcript.preferred_language, "en");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut settings = Settings::default();
        settings.transcript.backend_url = Some("http://127.0.0.1:8765".to_string());
        settings.channel.max_feed_videos = 12;
        settings.save_to(&path).unwrap();

        let loaded = Settings::load_from(Some(&path)).unwrap();
        assert_eq!(loaded.transcript.backend_url, settings.transcript.backend_url);
        assert_eq!(loaded.channel.max_feed_videos, 12);
        assert_eq!(loaded.extraction.categories, settings.extraction.categories);
    }

    #[test]
    fn test_select_categories() {
        let extraction = ExtractionSettings::default();
        assert_eq!(extraction.select_categories(&[]).len(), 5);

        let picked = extraction.select_categories(&["habits".to_string(), "grief".to_string()]);
        assert_eq!(picked[0].name, "habits");
        assert!(!picked[0].hint.is_empty());
        assert_eq!(picked[1], CategorySpec::new("grief", ""));
    }
}
