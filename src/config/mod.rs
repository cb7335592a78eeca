//! Configuration module for Harvest.
//!
//! Handles loading and managing application settings and prompt templates.

mod prompts;
mod settings;

pub use prompts::{ExportPrompts, ExtractionPrompts, Prompts};
pub use settings::{
    CategorySpec, ChannelSettings, ExtractionSettings, GeneralSettings, PromptSettings,
    QualityThresholds, Settings, StoreSettings, TranscriptSettings, TransportSettings,
};
