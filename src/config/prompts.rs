//! Prompt templates for Harvest.
//!
//! Prompts can be customized by placing TOML files in the custom prompts directory.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Collection of all prompt templates.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Prompts {
    pub extraction: ExtractionPrompts,
    /// System message written into exported training examples.
    pub export: ExportPrompts,
    /// Custom variables from config, available in all prompts.
    #[serde(skip)]
    pub variables: HashMap<String, String>,
}

/// Prompts for insight extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionPrompts {
    pub system: String,
    pub user: String,
}

impl Default for ExtractionPrompts {
    fn default() -> Self {
        Self {
            system: r#"You are an analyst building a dataset of practical coaching insights from spoken video content.

You read transcripts and pull out specific, grounded patterns about how people think, feel and act, together with the guidance a thoughtful coach would give.

Guidelines:
- Only use what the speaker actually says; never invent quotes
- Prefer concrete, specific observations over generic advice
- Skip sponsor reads, channel promotion, intros and outros
- Score honestly: most candidates are not 90+
- Flag anything that could cause harm if repeated as advice with a low safety score
- Respond with JSON only"#
                .to_string(),

            user: r#"Video: {{video_title}}
Channel: {{channel_name}}

Extract between 3 and 8 insights from the transcript below. Only use these categories:
{{categories}}

For each insight return an object with:
- "category": one of the category names above
- "title": a short descriptive title (3-10 words)
- "insight": the pattern, stated in 1-3 sentences
- "supporting_quotes": 1-3 short verbatim quotes from the transcript
- "coaching_guidance": what a coach would say or do in response
- "anti_patterns": responses that would make things worse
- "emotional_profile": {"tone": string, "warmth": 0-100, "vulnerability": 0-100}
- "scores": {"quality": 0-100, "specificity": 0-100, "actionability": 0-100, "authenticity": 0-100, "safety": 0-100}
- "confidence": 0.0-1.0, how sure you are the insight is supported by the transcript

Respond with a JSON array of insight objects.

Transcript:
{{transcript}}"#
                .to_string(),
        }
    }
}

/// Prompts used when exporting approved insights as training examples.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportPrompts {
    pub system: String,
}

impl Default for ExportPrompts {
    fn default() -> Self {
        Self {
            system: "You are a warm, practical coach. You listen first, name what you notice, and offer specific next steps without lecturing.".to_string(),
        }
    }
}

impl Prompts {
    /// Load prompts from the default location, with optional custom directory and variables.
    pub fn load(
        custom_dir: Option<&str>,
        custom_variables: Option<&HashMap<String, String>>,
    ) -> crate::error::Result<Self> {
        let mut prompts = Prompts::default();

        if let Some(vars) = custom_variables {
            prompts.variables = vars.clone();
        }

        if let Some(dir) = custom_dir {
            let custom_path = PathBuf::from(shellexpand::tilde(dir).to_string());

            let extraction_path = custom_path.join("extraction.toml");
            if extraction_path.exists() {
                let content = std::fs::read_to_string(&extraction_path)?;
                prompts.extraction = toml::from_str(&content)?;
            }

            let export_path = custom_path.join("export.toml");
            if export_path.exists() {
                let content = std::fs::read_to_string(&export_path)?;
                prompts.export = toml::from_str(&content)?;
            }
        }

        Ok(prompts)
    }

    /// Render a prompt template with the given variables.
    pub fn render(template: &str, vars: &HashMap<String, String>) -> String {
        let mut result = template.to_string();
        for (key, value) in vars {
            result = result.replace(&format!("{{{{{}}}}}", key), value);
        }
        result
    }

    /// Render a prompt template with both provided variables and custom config variables.
    /// Provided variables take precedence over custom config variables.
    pub fn render_with_custom(&self, template: &str, vars: &HashMap<String, String>) -> String {
        let mut merged = self.variables.clone();
        for (key, value) in vars {
            merged.insert(key.clone(), value.clone());
        }
        Self::render(template, &merged)
    }
}
