//! Lenient parsing of reasoning-service output.
//!
//! The service is a black box: its reply may be wrapped in prose or code
//! fences, numbers may arrive as strings, and fields may be missing. Nothing
//! here trusts the shape; every value is validated and clamped.

use super::{clamp_confidence, clamp_score, EmotionalProfile, InsightScores};
use crate::error::{HarvestError, Result};
use serde_json::{Map, Value};

/// One validated candidate before dedup and score gating.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub category: String,
    pub title: String,
    pub insight: String,
    pub supporting_quotes: Vec<String>,
    pub coaching_guidance: String,
    pub anti_patterns: Vec<String>,
    pub emotional_profile: EmotionalProfile,
    pub scores: InsightScores,
    pub confidence: f64,
}

/// Parsed reply: usable candidates plus a count of entries that were dropped.
#[derive(Debug, Clone, Default)]
pub struct ParsedCandidates {
    pub candidates: Vec<Candidate>,
    pub malformed: usize,
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('%').parse().ok(),
        _ => None,
    }
}

fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Lookup accepting both snake_case and camelCase keys.
fn field<'a>(object: &'a Map<String, Value>, snake: &str, camel: &str) -> Option<&'a Value> {
    object.get(snake).or_else(|| object.get(camel))
}

fn category_name(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

impl Candidate {
    /// Build a candidate from one JSON object, or `None` if it has no
    /// usable title or insight text.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let title = text(object.get("title"));
        let insight = text(object.get("insight").or_else(|| object.get("text")));
        if title.is_empty() || insight.is_empty() {
            return None;
        }

        let empty = Map::new();
        let scores = object
            .get("scores")
            .and_then(Value::as_object)
            .unwrap_or(object);
        let score = |key: &str| clamp_score(number(scores.get(key)).unwrap_or(0.0));

        let profile = field(object, "emotional_profile", "emotionalProfile")
            .and_then(Value::as_object)
            .unwrap_or(&empty);

        Some(Self {
            category: category_name(&text(object.get("category"))),
            title,
            insight,
            supporting_quotes: string_list(field(object, "supporting_quotes", "supportingQuotes")),
            coaching_guidance: text(field(object, "coaching_guidance", "coachingGuidance")),
            anti_patterns: string_list(field(object, "anti_patterns", "antiPatterns")),
            emotional_profile: EmotionalProfile {
                tone: text(profile.get("tone")),
                warmth: clamp_score(number(profile.get("warmth")).unwrap_or(0.0)),
                vulnerability: clamp_score(number(profile.get("vulnerability")).unwrap_or(0.0)),
            },
            scores: InsightScores {
                quality: score("quality"),
                specificity: score("specificity"),
                actionability: score("actionability"),
                authenticity: score("authenticity"),
                safety: score("safety"),
            },
            confidence: clamp_confidence(number(object.get("confidence")).unwrap_or(0.0)),
        })
    }
}

/// Locate the candidate array in a reply.
fn candidate_array(reply: &str) -> Option<Vec<Value>> {
    if let Ok(value) = serde_json::from_str::<Value>(reply.trim()) {
        match value {
            Value::Array(items) => return Some(items),
            Value::Object(mut map) => {
                for key in ["insights", "candidates", "results"] {
                    if let Some(Value::Array(items)) = map.remove(key) {
                        return Some(items);
                    }
                }
            }
            _ => {}
        }
    }

    let start = reply.find('[')?;
    let end = reply.rfind(']')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Vec<Value>>(&reply[start..=end]).ok()
}

/// Parse a reasoning-service reply into candidates.
///
/// Fails only when no JSON array of candidates can be found at all.
pub fn parse_candidates(reply: &str) -> Result<ParsedCandidates> {
    let items = candidate_array(reply).ok_or_else(|| {
        HarvestError::Extraction(format!(
            "No candidate array in reply: {}",
            reply.chars().take(200).collect::<String>()
        ))
    })?;

    let mut parsed = ParsedCandidates::default();
    for item in &items {
        match Candidate::from_value(item) {
            Some(candidate) => parsed.candidates.push(candidate),
            None => parsed.malformed += 1,
        }
    }
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_fenced_reply_with_prose() {
        let reply = r#"Here you go:
```json
[
  {"category": "Emotional Regulation", "title": "Name it to tame it",
   "insight": "Labelling a feeling out loud lowers its intensity.",
   "supporting_quotes": ["when I said I was scared, it got smaller"],
   "coaching_guidance": "Invite them to name the feeling in one word.",
   "anti_patterns": ["Telling them to calm down"],
   "emotional_profile": {"tone": "gentle", "warmth": "85", "vulnerability": 60},
   "scores": {"quality": 88, "specificity": "72", "actionability": 80, "authenticity": 90, "safety": 140},
   "confidence": 0.9}
]
```"#;
        let parsed = parse_candidates(reply).unwrap();
        assert_eq!(parsed.candidates.len(), 1);
        let c = &parsed.candidates[0];
        assert_eq!(c.category, "emotional_regulation");
        assert_eq!(c.scores.specificity, 72);
        assert_eq!(c.scores.safety, 100);
        assert_eq!(c.emotional_profile.warmth, 85);
        assert_eq!(c.supporting_quotes.len(), 1);
    }

    #[test]
    fn test_wrapped_object_and_camel_case() {
        let reply = r#"{"insights":[
            {"title":"Repair quickly","insight":"Small repairs beat big apologies.",
             "coachingGuidance":"Suggest a same-day check-in.","quality":70,"safety":90,"confidence":"1.4"},
            {"title":"","insight":"missing title"},
            "not an object"
        ]}"#;
        let parsed = parse_candidates(reply).unwrap();
        assert_eq!(parsed.candidates.len(), 1);
        assert_eq!(parsed.malformed, 2);
        let c = &parsed.candidates[0];
        assert_eq!(c.coaching_guidance, "Suggest a same-day check-in.");
        assert_eq!(c.scores.quality, 70);
        assert_eq!(c.confidence, 1.0);
    }

    #[test]
    fn test_garbage_is_an_extraction_error() {
        assert!(matches!(
            parse_candidates("I'm sorry, I can't help with that."),
            Err(HarvestError::Extraction(_))
        ));
        assert!(parse_candidates("[not json]").is_err());
    }
}
