//! Prompt building, score gating and dedup for one transcript.

use super::parse::{parse_candidates, Candidate};
use super::reasoning::ReasoningService;
use super::{Insight, InsightSource, ReviewState, REASON_BORDERLINE_QUALITY, REASON_LOW_CONFIDENCE};
use crate::channel::VideoRef;
use crate::config::{CategorySpec, Prompts, QualityThresholds};
use crate::dedup::{insight_hash, DedupStore};
use crate::error::Result;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

/// What happened to the candidates from one video.
#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    /// Accepted insights. Their hashes are checked against the dedup store
    /// but not yet claimed in it.
    pub accepted: Vec<Insight>,
    /// Candidates the reply contained, including malformed ones.
    pub candidates: usize,
    pub rejected_low_quality: usize,
    pub duplicates: usize,
    /// Accepted but marked for human review.
    pub flagged: usize,
    pub malformed: usize,
}

impl ExtractionOutcome {
    /// Hashes of the accepted insights, in order.
    pub fn accepted_hashes(&self) -> Vec<String> {
        self.accepted.iter().map(|i| i.content_hash.clone()).collect()
    }

    /// Keep only insights whose hash was claimed; the rest lost a race with
    /// another writer and count as duplicates.
    pub fn keep_claimed(&mut self, claimed: &[String]) {
        let before = self.accepted.len();
        self.accepted.retain(|i| claimed.contains(&i.content_hash));
        self.duplicates += before - self.accepted.len();
        self.flagged = self.accepted.iter().filter(|i| i.needs_human_review).count();
    }
}

/// Score-gate verdict for one candidate.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Reject(String),
    Accept { review_reasons: Vec<String> },
}

/// Apply the score floors, then the review triggers.
pub fn assess(candidate: &Candidate, thresholds: &QualityThresholds) -> Verdict {
    let scores = &candidate.scores;
    if scores.quality < thresholds.min_quality {
        return Verdict::Reject(format!("quality {} < {}", scores.quality, thresholds.min_quality));
    }
    if scores.specificity < thresholds.min_specificity {
        return Verdict::Reject(format!(
            "specificity {} < {}",
            scores.specificity, thresholds.min_specificity
        ));
    }
    if scores.safety < thresholds.min_safety {
        return Verdict::Reject(format!("safety {} < {}", scores.safety, thresholds.min_safety));
    }

    let mut review_reasons = Vec::new();
    if candidate.confidence < thresholds.min_confidence {
        review_reasons.push(REASON_LOW_CONFIDENCE.to_string());
    }
    if scores.quality < thresholds.human_review_trigger {
        review_reasons.push(REASON_BORDERLINE_QUALITY.to_string());
    }
    Verdict::Accept { review_reasons }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

/// Turns transcripts into gated, deduplicated insights.
pub struct InsightExtractor {
    reasoning: Arc<dyn ReasoningService>,
    dedup: Arc<DedupStore>,
    prompts: Prompts,
    thresholds: QualityThresholds,
    max_transcript_chars: usize,
}

impl InsightExtractor {
    pub fn new(reasoning: Arc<dyn ReasoningService>, dedup: Arc<DedupStore>) -> Self {
        Self {
            reasoning,
            dedup,
            prompts: Prompts::default(),
            thresholds: QualityThresholds::default(),
            max_transcript_chars: 15_000,
        }
    }

    pub fn with_prompts(mut self, prompts: Prompts) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn with_thresholds(mut self, thresholds: QualityThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_max_transcript_chars(mut self, max_chars: usize) -> Self {
        self.max_transcript_chars = max_chars;
        self
    }

    /// Build the user prompt for one transcript.
    pub fn build_prompt(&self, video: &VideoRef, transcript: &str, categories: &[CategorySpec]) -> String {
        let category_lines = categories
            .iter()
            .map(|c| {
                if c.hint.is_empty() {
                    format!("- {}", c.name)
                } else {
                    format!("- {}: {}", c.name, c.hint)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");

        let mut vars = HashMap::new();
        vars.insert("video_title".to_string(), video.title.clone());
        vars.insert("channel_name".to_string(), video.channel_name.clone());
        vars.insert("categories".to_string(), category_lines);
        vars.insert(
            "transcript".to_string(),
            truncate_chars(transcript, self.max_transcript_chars).to_string(),
        );

        self.prompts.render_with_custom(&self.prompts.extraction.user, &vars)
    }

    /// Extract insights for one video.
    ///
    /// A malformed reply fails with `Extraction`; a service failure is
    /// returned unchanged. Candidates are checked against the dedup store
    /// and against each other, but nothing is written: the caller claims
    /// the accepted hashes once the insights are stored.
    #[instrument(skip(self, transcript, categories), fields(video_id = %video.id))]
    pub async fn extract(
        &self,
        video: &VideoRef,
        transcript: &str,
        categories: &[CategorySpec],
    ) -> Result<ExtractionOutcome> {
        let prompt = self.build_prompt(video, transcript, categories);
        let system = self
            .prompts
            .render_with_custom(&self.prompts.extraction.system, &HashMap::new());

        let reply = self.reasoning.complete(&system, &prompt).await?;
        let parsed = parse_candidates(&reply)?;

        let mut outcome = ExtractionOutcome {
            candidates: parsed.candidates.len() + parsed.malformed,
            malformed: parsed.malformed,
            ..ExtractionOutcome::default()
        };
        let fallback_category = categories.first().map(|c| c.name.clone()).unwrap_or_default();
        let known = self.dedup.snapshot().await?;
        let mut seen = HashSet::new();

        for candidate in parsed.candidates {
            let hash = insight_hash(&candidate.title, &candidate.insight);
            if known.contains(&hash) || seen.contains(&hash) {
                debug!(title = %candidate.title, "Duplicate candidate");
                outcome.duplicates += 1;
                continue;
            }

            let review_reasons = match assess(&candidate, &self.thresholds) {
                Verdict::Reject(reason) => {
                    debug!(title = %candidate.title, %reason, "Candidate below floor");
                    outcome.rejected_low_quality += 1;
                    continue;
                }
                Verdict::Accept { review_reasons } => review_reasons,
            };

            seen.insert(hash.clone());
            let needs_human_review = !review_reasons.is_empty();
            if needs_human_review {
                outcome.flagged += 1;
            }

            outcome.accepted.push(Insight {
                id: Uuid::new_v4(),
                source: InsightSource::from(video),
                category: if candidate.category.is_empty() {
                    fallback_category.clone()
                } else {
                    candidate.category
                },
                title: candidate.title,
                insight: candidate.insight,
                supporting_quotes: candidate.supporting_quotes,
                coaching_guidance: candidate.coaching_guidance,
                anti_patterns: candidate.anti_patterns,
                emotional_profile: candidate.emotional_profile,
                scores: candidate.scores,
                confidence: candidate.confidence,
                review_state: ReviewState::Pending,
                needs_human_review,
                review_reasons,
                rejection_reason: None,
                content_hash: hash,
                created_at: Utc::now(),
                reviewed_at: None,
            });
        }

        info!(
            accepted = outcome.accepted.len(),
            flagged = outcome.flagged,
            duplicates = outcome.duplicates,
            rejected = outcome.rejected_low_quality,
            malformed = outcome.malformed,
            "Extraction complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{candidate_json, ScriptedReasoning};
    use super::*;
    use crate::error::HarvestError;
    use crate::sampling::tests::video;
    use crate::store::{MemoryKeyValueStore, Records};

    fn extractor(reasoning: ScriptedReasoning) -> (InsightExtractor, Arc<ScriptedReasoning>) {
        let (extractor, reasoning, _) = extractor_with_dedup(reasoning);
        (extractor, reasoning)
    }

    fn extractor_with_dedup(
        reasoning: ScriptedReasoning,
    ) -> (InsightExtractor, Arc<ScriptedReasoning>, Arc<DedupStore>) {
        let reasoning = Arc::new(reasoning);
        let dedup = Arc::new(DedupStore::new(Records::new(Arc::new(MemoryKeyValueStore::new()))));
        (
            InsightExtractor::new(reasoning.clone(), dedup.clone()),
            reasoning,
            dedup,
        )
    }

    fn categories() -> Vec<CategorySpec> {
        vec![CategorySpec::new("communication", "Being heard")]
    }

    #[tokio::test]
    async fn test_low_confidence_accepted_but_flagged() {
        let reply = format!("[{}]", candidate_json("Pause before replying", 85, 85, 95, 0.5));
        let (extractor, _) = extractor(ScriptedReasoning::replying(&reply));

        let outcome = extractor
            .extract(&video("vid00000001", 10, Some(1000)), "some transcript", &categories())
            .await
            .unwrap();

        assert_eq!(outcome.accepted.len(), 1);
        let insight = &outcome.accepted[0];
        assert!(insight.needs_human_review);
        assert_eq!(insight.review_reasons, vec!["Low confidence".to_string()]);
        assert_eq!(insight.review_state, ReviewState::Pending);
        assert_eq!(outcome.flagged, 1);
    }

    #[tokio::test]
    async fn test_score_floors() {
        let reply = format!(
            "[{}]",
            [
                candidate_json("Low quality", 59, 90, 95, 0.9),
                candidate_json("Vague", 90, 49, 95, 0.9),
                candidate_json("Risky", 90, 90, 79, 0.9),
                candidate_json("Borderline", 70, 60, 80, 0.9),
                candidate_json("Strong", 90, 90, 99, 0.9),
            ]
            .join(",")
        );
        let (extractor, _) = extractor(ScriptedReasoning::replying(&reply));

        let outcome = extractor
            .extract(&video("vid00000001", 10, Some(1000)), "t", &categories())
            .await
            .unwrap();

        assert_eq!(outcome.rejected_low_quality, 3);
        assert_eq!(outcome.accepted.len(), 2);
        assert!(outcome.accepted.iter().all(|i| i.scores.safety >= 80));

        let borderline = &outcome.accepted[0];
        assert_eq!(borderline.title, "Borderline");
        assert_eq!(
            borderline.review_reasons,
            vec!["Quality below review threshold".to_string()]
        );
        assert!(!outcome.accepted[1].needs_human_review);
    }

    #[tokio::test]
    async fn test_duplicates_across_and_within_replies() {
        let reply = format!(
            "[{},{}]",
            candidate_json("Mirror their words", 90, 90, 95, 0.9),
            candidate_json("mirror THEIR words!", 90, 90, 95, 0.9),
        );
        let (extractor, _, dedup) = extractor_with_dedup(ScriptedReasoning::replying(&reply));
        let v = video("vid00000001", 10, Some(1000));

        let first = extractor.extract(&v, "t", &categories()).await.unwrap();
        assert_eq!(first.accepted.len(), 1);
        assert_eq!(first.duplicates, 1);
        // Extraction only checks; nothing is claimed yet.
        assert!(dedup.is_empty().await.unwrap());

        dedup.claim(&first.accepted_hashes()).await.unwrap();
        let second = extractor.extract(&v, "t", &categories()).await.unwrap();
        assert!(second.accepted.is_empty());
        assert_eq!(second.duplicates, 2);
    }

    #[tokio::test]
    async fn test_transcript_is_truncated() {
        let (extractor, reasoning) = extractor(ScriptedReasoning::replying("[]"));
        let mut prompts = Prompts::default();
        prompts.extraction.user = "{{transcript}}".to_string();
        let extractor = extractor.with_prompts(prompts).with_max_transcript_chars(15_000);

        let transcript = "é".repeat(20_000);
        extractor
            .extract(&video("vid00000001", 10, None), &transcript, &categories())
            .await
            .unwrap();

        let prompts = reasoning.prompts();
        assert_eq!(prompts[0].chars().count(), 15_000);
    }

    #[tokio::test]
    async fn test_prompt_lists_categories_with_hints() {
        let (extractor, _) = extractor(ScriptedReasoning::replying("[]"));
        let prompt = extractor.build_prompt(
            &video("vid00000001", 10, None),
            "hello",
            &[CategorySpec::new("habits", "Small practices"), CategorySpec::new("grief", "")],
        );
        assert!(prompt.contains("- habits: Small practices\n- grief"));
        assert!(prompt.contains("hello"));
    }

    #[tokio::test]
    async fn test_failures_are_classified() {
        let (malformed, _) = extractor(ScriptedReasoning::replying("no json here"));
        let err = malformed
            .extract(&video("vid00000001", 10, None), "t", &categories())
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Extraction(_)));

        let (offline, _) = extractor(ScriptedReasoning::new(|_| {
            Err(HarvestError::Reasoning("401 Unauthorized".to_string()))
        }));
        let err = offline
            .extract(&video("vid00000001", 10, None), "t", &categories())
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::Reasoning(_)));
    }

    #[tokio::test]
    async fn test_keep_claimed_counts_lost_races_as_duplicates() {
        let reply = format!(
            "[{},{}]",
            candidate_json("Ask first", 90, 90, 95, 0.5),
            candidate_json("Reflect back", 90, 90, 95, 0.9),
        );
        let (extractor, _) = extractor(ScriptedReasoning::replying(&reply));
        let mut outcome = extractor
            .extract(&video("vid00000001", 10, None), "t", &categories())
            .await
            .unwrap();
        assert_eq!(outcome.flagged, 1);

        let second = outcome.accepted[1].content_hash.clone();
        outcome.keep_claimed(&[second]);
        assert_eq!(outcome.accepted.len(), 1);
        assert_eq!(outcome.accepted[0].title, "Reflect back");
        assert_eq!(outcome.duplicates, 1);
        assert_eq!(outcome.flagged, 0);
    }
}
