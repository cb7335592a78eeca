//! Pipeline orchestrator for Harvest.
//!
//! Runs one job at a time, one video at a time: resolve the channel, sample
//! videos, then acquire, extract and enqueue per video. Job state is
//! persisted after every video so a paused or interrupted job can resume
//! from its stored index.

use crate::channel::{parse_channel_input, ChannelResolver, VideoRef};
use crate::config::{Prompts, Settings};
use crate::dedup::DedupStore;
use crate::error::{HarvestError, Result};
use crate::insight::{ExtractionOutcome, InsightExtractor, OpenAIReasoningService, ReasoningService};
use crate::jobs::{ChannelRegistry, JobStatus, JobTotals, JobTracker, ProcessedVideos, ProcessingJob};
use crate::review::{update_stats, ReviewQueue};
use crate::sampling::{filter_videos, select_videos, SamplingOptions, SamplingStrategy};
use crate::store::{KeyValueStore, Records, SqliteKeyValueStore};
use crate::transcript::{parse_video_id, TranscriptAcquirer, TranscriptResult};
use crate::transport::{HttpFetcher, ReqwestFetcher};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Callback invoked after each job step with a short description.
pub type ProgressHook = Arc<dyn Fn(&ProcessingJob, &str) + Send + Sync>;

/// Per-run overrides on top of the configured sampling defaults.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub strategy: Option<SamplingStrategy>,
    pub max_videos: Option<usize>,
    /// Category names; empty means every configured category.
    pub categories: Vec<String>,
    /// Include videos processed by earlier runs.
    pub force: bool,
}

/// Result of a dry-run sample.
#[derive(Debug, Clone)]
pub struct SampleReport {
    pub channel_id: String,
    pub channel_name: String,
    pub candidates: usize,
    pub after_filter: usize,
    pub already_processed: usize,
    pub selected: Vec<VideoRef>,
}

/// What happened to one video.
enum VideoOutcome {
    Processed,
    Skipped,
}

/// The main orchestrator for the Harvest pipeline.
pub struct Orchestrator {
    settings: Settings,
    prompts: Prompts,
    resolver: ChannelResolver,
    acquirer: TranscriptAcquirer,
    extractor: InsightExtractor,
    dedup: Arc<DedupStore>,
    records: Records,
    review: ReviewQueue,
    jobs: JobTracker,
    processed: ProcessedVideos,
    channels: ChannelRegistry,
    rng: Mutex<StdRng>,
    progress: Option<ProgressHook>,
}

impl Orchestrator {
    /// Create an orchestrator backed by SQLite, HTTP and OpenAI.
    pub fn new(settings: Settings) -> Result<Self> {
        let sqlite_path = settings.sqlite_path();
        if let Some(parent) = sqlite_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let kv = Arc::new(SqliteKeyValueStore::new(&sqlite_path)?);
        let fetcher = Arc::new(ReqwestFetcher::with_user_agent(&settings.transport.user_agent)?);
        let reasoning = Arc::new(OpenAIReasoningService::new(&settings.extraction)?);
        Self::with_components(settings, kv, fetcher, reasoning)
    }

    /// Create an orchestrator with custom components.
    pub fn with_components(
        settings: Settings,
        kv: Arc<dyn KeyValueStore>,
        fetcher: Arc<dyn HttpFetcher>,
        reasoning: Arc<dyn ReasoningService>,
    ) -> Result<Self> {
        let prompts = Prompts::load(
            settings.prompts.custom_dir.as_deref(),
            Some(&settings.prompts.variables),
        )?;

        let records = Records::new(kv);
        let transport = Arc::new(settings.transport.build(fetcher));
        let resolver = ChannelResolver::new(transport.clone(), settings.channel.max_feed_videos);
        let acquirer = TranscriptAcquirer::new(transport, settings.transcript.clone());
        let dedup = Arc::new(DedupStore::new(records.clone()));
        let extractor = InsightExtractor::new(reasoning, dedup.clone())
            .with_prompts(prompts.clone())
            .with_thresholds(settings.quality.clone())
            .with_max_transcript_chars(settings.extraction.max_transcript_chars);

        Ok(Self {
            settings,
            prompts,
            resolver,
            acquirer,
            extractor,
            dedup,
            review: ReviewQueue::new(records.clone()),
            jobs: JobTracker::new(records.clone()),
            processed: ProcessedVideos::new(records.clone()),
            channels: ChannelRegistry::new(records.clone()),
            records,
            rng: Mutex::new(StdRng::from_os_rng()),
            progress: None,
        })
    }

    /// Fix every random choice the pipeline makes.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.resolver = self.resolver.with_seed(seed);
        self.acquirer = self.acquirer.with_seed(seed);
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn with_progress(mut self, hook: ProgressHook) -> Self {
        self.progress = Some(hook);
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn prompts(&self) -> &Prompts {
        &self.prompts
    }

    pub fn review(&self) -> &ReviewQueue {
        &self.review
    }

    pub fn jobs(&self) -> &JobTracker {
        &self.jobs
    }

    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    pub fn processed(&self) -> &ProcessedVideos {
        &self.processed
    }

    fn report(&self, job: &ProcessingJob, step: &str) {
        if let Some(hook) = &self.progress {
            hook(job, step);
        }
    }

    fn sampling_options(&self, run: &RunOptions) -> SamplingOptions {
        let mut opts = self.settings.sampling.clone();
        if let Some(strategy) = run.strategy {
            opts.strategy = strategy;
        }
        if let Some(max_videos) = run.max_videos {
            opts.max_videos = max_videos;
        }
        opts
    }

    fn select(&self, videos: &[VideoRef], opts: &SamplingOptions) -> Vec<VideoRef> {
        let now = Utc::now();
        match self.rng.lock() {
            Ok(mut rng) => select_videos(videos, opts, now, &mut *rng),
            Err(_) => select_videos(videos, opts, now, &mut rand::rng()),
        }
    }

    /// Drop videos already run through extraction, unless forced.
    async fn without_processed(&self, videos: Vec<VideoRef>, force: bool) -> Result<Vec<VideoRef>> {
        if force {
            return Ok(videos);
        }
        let processed = self.processed.all().await?;
        Ok(videos.into_iter().filter(|v| !processed.contains(&v.id)).collect())
    }

    /// Resolve and sample a channel without creating a job.
    #[instrument(skip(self, run))]
    pub async fn sample_channel(&self, channel_url: &str, run: &RunOptions) -> Result<SampleReport> {
        let resolved = self.resolver.resolve(channel_url).await?;
        let opts = self.sampling_options(run);
        let after_filter = filter_videos(&resolved.videos, &opts, Utc::now()).len();

        let candidates = resolved.videos.len();
        let fresh = self.without_processed(resolved.videos, run.force).await?;

        Ok(SampleReport {
            channel_id: resolved.channel_id,
            channel_name: resolved.channel_name,
            candidates,
            after_filter,
            already_processed: candidates - fresh.len(),
            selected: self.select(&fresh, &opts),
        })
    }

    /// Acquire a single transcript from a video id or watch URL.
    pub async fn acquire_transcript(&self, input: &str) -> Result<TranscriptResult> {
        let video_id = parse_video_id(input).ok_or_else(|| {
            HarvestError::InvalidInput(format!("Could not parse video id from: {}", input))
        })?;
        Ok(self.acquirer.acquire(&video_id).await)
    }

    /// Create and run a job for `channel_url`.
    ///
    /// A malformed URL is rejected before any job exists. Resolution
    /// failures are recorded on the job, which is then failed.
    #[instrument(skip(self, run), fields(channel = %channel_url))]
    pub async fn start_job(&self, channel_url: &str, run: &RunOptions) -> Result<ProcessingJob> {
        parse_channel_input(channel_url)?;

        let opts = self.sampling_options(run);
        let categories = if run.categories.is_empty() {
            self.settings
                .extraction
                .categories
                .iter()
                .map(|c| c.name.clone())
                .collect()
        } else {
            run.categories.clone()
        };

        let mut job = ProcessingJob::new(channel_url, opts.strategy, categories);
        job.log(format!("Fetching channel {}", channel_url));
        self.jobs.save(&mut job).await?;
        info!(job_id = %job.id, "Job created");
        self.report(&job, "Fetching channel");

        let resolved = match self.resolver.resolve(channel_url).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "Channel resolution failed");
                job.fail(&e.to_string())?;
                self.jobs.save(&mut job).await?;
                self.report(&job, "Channel resolution failed");
                return Err(e.into());
            }
        };

        job.channel_id = Some(resolved.channel_id.clone());
        job.channel_name = Some(resolved.channel_name.clone());

        let candidates = resolved.videos.len();
        let fresh = self.without_processed(resolved.videos, run.force).await?;
        let already_processed = candidates - fresh.len();
        let videos = self.select(&fresh, &opts);
        job.log(format!(
            "Sampled {} of {} videos ({} already processed)",
            videos.len(),
            candidates,
            already_processed
        ));
        job.set_videos(videos);
        job.transition(JobStatus::Processing)?;
        self.jobs.save(&mut job).await?;

        self.run_videos(job).await
    }

    /// Continue a paused job, or one left in `processing` by a crashed
    /// runner, from its stored index.
    #[instrument(skip(self))]
    pub async fn resume_job(&self, id: Uuid) -> Result<ProcessingJob> {
        let job = self.jobs.resume(id).await?;
        self.run_videos(job).await
    }

    /// Request a cooperative pause; the runner stops before its next video.
    pub async fn pause_job(&self, id: Uuid) -> Result<ProcessingJob> {
        self.jobs.pause(id).await
    }

    async fn run_videos(&self, mut job: ProcessingJob) -> Result<ProcessingJob> {
        while let Some(video) = job.current_video().cloned() {
            if self.jobs.stored_status(job.id).await? == Some(JobStatus::Paused) {
                job.status = JobStatus::Paused;
                info!(job_id = %job.id, index = job.current_video_index, "Pause observed");
                self.report(&job, "Paused");
                return Ok(job);
            }

            self.report(&job, &video.title);
            let outcome = match self.process_video(&mut job, &video).await {
                Ok(outcome) => outcome,
                Err(e) => return self.fail_job(job, e).await,
            };
            job.advance(matches!(outcome, VideoOutcome::Processed));

            if let Err(e) = self.jobs.save(&mut job).await {
                return self.fail_job(job, e).await;
            }
            if job.status == JobStatus::Paused {
                info!(job_id = %job.id, index = job.current_video_index, "Pause observed");
                self.report(&job, "Paused");
                return Ok(job);
            }
        }

        job.transition(JobStatus::Filtering)?;
        job.transition(JobStatus::Completed)?;
        job.log(format!(
            "Completed: {} processed, {} skipped, {} insights",
            job.videos_processed, job.videos_skipped, job.insights_found
        ));
        if let Err(e) = self.jobs.save(&mut job).await {
            warn!(job_id = %job.id, error = %e, "Failed to persist completed job");
            return Err(e);
        }

        self.channels
            .record_job(&JobTotals {
                channel_url: job.channel_url.clone(),
                channel_id: job.channel_id.clone(),
                channel_name: job.channel_name.clone(),
                videos_processed: job.videos_processed as u64,
                insights_found: job.insights_found as u64,
                quality_total: job.insight_quality_total,
            })
            .await?;

        info!(
            job_id = %job.id,
            processed = job.videos_processed,
            skipped = job.videos_skipped,
            insights = job.insights_found,
            "Job completed"
        );
        self.report(&job, "Completed");
        Ok(job)
    }

    /// Mark the job failed on a persistence error and return the error.
    async fn fail_job(&self, mut job: ProcessingJob, error: HarvestError) -> Result<ProcessingJob> {
        warn!(job_id = %job.id, error = %error, "Job failed");
        if job.fail(&error.to_string()).is_ok() {
            if let Err(save_error) = self.jobs.save(&mut job).await {
                warn!(job_id = %job.id, error = %save_error, "Could not persist failed job");
            }
        }
        self.report(&job, "Failed");
        Err(error)
    }

    /// Claim the accepted hashes, then enqueue the insights that won them.
    ///
    /// A failed enqueue releases the claim, so the hashes stay free for the
    /// retry of this video.
    async fn store_insights(&self, outcome: &mut ExtractionOutcome) -> Result<()> {
        let claimed = self.dedup.claim(&outcome.accepted_hashes()).await?;
        outcome.keep_claimed(&claimed);

        if let Err(e) = self.review.enqueue(&outcome.accepted).await {
            if let Err(release_error) = self.dedup.release(&claimed).await {
                warn!(error = %release_error, "Could not release content hashes");
            }
            return Err(e);
        }
        Ok(())
    }

    /// Acquire, extract and enqueue one video.
    ///
    /// Only persistence errors are returned; everything else is recorded on
    /// the job and the video is skipped.
    #[instrument(skip(self, job, video), fields(video_id = %video.id))]
    async fn process_video(&self, job: &mut ProcessingJob, video: &VideoRef) -> Result<VideoOutcome> {
        let transcript = self.acquirer.acquire(&video.id).await;
        if !transcript.is_success() {
            let message = transcript.error.unwrap_or_else(|| "empty transcript".to_string());
            if transcript.definitive {
                job.log(format!("{}: skipped ({})", video.id, message));
                self.processed.mark(&video.id).await?;
            } else {
                job.record_error(&video.id, &message);
            }
            return Ok(VideoOutcome::Skipped);
        }

        let categories = self.settings.extraction.select_categories(&job.categories);
        let mut outcome = match self
            .extractor
            .extract(video, &transcript.transcript, &categories)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) if e.is_persistence() => return Err(e),
            Err(e) => {
                job.record_error(&video.id, &e.to_string());
                return Ok(VideoOutcome::Skipped);
            }
        };

        self.store_insights(&mut outcome).await?;
        update_stats(&self.records, |stats| stats.record_extraction(&outcome)).await?;
        self.processed.mark(&video.id).await?;

        job.insights_found += outcome.accepted.len();
        job.insights_filtered += outcome.rejected_low_quality;
        job.insights_duplicated += outcome.duplicates;
        job.insight_quality_total += outcome
            .accepted
            .iter()
            .map(|i| u64::from(i.scores.quality))
            .sum::<u64>();
        job.log(format!(
            "{}: {} insights ({} flagged, {} below floor, {} duplicates) via {}",
            video.id,
            outcome.accepted.len(),
            outcome.flagged,
            outcome.rejected_low_quality,
            outcome.duplicates,
            transcript
                .method
                .map(|m| m.to_string())
                .unwrap_or_default()
        ));
        debug!(accepted = outcome.accepted.len(), "Video processed");
        Ok(VideoOutcome::Processed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{sample_entry, sample_feed, CHANNEL};
    use crate::insight::testing::{candidate_json, ScriptedReasoning};
    use crate::review::PendingFilter;
    use crate::sampling::tests::video;
    use crate::store::testing::FailingStore;
    use crate::store::{keys, MemoryKeyValueStore};
    use crate::transport::testing::{ok, ScriptedFetcher};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CHANNEL_URL: &str = "https://www.youtube.com/channel/UCabcdefghijklmnopqrstuv";
    const NO_CAPTIONS_ID: &str = "nnnnnnnnnnn";
    const CAPTIONS_XML: &str = r#"<transcript><text start="0" dur="3">When they get quiet, ask what they noticed.</text><text start="3" dur="3">Then wait.</text></transcript>"#;
    const NO_CAPTIONS_PAGE: &str = r#"<script>var ytInitialPlayerResponse = {"playabilityStatus":{"status":"OK"},"videoDetails":{"videoId":"nnnnnnnnnnn"}};</script>"#;

    fn days_ago(days: i64) -> String {
        (Utc::now() - chrono::Duration::days(days)).to_rfc3339()
    }

    fn settings() -> Settings {
        let mut settings = Settings::default();
        settings.transport.min_request_interval_ms = 0;
        settings.transport.base_backoff_ms = 0;
        settings.transport.max_retries_per_relay = 1;
        settings.sampling.strategy = SamplingStrategy::Recent;
        settings.sampling.max_videos = 10;
        settings
    }

    fn fetcher(video_ids: &[&str]) -> Arc<ScriptedFetcher> {
        let entries: Vec<String> = video_ids
            .iter()
            .enumerate()
            .map(|(i, id)| sample_entry(id, &format!("Talk {}", i), &days_ago(i as i64 + 1), 1000))
            .collect();
        let feed = sample_feed(&entries);
        Arc::new(ScriptedFetcher::new(move |req| {
            if req.url.contains("feeds/videos.xml") {
                ok(&feed)
            } else if req.url.contains(&format!("watch?v={}", NO_CAPTIONS_ID)) {
                ok(NO_CAPTIONS_PAGE)
            } else if req.url.contains("watch?v=") {
                ok("<html></html>")
            } else if req.url.contains("timedtext") {
                ok(CAPTIONS_XML)
            } else {
                ok("")
            }
        }))
    }

    /// Each call replies with one fresh, well-scored candidate.
    fn reasoning() -> Arc<ScriptedReasoning> {
        let counter = AtomicUsize::new(0);
        Arc::new(ScriptedReasoning::new(move |_| {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            Ok(format!("[{}]", candidate_json(&format!("Pause {}", n), 85, 85, 95, 0.9)))
        }))
    }

    fn orchestrator(
        kv: Arc<dyn KeyValueStore>,
        fetcher: Arc<ScriptedFetcher>,
        reasoning: Arc<ScriptedReasoning>,
    ) -> Orchestrator {
        Orchestrator::with_components(settings(), kv, fetcher, reasoning)
            .unwrap()
            .with_seed(7)
    }

    #[tokio::test]
    async fn test_invalid_url_creates_no_job() {
        let fetcher = fetcher(&[]);
        let orch = orchestrator(Arc::new(MemoryKeyValueStore::new()), fetcher.clone(), reasoning());

        let err = orch
            .start_job("https://example.com/not-a-channel", &RunOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, HarvestError::InvalidInput(_)));
        assert!(orch.jobs().list().await.unwrap().is_empty());
        assert!(fetcher.calls().is_empty());
    }

    #[tokio::test]
    async fn test_run_completes_and_enqueues() {
        let reasoning = reasoning();
        let orch = orchestrator(
            Arc::new(MemoryKeyValueStore::new()),
            fetcher(&["aaaaaaaaaaa", NO_CAPTIONS_ID, "bbbbbbbbbbb"]),
            reasoning.clone(),
        );

        let job = orch.start_job(CHANNEL_URL, &RunOptions::default()).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.channel_id.as_deref(), Some(CHANNEL));
        assert_eq!(job.videos_to_process, 3);
        assert_eq!(job.videos_processed, 2);
        assert_eq!(job.videos_skipped, 1);
        assert_eq!(job.insights_found, 2);
        assert!(job.errors.is_empty());
        assert_eq!(reasoning.prompts().len(), 2);

        let pending = orch.review().pending(&PendingFilter::default()).await.unwrap();
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|i| !i.needs_human_review));

        // The caption-less video counts as handled too.
        let processed = orch.processed().all().await.unwrap();
        assert!(processed.contains(NO_CAPTIONS_ID));
        assert_eq!(processed.len(), 3);

        let channels = orch.channels().list().await.unwrap();
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].insights_found, 2);
        assert!((channels[0].avg_quality - 85.0).abs() < 1e-9);

        let stats = orch.review().stats().await.unwrap();
        assert_eq!(stats.accepted, 2);
    }

    #[tokio::test]
    async fn test_processed_videos_skipped_unless_forced() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let reasoning = reasoning();
        let orch = orchestrator(kv, fetcher(&["aaaaaaaaaaa", "bbbbbbbbbbb"]), reasoning.clone());

        orch.start_job(CHANNEL_URL, &RunOptions::default()).await.unwrap();
        let second = orch.start_job(CHANNEL_URL, &RunOptions::default()).await.unwrap();
        assert_eq!(second.status, JobStatus::Completed);
        assert_eq!(second.videos_to_process, 0);
        assert_eq!(reasoning.prompts().len(), 2);

        let forced = RunOptions {
            force: true,
            ..RunOptions::default()
        };
        let third = orch.start_job(CHANNEL_URL, &forced).await.unwrap();
        assert_eq!(third.videos_processed, 2);
        assert_eq!(reasoning.prompts().len(), 4);
    }

    #[tokio::test]
    async fn test_extraction_failure_skips_only_that_video() {
        let counter = AtomicUsize::new(0);
        let reasoning = Arc::new(ScriptedReasoning::new(move |_| {
            match counter.fetch_add(1, Ordering::SeqCst) {
                0 => Ok("I could not find anything useful.".to_string()),
                n => Ok(format!("[{}]", candidate_json(&format!("Repair {}", n), 80, 70, 90, 0.8))),
            }
        }));
        let orch = orchestrator(
            Arc::new(MemoryKeyValueStore::new()),
            fetcher(&["aaaaaaaaaaa", "bbbbbbbbbbb"]),
            reasoning,
        );

        let job = orch.start_job(CHANNEL_URL, &RunOptions::default()).await.unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.videos_processed, 1);
        assert_eq!(job.videos_skipped, 1);
        assert_eq!(job.errors.len(), 1);
        assert_eq!(job.insights_found, 1);
        assert_eq!(orch.processed().all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_resolution_failure_fails_job() {
        let fetcher = Arc::new(ScriptedFetcher::new(|_| crate::transport::testing::status(404)));
        let orch = orchestrator(Arc::new(MemoryKeyValueStore::new()), fetcher, reasoning());

        let err = orch.start_job(CHANNEL_URL, &RunOptions::default()).await.unwrap_err();
        assert!(matches!(err, HarvestError::Transport(_)));

        let jobs = orch.jobs().list().await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn test_pause_is_honored_and_resume_continues() {
        let reasoning = reasoning();
        let orch = orchestrator(
            Arc::new(MemoryKeyValueStore::new()),
            fetcher(&[]),
            reasoning.clone(),
        );

        let mut job = ProcessingJob::new(CHANNEL_URL, SamplingStrategy::Recent, vec![]);
        job.channel_id = Some(CHANNEL.to_string());
        job.set_videos(vec![video("aaaaaaaaaaa", 1, None), video("bbbbbbbbbbb", 2, None)]);
        job.transition(JobStatus::Processing).unwrap();
        orch.jobs().save(&mut job).await.unwrap();
        orch.pause_job(job.id).await.unwrap();

        let stopped = orch.run_videos(job.clone()).await.unwrap();
        assert_eq!(stopped.status, JobStatus::Paused);
        assert_eq!(stopped.current_video_index, 0);
        assert!(reasoning.prompts().is_empty());

        let resumed = orch.resume_job(job.id).await.unwrap();
        assert_eq!(resumed.status, JobStatus::Completed);
        assert_eq!(resumed.videos_processed, 2);
        assert_eq!(orch.jobs().get(job.id).await.unwrap().status, JobStatus::Completed);

        let err = orch.resume_job(job.id).await.unwrap_err();
        assert!(matches!(err, HarvestError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn test_store_failure_fails_job() {
        let kv = Arc::new(FailingStore::new(keys::PENDING_INSIGHTS));
        let orch = orchestrator(kv, fetcher(&["aaaaaaaaaaa", "bbbbbbbbbbb"]), reasoning());

        let err = orch.start_job(CHANNEL_URL, &RunOptions::default()).await.unwrap_err();
        assert!(err.is_persistence());

        let jobs = orch.jobs().list().await.unwrap();
        assert_eq!(jobs[0].status, JobStatus::Failed);
        assert_eq!(jobs[0].videos_processed, 0);
        assert!(orch.processed().all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_enqueue_leaves_no_hash_behind() {
        let kv = Arc::new(FailingStore::new(keys::PENDING_INSIGHTS));
        let reasoning = reasoning();
        let orch = orchestrator(kv.clone(), fetcher(&["aaaaaaaaaaa"]), reasoning.clone());

        assert!(orch.start_job(CHANNEL_URL, &RunOptions::default()).await.is_err());
        let records = Records::new(kv.clone());
        let hashes: std::collections::BTreeSet<String> =
            records.load(keys::CONTENT_HASHES).await.unwrap();
        assert!(hashes.is_empty());
        assert!(orch.processed().all().await.unwrap().is_empty());
        assert_eq!(reasoning.prompts().len(), 1);
    }

    #[tokio::test]
    async fn test_insight_claimed_elsewhere_counts_as_duplicate() {
        let kv: Arc<dyn KeyValueStore> = Arc::new(MemoryKeyValueStore::new());
        let orch = orchestrator(kv.clone(), fetcher(&[]), reasoning());

        // Another runner accepted the same insight after this one extracted.
        let mut outcome = ExtractionOutcome::default();
        let mut insight = crate::insight::tests::sample_insight("Pause 0");
        insight.content_hash = crate::dedup::insight_hash("Pause 0", "shared");
        outcome.accepted.push(insight.clone());
        DedupStore::new(Records::new(kv))
            .insert(&insight.content_hash)
            .await
            .unwrap();

        orch.store_insights(&mut outcome).await.unwrap();
        assert!(outcome.accepted.is_empty());
        assert_eq!(outcome.duplicates, 1);
        assert!(orch.review().pending(&PendingFilter::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sample_channel_is_a_dry_run() {
        let orch = orchestrator(
            Arc::new(MemoryKeyValueStore::new()),
            fetcher(&["aaaaaaaaaaa", "bbbbbbbbbbb", "ccccccccccc"]),
            reasoning(),
        );
        let run = RunOptions {
            max_videos: Some(2),
            ..RunOptions::default()
        };

        let report = orch.sample_channel(CHANNEL_URL, &run).await.unwrap();
        assert_eq!(report.candidates, 3);
        assert_eq!(report.selected.len(), 2);
        assert_eq!(report.selected[0].id, "aaaaaaaaaaa");
        assert!(orch.jobs().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_acquire_transcript_parses_input() {
        let orch = orchestrator(Arc::new(MemoryKeyValueStore::new()), fetcher(&[]), reasoning());

        let result = orch
            .acquire_transcript("https://youtu.be/aaaaaaaaaaa")
            .await
            .unwrap();
        assert!(result.is_success());
        assert!(result.transcript.starts_with("When they get quiet"));

        assert!(matches!(
            orch.acquire_transcript("not a video").await,
            Err(HarvestError::InvalidInput(_))
        ));
    }
}
