//! Selection strategies.

use super::SamplingOptions;
use crate::channel::VideoRef;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::Rng;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Views at which the volume factor saturates (log10 = 7).
const VOLUME_SATURATION_LOG: f64 = 7.0;

pub fn random<R: Rng + ?Sized>(videos: Vec<VideoRef>, n: usize, rng: &mut R) -> Vec<VideoRef> {
    videos.choose_multiple(rng, n).cloned().collect()
}

fn by_views_desc(a: &VideoRef, b: &VideoRef) -> Ordering {
    b.view_count.cmp(&a.view_count)
}

fn by_recency_desc(a: &VideoRef, b: &VideoRef) -> Ordering {
    // `None` sorts before `Some`, so reversing puts undated videos last.
    b.published_at.cmp(&a.published_at)
}

/// Most viewed first; videos without view data fill remaining slots at random.
pub fn popular<R: Rng + ?Sized>(videos: Vec<VideoRef>, n: usize, rng: &mut R) -> Vec<VideoRef> {
    let (mut with_views, mut without): (Vec<_>, Vec<_>) =
        videos.into_iter().partition(|v| v.view_count.is_some());

    with_views.sort_by(by_views_desc);
    with_views.truncate(n);

    if with_views.len() < n {
        without.shuffle(rng);
        let missing = n - with_views.len();
        with_views.extend(without.into_iter().take(missing));
    }
    with_views
}

pub fn recent(mut videos: Vec<VideoRef>, n: usize) -> Vec<VideoRef> {
    videos.sort_by(by_recency_desc);
    videos.truncate(n);
    videos
}

/// Engagement score: weighted like and comment rates, scaled by a clamped
/// log10(views)/7 volume factor so tiny samples can't dominate.
pub fn engagement_score(video: &VideoRef) -> f64 {
    let views = match video.view_count {
        Some(v) if v > 0 => v as f64,
        _ => return 0.0,
    };
    let likes = video.like_count.unwrap_or(0) as f64;
    let comments = video.comment_count.unwrap_or(0) as f64;

    let rate = 0.7 * (likes / views) + 0.3 * (comments / views);
    let volume = (views.log10() / VOLUME_SATURATION_LOG).clamp(0.0, 1.0);
    rate * volume
}

pub fn engagement(mut videos: Vec<VideoRef>, n: usize) -> Vec<VideoRef> {
    videos.sort_by(|a, b| {
        engagement_score(b)
            .partial_cmp(&engagement_score(a))
            .unwrap_or(Ordering::Equal)
    });
    videos.truncate(n);
    videos
}

/// Bucket sizes for balanced sampling: (popular, recent, random).
///
/// The three percentages are weights normalized by their sum, so they need
/// not add up to 100. Rounding leftovers go to the random bucket, which
/// takes everything when all three are zero.
pub fn balanced_allocation(opts: &SamplingOptions) -> (usize, usize, usize) {
    let max = opts.max_videos;
    let total = u64::from(opts.popular_percent)
        + u64::from(opts.recent_percent)
        + u64::from(opts.random_percent);
    if total == 0 {
        return (0, 0, max);
    }
    let share = |percent: u32| ((max as u64 * u64::from(percent)) / total) as usize;
    let popular = share(opts.popular_percent);
    let recent = share(opts.recent_percent);
    (popular, recent, max - popular - recent)
}

/// Popular, then recent, then random picks with no id appearing twice.
///
/// Any shortfall (too few videos with view data, overlap between buckets)
/// is filled from the remaining candidates in random order.
pub fn balanced<R: Rng + ?Sized>(
    videos: Vec<VideoRef>,
    opts: &SamplingOptions,
    rng: &mut R,
) -> Vec<VideoRef> {
    let (popular_n, recent_n, random_n) = balanced_allocation(opts);
    let mut chosen: HashSet<String> = HashSet::new();
    let mut selected: Vec<VideoRef> = Vec::with_capacity(opts.max_videos);

    let mut by_views: Vec<&VideoRef> = videos.iter().filter(|v| v.view_count.is_some()).collect();
    by_views.sort_by(|a, b| by_views_desc(a, b));
    for video in by_views.into_iter().take(popular_n) {
        chosen.insert(video.id.clone());
        selected.push(video.clone());
    }

    let mut by_recency: Vec<&VideoRef> = videos.iter().collect();
    by_recency.sort_by(|a, b| by_recency_desc(a, b));
    for video in by_recency
        .into_iter()
        .filter(|v| !chosen.contains(&v.id))
        .take(recent_n)
        .collect::<Vec<_>>()
    {
        chosen.insert(video.id.clone());
        selected.push(video.clone());
    }

    let mut pool: Vec<VideoRef> = videos
        .into_iter()
        .filter(|v| !chosen.contains(&v.id))
        .collect();
    pool.shuffle(rng);

    // The random bucket absorbs every shortfall.
    let shortfall = (popular_n + recent_n).saturating_sub(selected.len());
    selected.extend(pool.into_iter().take(random_n + shortfall));
    selected
}
