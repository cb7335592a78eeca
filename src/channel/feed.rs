//! Public channel feed (Atom) parsing.

use super::VideoRef;
use crate::text::decode_entities;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

static ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<entry>(.*?)</entry>").expect("valid regex"));

static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<yt:videoId>([^<]+)</yt:videoId>").expect("valid regex"));

static CHANNEL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<yt:channelId>([^<]+)</yt:channelId>").expect("valid regex"));

static TITLE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<title>(.*?)</title>").expect("valid regex"));

static AUTHOR_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<author>\s*<name>(.*?)</name>").expect("valid regex"));

static PUBLISHED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<published>([^<]+)</published>").expect("valid regex"));

static VIEWS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<media:statistics views="(\d+)""#).expect("valid regex"));

static RATING_COUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<media:starRating count="(\d+)""#).expect("valid regex"));

/// A parsed channel feed.
#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub channel_name: Option<String>,
    pub videos: Vec<VideoRef>,
}

fn capture(re: &Regex, haystack: &str) -> Option<String> {
    re.captures(haystack)
        .map(|c| decode_entities(c[1].trim()))
}

/// Parse the channel's Atom feed into video references.
///
/// Entries without a video id are skipped. `fallback_channel_id` is used
/// for entries missing `yt:channelId`.
pub fn parse_feed(xml: &str, fallback_channel_id: &str) -> ParsedFeed {
    // Feed-level title appears before the first entry.
    let header = xml.split("<entry>").next().unwrap_or_default();
    let channel_name = capture(&AUTHOR_NAME, header).or_else(|| capture(&TITLE, header));

    let videos = ENTRY
        .captures_iter(xml)
        .filter_map(|caps| {
            let entry = &caps[1];
            let id = capture(&VIDEO_ID, entry)?;

            let published_at = capture(&PUBLISHED, entry).and_then(|p| {
                DateTime::parse_from_rfc3339(&p)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            });

            Some(VideoRef {
                id,
                title: capture(&TITLE, entry).unwrap_or_else(|| "Untitled".to_string()),
                channel_id: capture(&CHANNEL_ID, entry)
                    .unwrap_or_else(|| fallback_channel_id.to_string()),
                channel_name: capture(&AUTHOR_NAME, entry)
                    .or_else(|| channel_name.clone())
                    .unwrap_or_default(),
                published_at,
                duration_seconds: None,
                view_count: capture(&VIEWS, entry).and_then(|v| v.parse().ok()),
                like_count: capture(&RATING_COUNT, entry).and_then(|v| v.parse().ok()),
                comment_count: None,
            })
        })
        .collect();

    ParsedFeed {
        channel_name,
        videos,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const CHANNEL: &str = "UCabcdefghijklmnopqrstuv";

    pub fn sample_entry(id: &str, title: &str, published: &str, views: u64) -> String {
        format!(
            r#"<entry>
  <id>yt:video:{id}</id>
  <yt:videoId>{id}</yt:videoId>
  <yt:channelId>{CHANNEL}</yt:channelId>
  <title>{title}</title>
  <author><name>Calm Coach</name></author>
  <published>{published}</published>
  <media:group>
    <media:title>{title}</media:title>
    <media:community>
      <media:starRating count="{likes}" average="5.00" min="1" max="5"/>
      <media:statistics views="{views}"/>
    </media:community>
  </media:group>
</entry>"#,
            likes = views / 20,
        )
    }

    pub fn sample_feed(entries: &[String]) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015">
 <title>Calm Coach</title>
 <author><name>Calm Coach</name></author>
 {}
</feed>"#,
            entries.join("\n")
        )
    }

    #[test]
    fn test_parse_feed() {
        let xml = sample_feed(&[
            sample_entry("aaaaaaaaaaa", "Listening &amp; Repair", "2026-01-02T10:00:00+00:00", 1200),
            sample_entry("bbbbbbbbbbb", "Second", "2025-06-01T10:00:00+00:00", 40),
        ]);

        let feed = parse_feed(&xml, CHANNEL);
        assert_eq!(feed.channel_name.as_deref(), Some("Calm Coach"));
        assert_eq!(feed.videos.len(), 2);

        let first = &feed.videos[0];
        assert_eq!(first.id, "aaaaaaaaaaa");
        assert_eq!(first.title, "Listening & Repair");
        assert_eq!(first.channel_id, CHANNEL);
        assert_eq!(first.view_count, Some(1200));
        assert_eq!(first.like_count, Some(60));
        assert!(first.published_at.is_some());
    }

    #[test]
    fn test_parse_feed_skips_entries_without_ids() {
        let xml = sample_feed(&["<entry><title>No id</title></entry>".to_string()]);
        assert!(parse_feed(&xml, CHANNEL).videos.is_empty());
    }
}
