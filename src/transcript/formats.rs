//! Caption body parsers.
//!
//! Every parser normalizes to [`TranscriptSegment`]s with markup stripped and
//! entities decoded. The body's shape is sniffed from its leading content.

use super::TranscriptSegment;
use crate::text::clean_caption_text;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

static XML_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<text\b([^>]*)>(.*?)</text>").expect("valid regex"));

static XML_PARAGRAPH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<p\b([^>]*)>(.*?)</p>").expect("valid regex"));

static ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\b([a-z]+)="([^"]*)""#).expect("valid regex"));

static VTT_TIMING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^((?:\d+:)?\d{1,2}:\d{2}[.,]\d{3})\s+-->\s+((?:\d+:)?\d{1,2}:\d{2}[.,]\d{3})")
        .expect("valid regex")
});

/// Detected caption body shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptionFormat {
    /// Compact per-event JSON (`events[].segs[].utf8`).
    Json3,
    /// `<text start dur>` or `<p t d>` XML.
    Xml,
    /// WebVTT.
    Vtt,
    /// Plain JSON list of `{text, start, duration}` events.
    SimpleJson,
    /// Anything else with content.
    PlainText,
}

/// Sniff the format from the leading content.
pub fn sniff(body: &str) -> CaptionFormat {
    let trimmed = body.trim_start_matches('\u{feff}').trim_start();
    if trimmed.starts_with("WEBVTT") {
        CaptionFormat::Vtt
    } else if trimmed.starts_with('<') {
        CaptionFormat::Xml
    } else if trimmed.starts_with('{') && trimmed.contains("\"events\"") && trimmed.contains("\"segs\"") {
        CaptionFormat::Json3
    } else if trimmed.starts_with('{') || trimmed.starts_with('[') {
        CaptionFormat::SimpleJson
    } else {
        CaptionFormat::PlainText
    }
}

/// Parse a caption body of any supported shape.
pub fn parse_captions(body: &str) -> Vec<TranscriptSegment> {
    let body = body.trim_start_matches('\u{feff}');
    if body.trim().is_empty() {
        return Vec::new();
    }

    match sniff(body) {
        CaptionFormat::Json3 => parse_json3(body),
        CaptionFormat::Xml => parse_xml(body),
        CaptionFormat::Vtt => parse_vtt(body),
        CaptionFormat::SimpleJson => parse_simple_json(body),
        CaptionFormat::PlainText => parse_plain_text(body),
    }
}

fn push_segment(segments: &mut Vec<TranscriptSegment>, raw: &str, start: f64, duration: f64) {
    let text = clean_caption_text(raw);
    if !text.is_empty() {
        segments.push(TranscriptSegment::new(text, start, duration));
    }
}

/// Parse compact per-event JSON.
pub fn parse_json3(body: &str) -> Vec<TranscriptSegment> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };
    let mut segments = Vec::new();

    for event in value["events"].as_array().into_iter().flatten() {
        let Some(segs) = event["segs"].as_array() else {
            continue;
        };
        let raw: String = segs.iter().filter_map(|s| s["utf8"].as_str()).collect();
        let start = event["tStartMs"].as_f64().unwrap_or(0.0) / 1000.0;
        let duration = event["dDurationMs"].as_f64().unwrap_or(0.0) / 1000.0;
        push_segment(&mut segments, &raw, start, duration);
    }
    segments
}

fn attrs(raw: &str) -> std::collections::HashMap<String, String> {
    ATTR.captures_iter(raw)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

/// Parse timed-text XML (`<text start dur>` in seconds, or `<p t d>` in ms).
pub fn parse_xml(body: &str) -> Vec<TranscriptSegment> {
    let mut segments = Vec::new();

    for caps in XML_TEXT.captures_iter(body) {
        let attrs = attrs(&caps[1]);
        let start = attrs.get("start").and_then(|s| s.parse().ok()).unwrap_or(0.0);
        let duration = attrs.get("dur").and_then(|s| s.parse().ok()).unwrap_or(0.0);
        push_segment(&mut segments, &caps[2], start, duration);
    }

    if segments.is_empty() {
        for caps in XML_PARAGRAPH.captures_iter(body) {
            let attrs = attrs(&caps[1]);
            let start = attrs.get("t").and_then(|s| s.parse::<f64>().ok()).unwrap_or(0.0);
            let duration = attrs.get("d").and_then(|s| s.parse::<f64>().ok()).unwrap_or(0.0);
            push_segment(&mut segments, &caps[2], start / 1000.0, duration / 1000.0);
        }
    }
    segments
}

fn parse_vtt_timestamp(raw: &str) -> Option<f64> {
    let raw = raw.replace(',', ".");
    let parts: Vec<&str> = raw.split(':').collect();
    let (h, m, s) = match parts.as_slice() {
        [h, m, s] => (h.parse::<f64>().ok()?, m.parse::<f64>().ok()?, s.parse::<f64>().ok()?),
        [m, s] => (0.0, m.parse::<f64>().ok()?, s.parse::<f64>().ok()?),
        _ => return None,
    };
    Some(h * 3600.0 + m * 60.0 + s)
}

/// Parse WebVTT cues. Consecutive duplicate cue text (rolling auto captions)
/// is kept only once.
pub fn parse_vtt(body: &str) -> Vec<TranscriptSegment> {
    let mut segments: Vec<TranscriptSegment> = Vec::new();
    let mut lines = body.lines().peekable();

    while let Some(line) = lines.next() {
        let Some(caps) = VTT_TIMING.captures(line.trim()) else {
            continue;
        };
        let (Some(start), Some(end)) = (parse_vtt_timestamp(&caps[1]), parse_vtt_timestamp(&caps[2]))
        else {
            continue;
        };

        let mut text_lines = Vec::new();
        while let Some(next) = lines.peek() {
            if next.trim().is_empty() {
                break;
            }
            text_lines.push(lines.next().unwrap_or_default());
        }

        let text = clean_caption_text(&text_lines.join(" "));
        if text.is_empty() || segments.last().is_some_and(|s| s.text == text) {
            continue;
        }
        segments.push(TranscriptSegment::new(text, start, (end - start).max(0.0)));
    }
    segments
}

fn number(value: &Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

/// Parse a plain JSON list of caption events.
///
/// Accepts a bare array or an object wrapping it under `events`,
/// `segments`, `captions` or `transcript`.
pub fn parse_simple_json(body: &str) -> Vec<TranscriptSegment> {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return Vec::new();
    };

    let items: &[Value] = match &value {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => ["events", "segments", "captions", "transcript"]
            .iter()
            .find_map(|k| map.get(*k).and_then(|v| v.as_array()))
            .map(|v| v.as_slice())
            .unwrap_or_default(),
        _ => &[],
    };

    let mut segments = Vec::new();
    for item in items {
        let Some(raw) = item["text"].as_str() else {
            continue;
        };
        let start = number(&item["start"])
            .or_else(|| number(&item["offset"]))
            .unwrap_or(0.0);
        let duration = number(&item["duration"])
            .or_else(|| number(&item["dur"]))
            .or_else(|| number(&item["end"]).map(|end| (end - start).max(0.0)))
            .unwrap_or(0.0);
        push_segment(&mut segments, raw, start, duration);
    }
    segments
}

/// Treat the body as untimed text.
pub fn parse_plain_text(body: &str) -> Vec<TranscriptSegment> {
    let mut segments = Vec::new();
    push_segment(&mut segments, body, 0.0, 0.0);
    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sniff() {
        assert_eq!(sniff("WEBVTT\n\n"), CaptionFormat::Vtt);
        assert_eq!(sniff("  <?xml version=\"1.0\"?><transcript/>"), CaptionFormat::Xml);
        assert_eq!(sniff(r#"{"events":[{"segs":[]}]}"#), CaptionFormat::Json3);
        assert_eq!(sniff(r#"[{"text":"hi"}]"#), CaptionFormat::SimpleJson);
        assert_eq!(sniff("just words"), CaptionFormat::PlainText);
    }

    #[test]
    fn test_parse_json3() {
        let body = r#"{"wireMagic":"pb3","events":[
            {"tStartMs":0,"dDurationMs":1500,"segs":[{"utf8":"Hello "},{"utf8":"there"}]},
            {"tStartMs":1500,"dDurationMs":10,"aAppend":1,"segs":[{"utf8":"\n"}]},
            {"tStartMs":2000,"dDurationMs":1000},
            {"tStartMs":3000,"dDurationMs":2000,"segs":[{"utf8":"it&#39;s fine"}]}
        ]}"#;
        let segments = parse_captions(body);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello there");
        assert_eq!(segments[0].duration, 1.5);
        assert_eq!(segments[1].text, "it's fine");
        assert_eq!(segments[1].start, 3.0);
    }

    #[test]
    fn test_parse_xml_variants() {
        let body = r#"<?xml version="1.0" encoding="utf-8" ?><transcript>
            <text start="0.5" dur="2.25">I &amp;#39;m listening</text>
            <text dur="1" start="3">&lt;i&gt;quietly&lt;/i&gt;</text>
        </transcript>"#;
        let segments = parse_captions(body);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "I 'm listening");
        assert_eq!(segments[0].start, 0.5);
        assert_eq!(segments[1].text, "quietly");
        assert_eq!(segments[1].start, 3.0);

        let srv3 = r#"<timedtext format="3"><body><p t="1200" d="800">srv three</p></body></timedtext>"#;
        let segments = parse_captions(srv3);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].start, 1.2);
        assert_eq!(segments[0].duration, 0.8);
    }

    #[test]
    fn test_parse_vtt() {
        let body = "WEBVTT\nKind: captions\n\n00:00:01.000 --> 00:00:03.500 align:start\nfirst <c>line</c>\n\n00:00:03.500 --> 00:00:05.000\nfirst line\n\n01:02.000 --> 01:04,000\nsecond\ncue\n";
        let segments = parse_captions(body);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "first line");
        assert_eq!(segments[0].duration, 2.5);
        assert_eq!(segments[1].text, "second cue");
        assert_eq!(segments[1].start, 62.0);
    }

    #[test]
    fn test_parse_simple_json() {
        let body = r#"{"captions":[{"text":"one","start":"1.5","dur":2},{"text":"two","start":4,"end":6}]}"#;
        let segments = parse_captions(body);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].start, 1.5);
        assert_eq!(segments[0].duration, 2.0);
        assert_eq!(segments[1].duration, 2.0);
    }

    #[test]
    fn test_plain_and_empty() {
        let segments = parse_captions("  hello   world ");
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, "hello world");
        assert!(parse_captions("   ").is_empty());
        assert!(parse_captions("<transcript></transcript>").is_empty());
    }
}
