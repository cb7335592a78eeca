//! JSONL export of approved insights as chat training examples.

use crate::error::Result;
use crate::insight::Insight;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct TrainingExample {
    messages: [Message; 3],
}

fn readable_category(category: &str) -> String {
    category.replace('_', " ")
}

/// The user turn: a real quote when one exists, else a request built
/// from the category and title.
fn user_turn(insight: &Insight) -> String {
    match insight.supporting_quotes.first() {
        Some(quote) => quote.clone(),
        None => format!(
            "Can you help me with {}? Specifically: {}",
            readable_category(&insight.category),
            insight.title.to_lowercase()
        ),
    }
}

fn assistant_turn(insight: &Insight) -> String {
    let mut reply = insight.insight.clone();
    if !insight.coaching_guidance.is_empty() {
        reply.push_str("\n\n");
        reply.push_str(&insight.coaching_guidance);
    }
    reply
}

fn example(insight: &Insight, system: &str) -> TrainingExample {
    TrainingExample {
        messages: [
            Message {
                role: "system",
                content: system.to_string(),
            },
            Message {
                role: "user",
                content: user_turn(insight),
            },
            Message {
                role: "assistant",
                content: assistant_turn(insight),
            },
        ],
    }
}

/// Write one JSON line per insight. Returns the number of lines written.
pub fn write_jsonl<W: Write>(insights: &[Insight], system: &str, mut writer: W) -> Result<usize> {
    for insight in insights {
        serde_json::to_writer(&mut writer, &example(insight, system))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(insights.len())
}

/// Write the export to `path`, creating parent directories.
pub fn export_to_path(insights: &[Insight], system: &str, path: &Path) -> Result<usize> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    write_jsonl(insights, system, std::io::BufWriter::new(file))
}
