//! Transcript command implementation.

use crate::cli::preflight::{self, Operation};
use crate::cli::Output;
use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use anyhow::Result;

/// Run the transcript command.
pub async fn run_transcript(
    video: &str,
    format: &str,
    output: Option<&str>,
    settings: Settings,
) -> Result<()> {
    preflight::check(Operation::Fetch)?;
    if !matches!(format, "text" | "json") {
        return Err(anyhow::anyhow!("Unknown format '{}'. Use text or json.", format));
    }

    let orchestrator = Orchestrator::new(settings)?;
    let spinner = Output::spinner("Fetching transcript...");
    let result = orchestrator.acquire_transcript(video).await;
    spinner.finish_and_clear();
    let result = result?;

    if !result.is_success() {
        let error = result.error.unwrap_or_default();
        if result.definitive {
            Output::warning(&format!("{}: {}", result.video_id, error));
            return Ok(());
        }
        Output::error(&format!("{}: {}", result.video_id, error));
        return Err(anyhow::anyhow!("Transcript unavailable"));
    }

    let rendered = match format {
        "json" => serde_json::to_string_pretty(&result)?,
        _ => result.transcript.clone(),
    };

    match output {
        Some(path) => {
            std::fs::write(path, &rendered)?;
            Output::success(&format!(
                "Wrote {} segments to {} (via {})",
                result.segments.len(),
                path,
                result.method.map(|m| m.to_string()).unwrap_or_default()
            ));
        }
        None => {
            println!("{}", rendered);
            Output::info(&format!(
                "{} segments via {}",
                result.segments.len(),
                result.method.map(|m| m.to_string()).unwrap_or_default()
            ));
        }
    }

    Ok(())
}
