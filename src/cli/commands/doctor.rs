//! Doctor command - verify configuration and connectivity.

use crate::cli::Output;
use crate::config::Settings;
use crate::transport::{FetchRequest, HttpFetcher, ReqwestFetcher};
use console::style;
use std::path::Path;
use std::time::Duration;

/// Check result for a single item.
#[derive(Debug)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, PartialEq)]
pub enum CheckStatus {
    Ok,
    Warning,
    Error,
}

impl CheckResult {
    fn ok(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Ok,
            message: message.to_string(),
            hint: None,
        }
    }

    fn warning(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Warning,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn error(name: &str, message: &str, hint: &str) -> Self {
        Self {
            name: name.to_string(),
            status: CheckStatus::Error,
            message: message.to_string(),
            hint: Some(hint.to_string()),
        }
    }

    fn print(&self) {
        let icon = match self.status {
            CheckStatus::Ok => style("✓").green(),
            CheckStatus::Warning => style("!").yellow(),
            CheckStatus::Error => style("✗").red(),
        };

        println!("  {} {} - {}", icon, style(&self.name).bold(), self.message);

        if let Some(hint) = &self.hint {
            println!("    {} {}", style("→").dim(), style(hint).dim());
        }
    }
}

fn print_section(title: &str, checks: &[CheckResult]) {
    println!("{}", style(title).bold());
    for check in checks {
        check.print();
    }
    println!();
}

/// Run all diagnostic checks.
pub async fn run_doctor(settings: &Settings, config_path: Option<&Path>) -> anyhow::Result<()> {
    Output::header("Harvest Doctor");
    println!();

    let mut checks = Vec::new();

    let api = vec![check_openai_api_key()];
    print_section("API Configuration", &api);
    checks.extend(api);

    let dirs = check_directories(settings);
    print_section("Directories", &dirs);
    checks.extend(dirs);

    let config = vec![check_config_file(config_path)];
    print_section("Configuration", &config);
    checks.extend(config);

    let transcript = vec![check_backend(settings).await, check_sources(settings)];
    print_section("Transcript Sources", &transcript);
    checks.extend(transcript);

    let errors = checks.iter().filter(|c| c.status == CheckStatus::Error).count();
    let warnings = checks.iter().filter(|c| c.status == CheckStatus::Warning).count();

    if errors > 0 {
        Output::error(&format!(
            "{} error(s) found. Please fix them before running jobs.",
            errors
        ));
        std::process::exit(1);
    } else if warnings > 0 {
        Output::warning(&format!("All checks passed with {} warning(s).", warnings));
    } else {
        Output::success("All checks passed! Harvest is ready to use.");
    }

    Ok(())
}

/// Check if OpenAI API key is configured.
fn check_openai_api_key() -> CheckResult {
    match std::env::var("OPENAI_API_KEY") {
        Ok(key) if key.starts_with("sk-") && key.len() > 20 => {
            let masked = format!("{}...{}", &key[..7], &key[key.len() - 4..]);
            CheckResult::ok("OPENAI_API_KEY", &format!("configured ({})", masked))
        }
        Ok(key) if key.is_empty() => CheckResult::error(
            "OPENAI_API_KEY",
            "empty",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
        Ok(_) => CheckResult::warning(
            "OPENAI_API_KEY",
            "set but format looks unusual",
            "Expected format: sk-... (OpenAI API key)",
        ),
        Err(_) => CheckResult::error(
            "OPENAI_API_KEY",
            "not set",
            "Set with: export OPENAI_API_KEY='sk-...'",
        ),
    }
}

/// Check data directory and record store.
fn check_directories(settings: &Settings) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let data_dir = settings.data_dir();
    if data_dir.exists() {
        results.push(CheckResult::ok("Data directory", &data_dir.display().to_string()));
    } else {
        results.push(CheckResult::warning(
            "Data directory",
            &format!("{} (will be created)", data_dir.display()),
            "Directory will be created on first use",
        ));
    }

    let db_path = settings.sqlite_path();
    if db_path.exists() {
        let size = std::fs::metadata(&db_path)
            .map(|m| format_size(m.len()))
            .unwrap_or_else(|_| "unknown size".to_string());
        results.push(CheckResult::ok(
            "Record store",
            &format!("{} ({})", db_path.display(), size),
        ));
    } else {
        results.push(CheckResult::warning(
            "Record store",
            &format!("{} (not created yet)", db_path.display()),
            "Created on the first run",
        ));
    }

    results
}

/// Check if config file exists and parses.
fn check_config_file(config_path: Option<&Path>) -> CheckResult {
    let config_path = config_path
        .map(Path::to_path_buf)
        .unwrap_or_else(Settings::default_config_path);
    if !config_path.exists() {
        return CheckResult::warning(
            "Config file",
            "using defaults",
            "Create with: harvest init (or harvest config edit)",
        );
    }
    match Settings::load_from(Some(&config_path)) {
        Ok(_) => CheckResult::ok("Config file", &config_path.display().to_string()),
        Err(e) => CheckResult::error(
            "Config file",
            &format!("{} does not parse", config_path.display()),
            &e.to_string(),
        ),
    }
}

/// Check whether the local transcript backend answers.
async fn check_backend(settings: &Settings) -> CheckResult {
    let Some(base) = settings.transcript.backend_url.as_deref() else {
        return CheckResult::ok("Transcript backend", "not configured (remote methods only)");
    };
    let url = format!("{}/health", base.trim_end_matches('/'));
    let request = FetchRequest::get(&url).with_timeout(Duration::from_secs(3));

    let fetcher = match ReqwestFetcher::new() {
        Ok(fetcher) => fetcher,
        Err(e) => return CheckResult::error("Transcript backend", &e.to_string(), "Check TLS setup"),
    };
    match fetcher.fetch(&request).await {
        Ok(response) if response.is_success() => CheckResult::ok("Transcript backend", base),
        Ok(response) => CheckResult::warning(
            "Transcript backend",
            &format!("{} answered HTTP {}", base, response.status),
            "Remote methods will be used instead",
        ),
        Err(_) => CheckResult::warning(
            "Transcript backend",
            &format!("{} is not reachable", base),
            "Start the backend or remove transcript.backend_url",
        ),
    }
}

/// Summarize relays and mirrors.
fn check_sources(settings: &Settings) -> CheckResult {
    let relays = settings.transport.relays.len();
    let mirrors = settings.transcript.mirror_urls.len();
    let message = format!("{} relay(s), {} mirror(s)", relays, mirrors);
    if relays == 0 {
        CheckResult::error("Relays", &message, "Add at least the direct relay under [transport]")
    } else if relays == 1 && mirrors == 0 {
        CheckResult::warning(
            "Relays",
            &message,
            "Requests fail outright when the host blocks direct access",
        )
    } else {
        CheckResult::ok("Relays", &message)
    }
}

/// Format file size in human-readable format.
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("test", "failed", "fix it");
        assert_eq!(result.status, CheckStatus::Error);
        assert_eq!(result.hint, Some("fix it".to_string()));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
    }

    #[test]
    fn test_check_sources() {
        let mut settings = Settings::default();
        assert_eq!(check_sources(&settings).status, CheckStatus::Warning);
        settings.transcript.mirror_urls.push("https://mirror.example".to_string());
        assert_eq!(check_sources(&settings).status, CheckStatus::Ok);
        settings.transport.relays.clear();
        assert_eq!(check_sources(&settings).status, CheckStatus::Error);
    }

    #[tokio::test]
    async fn test_backend_not_configured_is_ok() {
        let settings = Settings::default();
        assert_eq!(check_backend(&settings).await.status, CheckStatus::Ok);
    }
}
