//! Serve command: the HTTP review API.

use super::open_records;
use crate::cli::Output;
use crate::config::Settings;
use crate::server::{router, AppState};
use std::sync::Arc;

/// Run the HTTP API server.
pub async fn run_serve(host: &str, port: u16, settings: Settings) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(open_records(&settings)?));
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    Output::header("Harvest Review API");
    println!();
    Output::success(&format!("Listening on http://{}", addr));
    println!();
    println!("Endpoints:");
    Output::kv("Health", "GET  /health");
    Output::kv("Pending", "GET  /insights/pending?category=&flagged=");
    Output::kv("Approve", "POST /insights/{id}/approve");
    Output::kv("Reject", "POST /insights/{id}/reject  {\"reason\": \"...\"}");
    Output::kv("Jobs", "GET  /jobs");
    Output::kv("Stats", "GET  /stats");
    println!();
    Output::info("Press Ctrl+C to stop the server.");

    axum::serve(listener, app).await?;

    Ok(())
}
