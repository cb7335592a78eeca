//! Harvest CLI entry point.

use anyhow::Result;
use clap::Parser;
use harvest::cli::{commands, Cli, Commands};
use harvest::config::Settings;
use harvest::orchestrator::RunOptions;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("harvest={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config_path = cli.config.as_ref().map(PathBuf::from);
    let settings = Settings::load_from(config_path.as_ref())?;

    std::fs::create_dir_all(settings.data_dir())?;

    match &cli.command {
        Commands::Init => {
            commands::run_init(&settings)?;
        }

        Commands::Doctor => {
            commands::run_doctor(&settings, config_path.as_deref()).await?;
        }

        Commands::Run {
            channel_url,
            strategy,
            max_videos,
            categories,
            force,
        } => {
            let run = RunOptions {
                strategy: *strategy,
                max_videos: *max_videos,
                categories: categories.clone(),
                force: *force,
            };
            commands::run_job(channel_url, run, settings).await?;
        }

        Commands::Resume { job_id } => {
            commands::run_resume(job_id, settings).await?;
        }

        Commands::Pause { job_id } => {
            commands::run_pause(job_id, settings).await?;
        }

        Commands::Jobs { action } => {
            commands::run_jobs(action.as_ref(), settings).await?;
        }

        Commands::Review { action } => {
            commands::run_review(action, settings).await?;
        }

        Commands::Channels { action } => {
            commands::run_channels(action, settings).await?;
        }

        Commands::Stats => {
            commands::run_stats(settings).await?;
        }

        Commands::Transcript {
            video,
            format,
            output,
        } => {
            commands::run_transcript(video, format, output.as_deref(), settings).await?;
        }

        Commands::Sample {
            channel_url,
            strategy,
            max_videos,
            force,
        } => {
            let run = RunOptions {
                strategy: *strategy,
                max_videos: *max_videos,
                categories: Vec::new(),
                force: *force,
            };
            commands::run_sample(channel_url, run, settings).await?;
        }

        Commands::Serve { host, port } => {
            commands::run_serve(host, *port, settings).await?;
        }

        Commands::Config { action } => {
            commands::run_config(action, settings, config_path)?;
        }
    }

    Ok(())
}
