//! organize-models - container startup step that sorts downloaded models.
//!
//! Runs the organizer once against a source folder and prints a summary.
//! Per-file problems are reported, not fatal; only an unusable configuration
//! or destination root exits non-zero.

mod cli;
mod signals;

use anyhow::{Context, Result};
use clap::Parser;
use modelorg_core::organizer::render_summary;
use modelorg_core::{CancellationToken, Organizer};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    // Logs go to stderr so stdout carries only the summary
    let default_level = if args.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = cli::build_config(&args)?;
    info!(
        "Organizing {} into {}",
        args.source.display(),
        config.destination_root.display()
    );
    let organizer = Organizer::new(config)?;

    if args.dry_run {
        let plans = organizer.preview(&args.source).await?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&plans)?);
        } else {
            print!("{}", cli::render_plan(&plans));
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let listener = signals::spawn_shutdown_listener(cancel.clone())
        .context("Cannot install shutdown signal handlers")?;

    let result = organizer.run(&args.source, &cancel).await;
    listener.abort();
    let summary = cli::finish_run(result)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render_summary(&summary));
    }

    Ok(())
}
