//! Argument parsing and output formatting for `organize-models`.

use anyhow::{Context, Result};
use clap::Parser;
use modelorg_core::organizer::{PlacementPlan, RunSummary};
use modelorg_core::{OrganizerConfig, OrganizerError, PlacementStrategy};
use std::fmt::Write as _;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "organize-models")]
#[command(about = "Sort downloaded model weights into the inference server's model tree")]
pub struct Args {
    /// Folder holding downloaded models (flat files or hub cache snapshots)
    pub source: PathBuf,

    /// Destination models root [default: /workspace/ComfyUI/models]
    #[arg(long, env = "MODELS_DIR")]
    pub models_dir: Option<PathBuf>,

    /// JSON config file; flags given here override it
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Files per placement batch
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Upper bound on concurrent placement workers
    #[arg(long)]
    pub workers: Option<usize>,

    /// Stop dispatching batches after this many failures
    #[arg(long)]
    pub halt_after_failures: Option<usize>,

    /// Maximum directory depth scanned below the source
    #[arg(long)]
    pub max_depth: Option<usize>,

    /// Always copy (with verification) instead of linking
    #[arg(long)]
    pub copy: bool,

    /// Print where each file would go without placing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,
}

/// Merge the config file (if any) with command-line overrides.
pub fn build_config(args: &Args) -> Result<OrganizerConfig> {
    let mut config = match &args.config {
        Some(path) => OrganizerConfig::load(path)
            .with_context(|| format!("Cannot load config {}", path.display()))?,
        None => OrganizerConfig::default(),
    };

    if let Some(dir) = &args.models_dir {
        config.destination_root = dir.clone();
    }
    if let Some(batch_size) = args.batch_size {
        config.batch_size = batch_size;
    }
    if let Some(workers) = args.workers {
        config.max_workers = Some(workers);
    }
    if let Some(limit) = args.halt_after_failures {
        config.halt_after_failures = Some(limit);
    }
    if let Some(depth) = args.max_depth {
        config.max_depth = depth;
    }
    if args.copy {
        config.strategy = PlacementStrategy::CopyOnly;
    }

    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// One line per planned placement.
pub fn render_plan(plans: &[PlacementPlan]) -> String {
    let mut out = String::new();
    if plans.is_empty() {
        let _ = writeln!(out, "Nothing to organize: no model files found in source.");
        return out;
    }
    for plan in plans {
        let _ = writeln!(
            out,
            "{:<12} {} -> {}{}",
            plan.category.as_str(),
            plan.source_path.display(),
            plan.destination_path.display(),
            if plan.already_exists { " (exists)" } else { "" }
        );
    }
    let pending = plans.iter().filter(|p| !p.already_exists).count();
    let _ = writeln!(out, "{} of {} files would be placed", pending, plans.len());
    out
}

/// Attach operator context to a failed run. Only a destination that could
/// not be prepared is labelled as such.
pub fn finish_run(result: modelorg_core::Result<RunSummary>) -> Result<RunSummary> {
    match result {
        Ok(summary) => Ok(summary),
        Err(e @ OrganizerError::SetupFailed { .. }) => {
            Err(anyhow::Error::new(e).context("Cannot prepare destination models root"))
        }
        Err(e) => Err(e.into()),
    }
}
