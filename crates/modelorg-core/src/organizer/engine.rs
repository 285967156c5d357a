//! End-to-end organizer: scan, classify, place, report.

use crate::cancel::CancellationToken;
use crate::config::OrganizerConfig;
use crate::error::{OrganizerError, Result};
use crate::organizer::classifier::classify_path;
use crate::organizer::flattener::{scan_source, SourceScan};
use crate::organizer::placement::PlacementEngine;
use crate::organizer::scheduler::{BatchScheduler, Classified};
use crate::organizer::space::FreeSpace;
use crate::organizer::stats::{inventory, DiscoveryDiagnostic, RunStats, RunSummary};
use crate::organizer::types::{Candidate, Category, PlacementPlan};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Organizes one source directory into the configured destination tree.
#[derive(Debug, Clone)]
pub struct Organizer {
    config: OrganizerConfig,
    engine: PlacementEngine,
}

impl Organizer {
    /// Create an organizer. Fails only on invalid configuration.
    pub fn new(config: OrganizerConfig) -> Result<Self> {
        config.validate()?;
        let engine = PlacementEngine::new(&config.destination_root, config.strategy);
        Ok(Self { config, engine })
    }

    /// Replace the free-space source used before each placement.
    pub fn with_free_space(mut self, free_space: Arc<dyn FreeSpace>) -> Self {
        self.engine = self.engine.with_free_space(free_space);
        self
    }

    /// Create the destination root and every category directory.
    ///
    /// This is the only fatal step of a run.
    pub fn ensure_layout(&self) -> Result<()> {
        let root = &self.config.destination_root;
        for category in Category::ALL {
            let dir = category.dir_in(root);
            std::fs::create_dir_all(&dir).map_err(|e| OrganizerError::SetupFailed {
                path: dir.clone(),
                message: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Classify every candidate. Runs before any placement is scheduled.
    pub fn classify_all(&self, candidates: Vec<Candidate>) -> Vec<Classified> {
        candidates
            .into_iter()
            .map(|candidate| {
                let classification = classify_path(
                    &candidate.relative_path,
                    candidate.size_bytes,
                    &self.config.size_thresholds,
                );
                debug!(
                    path = %candidate.relative_path.display(),
                    category = %classification.category,
                    reason = ?classification.reason,
                    "Classified"
                );
                Classified {
                    candidate,
                    category: classification.category,
                }
            })
            .collect()
    }

    /// Organize everything under `source`.
    ///
    /// Per-file failures are reported in the summary. Only a destination that
    /// cannot be created is returned as an error.
    pub async fn run(&self, source: &Path, cancel: &CancellationToken) -> Result<RunSummary> {
        let started_at = Utc::now();
        let timer = Instant::now();

        self.ensure_layout()?;

        let scan = self.scan(source).await?;
        let total = scan.candidates.len();
        if total == 0 {
            info!("Nothing to organize in {}", scan.root.display());
        } else {
            info!(
                "Found {} model files in {} ({} cache repositories)",
                total,
                scan.root.display(),
                scan.cache_dirs.len()
            );
        }

        let classified = self.classify_all(scan.candidates.clone());
        let scheduler = BatchScheduler::new(
            self.engine.clone(),
            self.config.batch_size,
            self.config.max_workers,
            self.config.halt_after_failures,
        );
        let report = scheduler.run(classified, cancel).await;

        let stats = RunStats::from_outcomes(total, &report.outcomes);
        let library = inventory(&self.config.destination_root, &self.config.model_extensions());
        let diagnostic = DiscoveryDiagnostic::evaluate(&scan, &library);
        if let Some(diag) = &diagnostic {
            warn!(
                source_exists = diag.source_exists,
                files = diag.files_found,
                model_files = diag.model_files_found,
                cache_dirs = diag.cache_dirs.len(),
                "No models organized from a non-empty source"
            );
        }

        info!(
            "Organized {} of {} ({} already present, {} failed), {} models available",
            stats.placed, total, stats.skipped_exists, stats.failed, library.total
        );

        let failures = report
            .outcomes
            .iter()
            .filter(|o| o.is_failed())
            .cloned()
            .collect();

        Ok(RunSummary {
            source_dir: scan.root,
            destination_root: self.config.destination_root.clone(),
            started_at,
            duration_ms: u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX),
            workers: report.workers,
            stats,
            library,
            cancelled: report.cancelled,
            halted: report.halted,
            failures,
            diagnostic,
        })
    }

    /// Where each file under `source` would go, without placing anything.
    pub async fn preview(&self, source: &Path) -> Result<Vec<PlacementPlan>> {
        let scan = self.scan(source).await?;
        Ok(self
            .classify_all(scan.candidates)
            .iter()
            .map(|item| self.engine.plan(&item.candidate, item.category))
            .collect())
    }

    async fn scan(&self, source: &Path) -> Result<SourceScan> {
        let source = source.to_path_buf();
        let config = self.config.clone();
        tokio::task::spawn_blocking(move || scan_source(&source, &config))
            .await
            .map_err(|e| OrganizerError::Other(format!("Source scan task failed: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = OrganizerConfig::default();
        config.batch_size = 0;
        assert!(Organizer::new(config).is_err());
    }

    #[test]
    fn test_ensure_layout_creates_category_dirs() {
        let temp = TempDir::new().unwrap();
        let organizer =
            Organizer::new(OrganizerConfig::with_destination(temp.path().join("models"))).unwrap();

        organizer.ensure_layout().unwrap();
        organizer.ensure_layout().unwrap();

        for category in Category::ALL {
            assert!(category.dir_in(&temp.path().join("models")).is_dir());
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_ensure_layout_failure_is_setup_error() {
        let temp = TempDir::new().unwrap();
        let blocker = temp.path().join("models");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let organizer = Organizer::new(OrganizerConfig::with_destination(&blocker)).unwrap();

        let err = organizer.ensure_layout().unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_classify_all_keeps_order() {
        let organizer = Organizer::new(OrganizerConfig::default()).unwrap();
        let classified = organizer.classify_all(vec![
            Candidate::flat("/dl/x_vae.pt", "x_vae.pt", 1),
            Candidate::flat("/dl/y.pt", "y.pt", 1),
        ]);
        assert_eq!(classified[0].category, Category::Vae);
        assert_eq!(classified[1].category, Category::Embedding);
    }
}
