//! Run statistics, destination inventory, and the operator summary.

use crate::error::FailureKind;
use crate::organizer::flattener::SourceScan;
use crate::organizer::types::{Category, PlacementMethod, PlacementOutcome, PlacementStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Depth scanned inside each category directory (allows one level of
/// operator-created subfolders).
const INVENTORY_MAX_DEPTH: usize = 2;

/// Outcome counters for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub total_candidates: usize,
    pub placed: usize,
    pub skipped_exists: usize,
    pub failed: usize,
    /// Never dispatched because the run was cancelled or halted.
    pub not_attempted: usize,
    pub placed_by_category: BTreeMap<Category, usize>,
    pub placed_by_method: BTreeMap<PlacementMethod, usize>,
    pub failed_by_kind: BTreeMap<FailureKind, usize>,
}

impl RunStats {
    pub fn new(total_candidates: usize) -> Self {
        Self {
            total_candidates,
            ..Self::default()
        }
    }

    /// Build counters from a finished outcome list.
    pub fn from_outcomes(total_candidates: usize, outcomes: &[PlacementOutcome]) -> Self {
        let mut stats = Self::new(total_candidates);
        for outcome in outcomes {
            stats.record(outcome);
        }
        stats.not_attempted = total_candidates.saturating_sub(stats.processed());
        stats
    }

    pub fn record(&mut self, outcome: &PlacementOutcome) {
        match outcome.status {
            PlacementStatus::Placed => {
                self.placed += 1;
                *self.placed_by_category.entry(outcome.category).or_default() += 1;
                if let Some(method) = outcome.method {
                    *self.placed_by_method.entry(method).or_default() += 1;
                }
            }
            PlacementStatus::SkippedExists => self.skipped_exists += 1,
            PlacementStatus::Failed => {
                self.failed += 1;
                let kind = outcome.failure_kind.unwrap_or(FailureKind::Io);
                *self.failed_by_kind.entry(kind).or_default() += 1;
            }
        }
    }

    /// Outcomes recorded so far.
    pub fn processed(&self) -> usize {
        self.placed + self.skipped_exists + self.failed
    }

    /// Every discovered candidate is accounted for exactly once.
    pub fn is_conserved(&self) -> bool {
        self.processed() + self.not_attempted == self.total_candidates
    }
}

/// Model files resident in the destination tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LibraryInventory {
    pub by_category: BTreeMap<Category, usize>,
    pub total: usize,
}

/// Count model files in every category directory, including ones placed by
/// earlier runs. Dangling links are not counted.
pub fn inventory(destination_root: &Path, extensions: &[&str]) -> LibraryInventory {
    let mut inv = LibraryInventory::default();

    for category in Category::ALL {
        let dir = category.dir_in(destination_root);
        let count = WalkDir::new(&dir)
            .min_depth(1)
            .max_depth(INVENTORY_MAX_DEPTH)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|x| x.to_str())
                    .is_some_and(|x| extensions.contains(&x.to_lowercase().as_str()))
            })
            .count();
        inv.by_category.insert(category, count);
        inv.total += count;
    }

    inv
}

/// Facts printed when a non-empty source produced an empty library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveryDiagnostic {
    pub source_dir: PathBuf,
    pub source_exists: bool,
    pub files_found: usize,
    pub model_files_found: usize,
    pub cache_dirs: Vec<PathBuf>,
}

impl DiscoveryDiagnostic {
    /// Diagnostic for a run, if one is warranted.
    pub fn evaluate(scan: &SourceScan, library: &LibraryInventory) -> Option<Self> {
        if library.total > 0 || scan.files_seen == 0 {
            return None;
        }
        Some(Self {
            source_dir: scan.root.clone(),
            source_exists: scan.root_exists,
            files_found: scan.files_seen,
            model_files_found: scan.model_files,
            cache_dirs: scan.cache_dirs.clone(),
        })
    }
}

/// Aggregate of one organizer invocation.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub source_dir: PathBuf,
    pub destination_root: PathBuf,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub workers: usize,
    pub stats: RunStats,
    pub library: LibraryInventory,
    pub cancelled: bool,
    pub halted: bool,
    pub failures: Vec<PlacementOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<DiscoveryDiagnostic>,
}

impl RunSummary {
    pub fn nothing_to_organize(&self) -> bool {
        self.stats.total_candidates == 0
    }

    /// Model files now available to the inference server.
    pub fn grand_total(&self) -> usize {
        self.library.total
    }
}

/// Human-readable report. Organized and failed counts are always present.
pub fn render_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let stats = &summary.stats;

    let _ = writeln!(out, "==== Model organization summary ====");
    let _ = writeln!(out, "Source:       {}", summary.source_dir.display());
    let _ = writeln!(out, "Destination:  {}", summary.destination_root.display());

    if summary.nothing_to_organize() {
        let _ = writeln!(out, "Nothing to organize: no model files found in source.");
    } else {
        let _ = writeln!(out, "Candidates:   {}", stats.total_candidates);
    }
    let _ = writeln!(
        out,
        "Organized:    {}{}",
        stats.placed,
        breakdown(stats.placed_by_method.iter().map(|(m, n)| (m.as_str(), *n)))
    );
    let _ = writeln!(out, "Already present: {}", stats.skipped_exists);
    let _ = writeln!(
        out,
        "Failed:       {}{}",
        stats.failed,
        breakdown(stats.failed_by_kind.iter().map(|(k, n)| (k.as_str(), *n)))
    );
    if stats.not_attempted > 0 {
        let _ = writeln!(out, "Not attempted: {}", stats.not_attempted);
    }
    if !stats.placed_by_category.is_empty() {
        let _ = writeln!(
            out,
            "Organized by category:{}",
            breakdown(stats.placed_by_category.iter().map(|(c, n)| (c.as_str(), *n)))
        );
    }

    if summary.cancelled {
        let _ = writeln!(out, "Run cancelled before all batches were dispatched.");
    }
    if summary.halted {
        let _ = writeln!(out, "Run halted after reaching the failure threshold.");
    }

    if !summary.failures.is_empty() {
        let _ = writeln!(out, "Failures:");
        for failure in &summary.failures {
            let _ = writeln!(
                out,
                "  - {} -> {}: {}",
                failure.source_path.display(),
                failure.category,
                failure.error_detail.as_deref().unwrap_or("unknown error")
            );
        }
    }

    let _ = writeln!(out, "Library contents:");
    for (category, count) in &summary.library.by_category {
        let _ = writeln!(out, "  {:<16} {}", category.dir_name(), count);
    }
    let _ = writeln!(out, "Total models available: {}", summary.grand_total());

    if let Some(diag) = &summary.diagnostic {
        let _ = writeln!(out, "WARNING: no models organized. Discovery details:");
        let _ = writeln!(out, "  source exists:      {}", diag.source_exists);
        let _ = writeln!(out, "  files found:        {}", diag.files_found);
        let _ = writeln!(out, "  model files found:  {}", diag.model_files_found);
        if diag.cache_dirs.is_empty() {
            let _ = writeln!(out, "  cache directories:  none");
        } else {
            let _ = writeln!(out, "  cache directories:");
            for dir in &diag.cache_dirs {
                let _ = writeln!(out, "    {}", dir.display());
            }
        }
    }

    out
}

fn breakdown<'a>(parts: impl Iterator<Item = (&'a str, usize)>) -> String {
    let parts: Vec<String> = parts.map(|(name, n)| format!("{} {}", name, n)).collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::organizer::types::Candidate;
    use tempfile::TempDir;

    fn outcomes() -> Vec<PlacementOutcome> {
        let c = |n: &str| Candidate::flat(format!("/dl/{}", n), n, 1);
        vec![
            PlacementOutcome::placed(&c("a"), Category::Lora, "/m/loras/a".into(), PlacementMethod::Symlink),
            PlacementOutcome::placed(&c("b"), Category::Lora, "/m/loras/b".into(), PlacementMethod::CopyVerified),
            PlacementOutcome::placed(&c("c"), Category::Vae, "/m/vae/c".into(), PlacementMethod::Symlink),
            PlacementOutcome::skipped_exists(&c("d"), Category::Checkpoint, "/m/checkpoints/d".into()),
            PlacementOutcome::failed(&c("e"), Category::Checkpoint, "/m/checkpoints/e".into(), FailureKind::Space, "insufficient space"),
        ]
    }

    fn summary(stats: RunStats, library: LibraryInventory) -> RunSummary {
        RunSummary {
            source_dir: "/dl".into(),
            destination_root: "/m".into(),
            started_at: Utc::now(),
            duration_ms: 5,
            workers: 2,
            stats,
            library,
            cancelled: false,
            halted: false,
            failures: Vec::new(),
            diagnostic: None,
        }
    }

    #[test]
    fn test_counts() {
        let stats = RunStats::from_outcomes(5, &outcomes());
        assert_eq!(stats.placed, 3);
        assert_eq!(stats.skipped_exists, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.placed_by_category[&Category::Lora], 2);
        assert_eq!(stats.placed_by_method[&PlacementMethod::Symlink], 2);
        assert_eq!(stats.failed_by_kind[&FailureKind::Space], 1);
        assert!(!stats.placed_by_category.contains_key(&Category::Checkpoint));
        assert!(stats.is_conserved());
    }

    #[test]
    fn test_not_attempted_keeps_conservation() {
        let stats = RunStats::from_outcomes(8, &outcomes());
        assert_eq!(stats.not_attempted, 3);
        assert!(stats.is_conserved());
    }

    #[test]
    fn test_inventory_counts_existing_models() {
        let temp = TempDir::new().unwrap();
        let loras = temp.path().join("loras/sdxl");
        std::fs::create_dir_all(&loras).unwrap();
        std::fs::write(loras.join("a.safetensors"), b"x").unwrap();
        std::fs::write(temp.path().join("loras/b.pt"), b"x").unwrap();
        std::fs::write(temp.path().join("loras/notes.txt"), b"x").unwrap();

        let inv = inventory(temp.path(), &["safetensors", "pt"]);

        assert_eq!(inv.by_category[&Category::Lora], 2);
        assert_eq!(inv.by_category[&Category::Checkpoint], 0);
        assert_eq!(inv.total, 2);
    }

    #[test]
    fn test_diagnostic_conditions() {
        let empty_lib = LibraryInventory::default();
        let mut scan = SourceScan {
            root: "/dl".into(),
            root_exists: true,
            ..SourceScan::default()
        };
        // Empty source: nothing expected, no warning
        assert!(DiscoveryDiagnostic::evaluate(&scan, &empty_lib).is_none());

        scan.files_seen = 3;
        scan.cache_dirs = vec!["/dl/models--a--b".into()];
        let diag = DiscoveryDiagnostic::evaluate(&scan, &empty_lib).unwrap();
        assert_eq!(diag.files_found, 3);
        assert_eq!(diag.model_files_found, 0);

        let lib = LibraryInventory {
            total: 1,
            ..LibraryInventory::default()
        };
        assert!(DiscoveryDiagnostic::evaluate(&scan, &lib).is_none());
    }

    #[test]
    fn test_render_summary() {
        let all = outcomes();
        let mut s = summary(RunStats::from_outcomes(5, &all), LibraryInventory {
            by_category: [(Category::Lora, 2), (Category::Vae, 1)].into_iter().collect(),
            total: 3,
        });
        s.failures = all.into_iter().filter(|o| o.is_failed()).collect();

        let text = render_summary(&s);

        assert!(text.contains("Organized:    3 (symlink 2, copy_verified 1)"));
        assert!(text.contains("Failed:       1 (space 1)"));
        assert!(text.contains("/dl/e -> checkpoint: insufficient space"));
        assert!(text.contains("Total models available: 3"));
        assert!(!text.contains("WARNING"));
    }

    #[test]
    fn test_render_nothing_to_organize() {
        let text = render_summary(&summary(RunStats::new(0), LibraryInventory::default()));
        assert!(text.contains("Nothing to organize"));
        assert!(text.contains("Failed:       0\n"));
        assert!(text.contains("Total models available: 0"));
    }
}
