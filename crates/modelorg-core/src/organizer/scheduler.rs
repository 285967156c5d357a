//! Concurrent placement over fixed-size batches.
//!
//! Each batch is placed sequentially on the blocking pool and returns its own
//! outcome list; lists are merged when batches are joined. The only state
//! shared between workers is the failure counter used by the halt policy.

use crate::cancel::CancellationToken;
use crate::organizer::placement::PlacementEngine;
use crate::organizer::types::{Candidate, Category, PlacementOutcome, PlacementStatus};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// A candidate paired with the category it was classified into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub candidate: Candidate,
    pub category: Category,
}

/// Merged result of a scheduled run.
#[derive(Debug, Clone, Default)]
pub struct ScheduleReport {
    /// Outcomes sorted by source path.
    pub outcomes: Vec<PlacementOutcome>,
    pub batches_total: usize,
    pub batches_run: usize,
    /// Candidates that never reached the placement engine.
    pub not_attempted: usize,
    pub cancelled: bool,
    /// Dispatch stopped by the failure threshold.
    pub halted: bool,
    pub workers: usize,
}

/// Why dispatch stopped early.
enum StopReason {
    Cancelled,
    Halted,
}

/// Bounded worker pool over placement batches.
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    engine: PlacementEngine,
    batch_size: usize,
    workers: usize,
    halt_after_failures: Option<usize>,
}

impl BatchScheduler {
    /// `max_workers` caps the host's available parallelism.
    pub fn new(
        engine: PlacementEngine,
        batch_size: usize,
        max_workers: Option<usize>,
        halt_after_failures: Option<usize>,
    ) -> Self {
        Self {
            engine,
            batch_size: batch_size.max(1),
            workers: resolve_workers(max_workers),
            halt_after_failures,
        }
    }

    /// Place every item, concurrently when more than one worker is available.
    pub async fn run(&self, items: Vec<Classified>, cancel: &CancellationToken) -> ScheduleReport {
        if self.workers <= 1 {
            let scheduler = self.clone();
            let cancel = cancel.clone();
            let total = items.len();
            return match tokio::task::spawn_blocking(move || scheduler.run_sequential(items, &cancel)).await {
                Ok(report) => report,
                Err(e) => {
                    error!("Sequential placement worker failed: {}", e);
                    ScheduleReport {
                        not_attempted: total,
                        workers: 1,
                        ..ScheduleReport::default()
                    }
                }
            };
        }
        self.run_parallel(items, cancel).await
    }

    /// Place every item on the calling thread, batch by batch.
    pub fn run_sequential(&self, items: Vec<Classified>, cancel: &CancellationToken) -> ScheduleReport {
        let total = items.len();
        let batches = into_batches(items, self.batch_size);
        let batches_total = batches.len();
        let failures = AtomicUsize::new(0);

        let mut report = ScheduleReport {
            batches_total,
            workers: 1,
            ..ScheduleReport::default()
        };

        for (index, batch) in batches.into_iter().enumerate() {
            if let Some(reason) = self.stop_reason(cancel, &failures) {
                report.mark_stopped(reason);
                break;
            }
            report
                .outcomes
                .extend(place_batch(&self.engine, index, batches_total, &batch, &failures));
            report.batches_run += 1;
        }

        report.finish(total);
        report
    }

    async fn run_parallel(&self, items: Vec<Classified>, cancel: &CancellationToken) -> ScheduleReport {
        let total = items.len();
        let batches = into_batches(items, self.batch_size);
        let batches_total = batches.len();
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let failures = Arc::new(AtomicUsize::new(0));
        let mut join_set: JoinSet<Vec<PlacementOutcome>> = JoinSet::new();

        let mut report = ScheduleReport {
            batches_total,
            workers: self.workers,
            ..ScheduleReport::default()
        };

        debug!(
            "Dispatching {} batches of up to {} files on {} workers",
            batches_total, self.batch_size, self.workers
        );

        for (index, batch) in batches.into_iter().enumerate() {
            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    error!("Placement worker pool closed");
                    break;
                }
            };
            // Checked after the permit so completed batches' failures count
            if let Some(reason) = self.stop_reason(cancel, &failures) {
                report.mark_stopped(reason);
                break;
            }

            let engine = self.engine.clone();
            let failures = failures.clone();
            join_set.spawn_blocking(move || {
                let _permit = permit;
                place_batch(&engine, index, batches_total, &batch, &failures)
            });
            report.batches_run += 1;
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(outcomes) => report.outcomes.extend(outcomes),
                Err(e) => error!("Placement batch aborted: {}", e),
            }
        }

        report.finish(total);
        report
    }

    fn stop_reason(&self, cancel: &CancellationToken, failures: &AtomicUsize) -> Option<StopReason> {
        if cancel.check().is_err() {
            return Some(StopReason::Cancelled);
        }
        match self.halt_after_failures {
            Some(limit) if failures.load(Ordering::SeqCst) >= limit => Some(StopReason::Halted),
            _ => None,
        }
    }
}

impl ScheduleReport {
    fn mark_stopped(&mut self, reason: StopReason) {
        match reason {
            StopReason::Cancelled => {
                info!("Cancellation requested, no further batches will be dispatched");
                self.cancelled = true;
            }
            StopReason::Halted => {
                warn!("Failure threshold reached, no further batches will be dispatched");
                self.halted = true;
            }
        }
    }

    fn finish(&mut self, total: usize) {
        self.outcomes
            .sort_by(|a, b| a.source_path.cmp(&b.source_path));
        self.not_attempted = total.saturating_sub(self.outcomes.len());
    }
}

/// Available parallelism, capped by `max_workers`. Falls back to one worker
/// when the host cannot report its parallelism.
pub fn resolve_workers(max_workers: Option<usize>) -> usize {
    let available = match std::thread::available_parallelism() {
        Ok(n) => n.get(),
        Err(e) => {
            debug!("Available parallelism unknown ({}), running sequentially", e);
            1
        }
    };
    match max_workers {
        Some(cap) => available.min(cap).max(1),
        None => available,
    }
}

fn into_batches(items: Vec<Classified>, batch_size: usize) -> Vec<Vec<Classified>> {
    let mut batches = Vec::with_capacity(items.len().div_ceil(batch_size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(batch_size).collect());
    }
    batches
}

fn place_batch(
    engine: &PlacementEngine,
    index: usize,
    batches_total: usize,
    batch: &[Classified],
    failures: &AtomicUsize,
) -> Vec<PlacementOutcome> {
    let mut outcomes = Vec::with_capacity(batch.len());
    for item in batch {
        let outcome = engine.place(&item.candidate, item.category);
        if outcome.status == PlacementStatus::Failed {
            failures.fetch_add(1, Ordering::SeqCst);
        }
        outcomes.push(outcome);
    }

    let placed = outcomes
        .iter()
        .filter(|o| o.status == PlacementStatus::Placed)
        .count();
    let failed = outcomes.iter().filter(|o| o.is_failed()).count();
    info!(
        "Batch {}/{}: {} files, {} placed, {} skipped, {} failed",
        index + 1,
        batches_total,
        outcomes.len(),
        placed,
        outcomes.len() - placed - failed,
        failed
    );
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlacementStrategy;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn items(dir: &Path, count: usize) -> Vec<Classified> {
        (0..count)
            .map(|i| {
                let name = format!("file_{:03}.safetensors", i);
                let path = dir.join(&name);
                std::fs::write(&path, format!("content {}", i)).unwrap();
                Classified {
                    candidate: Candidate::flat(path, name, 10),
                    category: Category::Checkpoint,
                }
            })
            .collect()
    }

    fn missing(dir: &Path, count: usize) -> Vec<Classified> {
        (0..count)
            .map(|i| {
                let name = format!("missing_{:03}.safetensors", i);
                Classified {
                    candidate: Candidate::flat(dir.join(&name), name, 10),
                    category: Category::Lora,
                }
            })
            .collect()
    }

    fn scheduler(dest: PathBuf, batch: usize, workers: Option<usize>, halt: Option<usize>) -> BatchScheduler {
        BatchScheduler::new(
            PlacementEngine::new(dest, PlacementStrategy::CopyOnly),
            batch,
            workers,
            halt,
        )
    }

    #[test]
    fn test_into_batches() {
        let temp = TempDir::new().unwrap();
        let batches = into_batches(items(temp.path(), 7), 3);
        let sizes: Vec<_> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert!(into_batches(Vec::new(), 3).is_empty());
    }

    #[test]
    fn test_resolve_workers_cap() {
        assert_eq!(resolve_workers(Some(1)), 1);
        assert!(resolve_workers(None) >= 1);
        assert!(resolve_workers(Some(2)) <= 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_parallel_places_everything() {
        let temp = TempDir::new().unwrap();
        let work = items(temp.path(), 20);
        let sched = scheduler(temp.path().join("models"), 3, Some(4), None);

        let report = sched.run(work, &CancellationToken::new()).await;

        assert_eq!(report.outcomes.len(), 20);
        assert_eq!(report.batches_total, 7);
        assert_eq!(report.batches_run, 7);
        assert_eq!(report.not_attempted, 0);
        assert!(report
            .outcomes
            .iter()
            .all(|o| o.status == PlacementStatus::Placed));
        assert!(report
            .outcomes
            .windows(2)
            .all(|w| w[0].source_path <= w[1].source_path));
    }

    #[test]
    fn test_sequential_matches_parallel_semantics() {
        let temp = TempDir::new().unwrap();
        let mut work = items(temp.path(), 5);
        work.extend(missing(temp.path(), 2));
        let sched = scheduler(temp.path().join("models"), 2, Some(1), None);

        let report = sched.run_sequential(work, &CancellationToken::new());

        assert_eq!(report.workers, 1);
        assert_eq!(report.outcomes.len(), 7);
        assert_eq!(report.outcomes.iter().filter(|o| o.is_failed()).count(), 2);
    }

    #[test]
    fn test_cancelled_before_dispatch() {
        let temp = TempDir::new().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let sched = scheduler(temp.path().join("models"), 2, Some(1), None);

        let report = sched.run_sequential(items(temp.path(), 4), &cancel);

        assert!(report.cancelled);
        assert_eq!(report.batches_run, 0);
        assert_eq!(report.not_attempted, 4);
    }

    #[test]
    fn test_halt_after_failures() {
        let temp = TempDir::new().unwrap();
        let mut work = missing(temp.path(), 2);
        work.extend(items(temp.path(), 4));
        let sched = scheduler(temp.path().join("models"), 2, Some(1), Some(2));

        let report = sched.run_sequential(work, &CancellationToken::new());

        assert!(report.halted);
        assert_eq!(report.batches_run, 1);
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.not_attempted, 4);
    }

    #[tokio::test]
    async fn test_single_worker_run_uses_sequential_path() {
        let temp = TempDir::new().unwrap();
        let sched = scheduler(temp.path().join("models"), 4, Some(1), None);

        let report = sched.run(items(temp.path(), 5), &CancellationToken::new()).await;

        assert_eq!(report.workers, 1);
        assert_eq!(report.outcomes.len(), 5);
    }
}
