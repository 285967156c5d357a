//! Model organization engine.
//!
//! Turns a download folder (flat files and hub snapshot caches) into the
//! per-category layout an inference server expects:
//!
//! - `flattener`: discovers candidate files
//! - `classifier`: assigns each a [`Category`]
//! - `placement`: links or copies one file into place
//! - `scheduler`: runs placement over batches on a bounded worker pool
//! - `stats`: counts outcomes and inventories the destination

pub mod classifier;
mod engine;
pub mod flattener;
pub mod naming;
pub mod placement;
pub mod scheduler;
pub mod space;
pub mod stats;
pub mod types;
pub mod verify;

pub use classifier::{classify, classify_path, Classification, ClassificationReason};
pub use engine::Organizer;
pub use flattener::{flatten, scan_source, SourceScan};
pub use placement::PlacementEngine;
pub use scheduler::{BatchScheduler, Classified, ScheduleReport};
pub use space::{FixedFreeSpace, FsFreeSpace, FreeSpace};
pub use stats::{inventory, render_summary, DiscoveryDiagnostic, LibraryInventory, RunStats, RunSummary};
pub use types::{
    CacheIdentity, Candidate, Category, PlacementMethod, PlacementOutcome, PlacementPlan,
    PlacementStatus, SourceKind,
};
