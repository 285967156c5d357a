//! Modelorg Core - sorts downloaded model weights into an inference server's
//! model tree.
//!
//! Files arrive from plain download folders and from HuggingFace-style
//! snapshot caches. Each is classified (checkpoint, LoRA, VAE, ...), then
//! symlinked, hardlinked, or copied with verification into its category
//! directory. Re-running against an organized tree changes nothing.
//!
//! # Example
//!
//! ```rust,no_run
//! use modelorg_core::{CancellationToken, Organizer, OrganizerConfig};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> modelorg_core::Result<()> {
//!     let organizer = Organizer::new(OrganizerConfig::with_destination("/workspace/ComfyUI/models"))?;
//!     let summary = organizer
//!         .run(Path::new("/workspace/downloads"), &CancellationToken::new())
//!         .await?;
//!     print!("{}", modelorg_core::organizer::render_summary(&summary));
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod organizer;

pub use cancel::CancellationToken;
pub use config::{OrganizerConfig, PlacementStrategy, SizeThresholds};
pub use error::{FailureKind, OrganizerError, Result};
pub use organizer::{
    Candidate, Category, Organizer, PlacementMethod, PlacementOutcome, PlacementStatus, RunSummary,
};
