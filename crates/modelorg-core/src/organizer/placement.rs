//! Placement of candidates into the category tree.
//!
//! Creates symlinks (or hardlinks/verified copies as fallback) from downloaded
//! files to `<destination_root>/<category dir>/<name>`. An occupied destination
//! is never overwritten, which is what makes repeated runs idempotent.

use crate::config::PlacementStrategy;
use crate::error::{OrganizerError, Result};
use crate::organizer::naming::destination_file_name;
use crate::organizer::space::{FsFreeSpace, FreeSpace};
use crate::organizer::types::{
    Candidate, Category, PlacementMethod, PlacementOutcome, PlacementPlan,
};
use crate::organizer::verify::verify_same_content;
use std::fs::OpenOptions;
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Creates the links tried before a copy.
pub trait Linker: Send + Sync {
    fn symlink(&self, source: &Path, destination: &Path) -> io::Result<()>;
    fn hard_link(&self, source: &Path, destination: &Path) -> io::Result<()>;
}

/// Links through the platform filesystem calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsLinker;

impl Linker for FsLinker {
    #[cfg(unix)]
    fn symlink(&self, source: &Path, destination: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(source, destination)
    }

    #[cfg(windows)]
    fn symlink(&self, source: &Path, destination: &Path) -> io::Result<()> {
        std::os::windows::fs::symlink_file(source, destination)
    }

    fn hard_link(&self, source: &Path, destination: &Path) -> io::Result<()> {
        std::fs::hard_link(source, destination)
    }
}

/// Compares a finished copy against its source, returning the digest.
type ContentCheck = fn(&Path, &Path) -> Result<String>;

fn check_copy(source: &Path, copy: &Path) -> Result<String> {
    verify_same_content(source, copy)
}

/// Materializes candidates at their canonical destination.
#[derive(Clone)]
pub struct PlacementEngine {
    destination_root: PathBuf,
    strategy: PlacementStrategy,
    space: Arc<dyn FreeSpace>,
    linker: Arc<dyn Linker>,
    check: ContentCheck,
}

impl std::fmt::Debug for PlacementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlacementEngine")
            .field("destination_root", &self.destination_root)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl PlacementEngine {
    /// Create an engine writing below `destination_root`.
    pub fn new(destination_root: impl Into<PathBuf>, strategy: PlacementStrategy) -> Self {
        Self {
            destination_root: destination_root.into(),
            strategy,
            space: Arc::new(FsFreeSpace),
            linker: Arc::new(FsLinker),
            check: check_copy,
        }
    }

    /// Replace how symlinks and hardlinks are created.
    pub fn with_linker(mut self, linker: Arc<dyn Linker>) -> Self {
        self.linker = linker;
        self
    }

    #[cfg(test)]
    fn with_content_check(mut self, check: ContentCheck) -> Self {
        self.check = check;
        self
    }

    /// Replace the free-space source.
    pub fn with_free_space(mut self, free_space: Arc<dyn FreeSpace>) -> Self {
        self.space = free_space;
        self
    }

    /// Full destination path for a candidate in a category.
    pub fn destination_for(&self, candidate: &Candidate, category: Category) -> PathBuf {
        category
            .dir_in(&self.destination_root)
            .join(destination_file_name(candidate))
    }

    /// Where the candidate would go, without touching anything.
    pub fn plan(&self, candidate: &Candidate, category: Category) -> PlacementPlan {
        let destination_path = self.destination_for(candidate, category);
        PlacementPlan {
            source_path: candidate.source_path.clone(),
            category,
            already_exists: destination_occupied(&destination_path),
            destination_path,
        }
    }

    /// Place one candidate. Never returns an error; failures become outcomes.
    pub fn place(&self, candidate: &Candidate, category: Category) -> PlacementOutcome {
        let destination = self.destination_for(candidate, category);

        match self.try_place(candidate, &destination) {
            Ok(Some(method)) => {
                info!(
                    source = %candidate.source_path.display(),
                    destination = %destination.display(),
                    category = %category,
                    method = %method,
                    "Placed model"
                );
                PlacementOutcome::placed(candidate, category, destination, method)
            }
            Ok(None) => {
                debug!(
                    source = %candidate.source_path.display(),
                    destination = %destination.display(),
                    category = %category,
                    "Destination exists, skipping"
                );
                PlacementOutcome::skipped_exists(candidate, category, destination)
            }
            Err(e) => {
                let kind = e.failure_kind();
                warn!(
                    source = %candidate.source_path.display(),
                    destination = %destination.display(),
                    category = %category,
                    kind = %kind,
                    error = %e,
                    "Failed to place model"
                );
                PlacementOutcome::failed(candidate, category, destination, kind, e.to_string())
            }
        }
    }

    /// `Ok(None)` means the destination was already occupied.
    fn try_place(&self, candidate: &Candidate, destination: &Path) -> Result<Option<PlacementMethod>> {
        let source = resolve_source(&candidate.source_path)?;

        match std::fs::symlink_metadata(destination) {
            Ok(meta) if meta.file_type().is_symlink() && !destination.exists() => {
                debug!("Removing broken link {}", destination.display());
                std::fs::remove_file(destination)
                    .map_err(|e| OrganizerError::io_with_path(e, destination))?;
            }
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(OrganizerError::io_with_path(e, destination)),
        }

        let dest_dir = destination
            .parent()
            .ok_or_else(|| OrganizerError::Other(format!("No parent for {}", destination.display())))?;
        // create_dir_all tolerates directories created concurrently
        std::fs::create_dir_all(dest_dir).map_err(|e| OrganizerError::io_with_path(e, dest_dir))?;

        self.ensure_space(dest_dir, candidate.size_bytes)?;

        match self.strategy {
            PlacementStrategy::LinkPreferred => self.link_or_copy(&source, destination),
            PlacementStrategy::CopyOnly => copy_verified(&source, destination, self.check),
        }
    }

    /// Symlink, falling back to hardlink, then verified copy.
    fn link_or_copy(&self, source: &Path, destination: &Path) -> Result<Option<PlacementMethod>> {
        match self.linker.symlink(source, destination) {
            Ok(()) => return Ok(Some(PlacementMethod::Symlink)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => debug!("Symlink to {} failed ({}), trying hardlink", destination.display(), e),
        }

        // Only works on the same filesystem
        match self.linker.hard_link(source, destination) {
            Ok(()) => return Ok(Some(PlacementMethod::Hardlink)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
            Err(e) => debug!("Hardlink to {} failed ({}), copying", destination.display(), e),
        }

        copy_verified(source, destination, self.check)
    }

    fn ensure_space(&self, dest_dir: &Path, required: u64) -> Result<()> {
        let available = match self.space.available_space(dest_dir) {
            Ok(available) => available,
            Err(e) => {
                warn!("Cannot query free space at {}: {}", dest_dir.display(), e);
                return Ok(());
            }
        };
        if available < required {
            return Err(OrganizerError::InsufficientSpace {
                path: dest_dir.to_path_buf(),
                required,
                available,
            });
        }
        Ok(())
    }
}

/// Resolve the source to its final regular file and confirm it is readable.
fn resolve_source(source: &Path) -> Result<PathBuf> {
    let resolved =
        std::fs::canonicalize(source).map_err(|_| OrganizerError::SourceVanished(source.to_path_buf()))?;
    std::fs::File::open(&resolved).map_err(|_| OrganizerError::SourceVanished(source.to_path_buf()))?;
    Ok(resolved)
}

/// Something (file, directory, or any link) already sits at `path`.
fn destination_occupied(path: &Path) -> bool {
    path.exists()
}

/// Copy into a fresh destination and compare contents.
///
/// The destination is opened create-new so an existing file is never
/// truncated. Any failure after creation removes the partial copy.
fn copy_verified(
    source: &Path,
    destination: &Path,
    check: ContentCheck,
) -> Result<Option<PlacementMethod>> {
    let mut reader =
        std::fs::File::open(source).map_err(|_| OrganizerError::SourceVanished(source.to_path_buf()))?;
    let mut writer = match OpenOptions::new().write(true).create_new(true).open(destination) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(None),
        Err(e) => return Err(OrganizerError::io_with_path(e, destination)),
    };

    let copied = std::io::copy(&mut reader, &mut writer).and_then(|_| writer.sync_all());
    drop(writer);
    if let Err(e) = copied {
        remove_partial(destination);
        return Err(OrganizerError::io_with_path(e, destination));
    }

    if let Err(e) = check(source, destination) {
        remove_partial(destination);
        return Err(e);
    }

    Ok(Some(PlacementMethod::CopyVerified))
}

fn remove_partial(destination: &Path) {
    if let Err(e) = std::fs::remove_file(destination) {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove partial copy {}: {}", destination.display(), e);
        }
    }
}
