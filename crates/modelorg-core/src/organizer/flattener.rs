//! Discovery of model files in download folders and hub caches.
//!
//! Two layouts are understood:
//!
//! ```text
//! downloads/
//! ├── some_lora.safetensors                 flat
//! ├── civitai/style.safetensors             flat (nested, no cache layout)
//! └── models--acme--bigmodel/
//!     ├── blobs/<sha256>                    never a candidate
//!     ├── refs/main
//!     └── snapshots/<revision>/
//!         └── model.safetensors -> ../../blobs/<sha256>   cache_snapshot
//! ```
//!
//! Snapshot entries are symlinks into `blobs/`; the walk follows links so the
//! candidate carries the resolved file's size while keeping its readable name.

use crate::config::{DiscoveryConfig, OrganizerConfig};
use crate::organizer::types::{CacheIdentity, Candidate, SourceKind};
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

/// Everything learned while scanning a source directory.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceScan {
    pub root: PathBuf,
    pub root_exists: bool,
    /// Regular files seen, model or not.
    pub files_seen: usize,
    /// Files with a model extension.
    pub model_files: usize,
    /// Cache repository directories encountered.
    pub cache_dirs: Vec<PathBuf>,
    pub candidates: Vec<Candidate>,
}

/// Discover candidates below `root`.
///
/// A missing or empty root yields an empty list.
pub fn flatten(root: &Path, config: &OrganizerConfig) -> Vec<Candidate> {
    scan_source(root, config).candidates
}

/// Discover candidates and keep the facts needed for diagnostics.
pub fn scan_source(root: &Path, config: &OrganizerConfig) -> SourceScan {
    let mut scan = SourceScan {
        root: root.to_path_buf(),
        ..SourceScan::default()
    };

    let root = match std::fs::canonicalize(root) {
        Ok(path) if path.is_dir() => path,
        Ok(path) => {
            warn!("Source {} is not a directory", path.display());
            return scan;
        }
        Err(e) => {
            debug!("Source {} not readable: {}", root.display(), e);
            return scan;
        }
    };
    scan.root_exists = true;
    scan.root = root.clone();

    let extensions = config.model_extensions();

    let max_depth = config.max_depth;
    let walker = WalkDir::new(&root)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_excluded_dir(e) && within_depth(e, &root, max_depth));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        if entry.file_type().is_dir() {
            if parse_cache_dir_name(&entry.file_name().to_string_lossy()).is_some() {
                scan.cache_dirs.push(entry.path().to_path_buf());
            }
            continue;
        }
        if !entry.file_type().is_file() {
            continue;
        }
        scan.files_seen += 1;

        if !has_model_extension(entry.path(), &extensions) {
            continue;
        }
        scan.model_files += 1;

        let size_bytes = match entry.metadata() {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!("Cannot stat {}: {}", entry.path().display(), e);
                continue;
            }
        };

        let relative_path = entry
            .path()
            .strip_prefix(&root)
            .unwrap_or(entry.path())
            .to_path_buf();
        let cache_identity = cache_identity_for(&relative_path);
        let source_kind = if cache_identity.is_some() {
            SourceKind::CacheSnapshot
        } else {
            SourceKind::Flat
        };

        scan.candidates.push(Candidate {
            source_path: entry.path().to_path_buf(),
            relative_path,
            size_bytes,
            source_kind,
            cache_identity,
        });
    }

    debug!(
        "Scanned {}: {} files, {} model files, {} cache repos",
        scan.root.display(),
        scan.files_seen,
        scan.model_files,
        scan.cache_dirs.len()
    );

    scan
}

/// Parse `<marker>--<namespace>--<repo>` into its identity.
///
/// ```
/// use modelorg_core::organizer::flattener::parse_cache_dir_name;
///
/// let id = parse_cache_dir_name("models--acme--bigmodel").unwrap();
/// assert_eq!((id.namespace.as_str(), id.repository.as_str()), ("acme", "bigmodel"));
/// assert!(parse_cache_dir_name("loras").is_none());
/// ```
pub fn parse_cache_dir_name(name: &str) -> Option<CacheIdentity> {
    let (marker, rest) = name.split_once("--")?;
    if !DiscoveryConfig::CACHE_MARKERS.contains(&marker) || rest.is_empty() {
        return None;
    }

    let (namespace, repository) = match rest.split_once("--") {
        Some((namespace, repository)) => (namespace, repository),
        None => ("", rest),
    };
    if repository.is_empty() {
        return None;
    }

    Some(CacheIdentity {
        namespace: namespace.to_string(),
        repository: repository.to_string(),
    })
}

/// Identity of the cache repository containing `relative_path`, if the path
/// follows `<repo dir>/<snapshots|refs>/<revision>/.../<file>`.
pub fn cache_identity_for(relative_path: &Path) -> Option<CacheIdentity> {
    let segments = path_segments(relative_path);
    let i = cache_repo_index(&segments)?;
    parse_cache_dir_name(&segments[i])
}

/// Directories between the revision directory and the file, e.g.
/// `["text_encoder_2"]` for `models--a--b/snapshots/<rev>/text_encoder_2/model.safetensors`.
/// Empty outside the cache layout.
pub fn snapshot_subdirs(relative_path: &Path) -> Vec<String> {
    let segments = path_segments(relative_path);
    match cache_repo_index(&segments) {
        Some(i) => segments[i + 3..segments.len() - 1].to_vec(),
        None => Vec::new(),
    }
}

fn path_segments(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

/// Index of the repo directory segment. Needs the repo dir, a revision dir
/// kind, a revision, and the file after it.
fn cache_repo_index(segments: &[String]) -> Option<usize> {
    (0..segments.len().saturating_sub(3)).find(|&i| {
        parse_cache_dir_name(&segments[i]).is_some()
            && DiscoveryConfig::CACHE_REVISION_DIRS.contains(&segments[i + 1].as_str())
    })
}

/// Depth is counted from the innermost cache repository directory on the
/// path, or from the scan root when there is none.
fn within_depth(entry: &DirEntry, root: &Path, max_depth: usize) -> bool {
    if entry.depth() == 0 {
        return true;
    }
    let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
    let segments = path_segments(relative);
    let depth = match segments
        .iter()
        .rposition(|s| parse_cache_dir_name(s).is_some())
    {
        Some(i) => segments.len() - i - 1,
        None => segments.len(),
    };
    depth <= max_depth
}

fn has_model_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .is_some_and(|e| extensions.contains(&e.as_str()))
}

/// Hidden directories (`.locks`, `.no_exist`, `.cache`) and cache blob stores.
fn is_excluded_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    if name.starts_with('.') {
        return true;
    }
    name == DiscoveryConfig::CACHE_BLOB_DIR
        && entry
            .path()
            .parent()
            .and_then(|p| p.file_name())
            .is_some_and(|p| parse_cache_dir_name(&p.to_string_lossy()).is_some())
}
