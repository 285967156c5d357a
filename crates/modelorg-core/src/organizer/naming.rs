//! Destination filenames.
//!
//! Cache snapshots tend to ship generic weight names (`model.safetensors`,
//! `diffusion_pytorch_model.safetensors`), so files from different repositories
//! would collide in one category directory. Prefixing the repository identity
//! keeps them apart.

use crate::organizer::flattener::snapshot_subdirs;
use crate::organizer::types::{CacheIdentity, Candidate};
use regex::Regex;
use std::sync::LazyLock;

/// Maximum length of a normalized identity segment.
const MAX_SEGMENT_LENGTH: usize = 96;

/// Runs of separators left after replacement.
static CONSECUTIVE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_]{2,}").expect("valid separator regex"));

/// Anything other than ASCII alphanumerics, `-`, `_` and `.`.
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9\-_.]").expect("valid charset regex"));

/// Normalize one identity segment for use inside a filename.
///
/// ```
/// use modelorg_core::organizer::naming::normalize_segment;
///
/// assert_eq!(normalize_segment("Stable Diffusion XL"), "stable_diffusion_xl");
/// assert_eq!(normalize_segment("black-forest-labs"), "black-forest-labs");
/// assert_eq!(normalize_segment("FLUX.1-dev"), "flux_1-dev");
/// ```
pub fn normalize_segment(segment: &str) -> String {
    let lowered = segment.trim().to_lowercase().replace('.', "_");
    let replaced = UNSAFE_CHARS.replace_all(&lowered, "_");
    let collapsed = CONSECUTIVE_SEPARATORS.replace_all(&replaced, "_");
    let mut result = collapsed
        .trim_matches(|c| c == '-' || c == '_')
        .to_string();

    if result.len() > MAX_SEGMENT_LENGTH {
        let mut cut = MAX_SEGMENT_LENGTH;
        while !result.is_char_boundary(cut) {
            cut -= 1;
        }
        result.truncate(cut);
        result = result.trim_end_matches(|c| c == '-' || c == '_').to_string();
    }

    result
}

/// Prefix derived from a cache identity, or `None` when both parts normalize
/// to nothing.
pub fn identity_prefix(identity: &CacheIdentity) -> Option<String> {
    let parts: Vec<String> = [&identity.namespace, &identity.repository]
        .into_iter()
        .map(|p| normalize_segment(p))
        .filter(|p| !p.is_empty())
        .collect();

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("_"))
    }
}

/// Filename a candidate takes at its destination.
///
/// `{namespace}_{repo}_{subdirs}_{original}` for cache snapshots with a usable
/// identity, the original filename otherwise. Subdirectories below the
/// revision keep component files of one repository apart.
pub fn destination_file_name(candidate: &Candidate) -> String {
    let original = candidate.file_name();

    let Some(prefix) = candidate.cache_identity.as_ref().and_then(identity_prefix) else {
        return original;
    };

    let mut parts = vec![prefix];
    parts.extend(
        snapshot_subdirs(&candidate.relative_path)
            .iter()
            .map(|s| normalize_segment(s))
            .filter(|s| !s.is_empty()),
    );
    parts.push(original);
    parts.join("_")
}
