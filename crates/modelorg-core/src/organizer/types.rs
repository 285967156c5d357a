//! Core types for the model organizer.

use crate::error::FailureKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Semantic model category. Each maps to exactly one destination directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Checkpoint,
    Lora,
    Vae,
    Clip,
    Unet,
    Controlnet,
    Embedding,
    Upscaler,
}

impl Category {
    /// Every category, in destination-listing order.
    pub const ALL: [Category; 8] = [
        Category::Checkpoint,
        Category::Lora,
        Category::Vae,
        Category::Clip,
        Category::Unet,
        Category::Controlnet,
        Category::Embedding,
        Category::Upscaler,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Checkpoint => "checkpoint",
            Category::Lora => "lora",
            Category::Vae => "vae",
            Category::Clip => "clip",
            Category::Unet => "unet",
            Category::Controlnet => "controlnet",
            Category::Embedding => "embedding",
            Category::Upscaler => "upscaler",
        }
    }

    /// Directory name under the destination root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Checkpoint => "checkpoints",
            Category::Lora => "loras",
            Category::Vae => "vae",
            Category::Clip => "clip",
            Category::Unet => "unet",
            Category::Controlnet => "controlnet",
            Category::Embedding => "embeddings",
            Category::Upscaler => "upscale_models",
        }
    }

    pub fn dir_in(&self, destination_root: &Path) -> PathBuf {
        destination_root.join(self.dir_name())
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a candidate was discovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Plain download folder entry
    Flat,
    /// Inside a `models--<ns>--<repo>/snapshots/<hash>/` tree
    CacheSnapshot,
}

/// Repository identity recovered from a cache directory name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheIdentity {
    /// Owning user or organization. Empty for single-segment repo ids.
    pub namespace: String,
    pub repository: String,
}

/// A discovered file eligible for organization. Immutable after discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Absolute path as discovered.
    pub source_path: PathBuf,
    /// Path relative to the scanned root.
    pub relative_path: PathBuf,
    /// Size at discovery, following symlinks.
    pub size_bytes: u64,
    pub source_kind: SourceKind,
    pub cache_identity: Option<CacheIdentity>,
}

impl Candidate {
    /// Candidate for a file outside any cache layout.
    pub fn flat(source_path: impl Into<PathBuf>, relative_path: impl Into<PathBuf>, size_bytes: u64) -> Self {
        Self {
            source_path: source_path.into(),
            relative_path: relative_path.into(),
            size_bytes,
            source_kind: SourceKind::Flat,
            cache_identity: None,
        }
    }

    /// Original filename, lossily converted.
    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Terminal state of one placement attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStatus {
    Placed,
    SkippedExists,
    Failed,
}

/// How a placed file was materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMethod {
    /// Symbolic link (preferred, no extra disk usage)
    Symlink,
    /// Hard link (same filesystem only)
    Hardlink,
    /// Byte copy whose content was compared with the source
    CopyVerified,
}

impl PlacementMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementMethod::Symlink => "symlink",
            PlacementMethod::Hardlink => "hardlink",
            PlacementMethod::CopyVerified => "copy_verified",
        }
    }
}

impl std::fmt::Display for PlacementMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of attempting to materialize one candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementOutcome {
    pub source_path: PathBuf,
    pub category: Category,
    pub status: PlacementStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<PlacementMethod>,
    pub destination_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl PlacementOutcome {
    pub fn placed(
        candidate: &Candidate,
        category: Category,
        destination_path: PathBuf,
        method: PlacementMethod,
    ) -> Self {
        Self {
            source_path: candidate.source_path.clone(),
            category,
            status: PlacementStatus::Placed,
            method: Some(method),
            destination_path,
            failure_kind: None,
            error_detail: None,
        }
    }

    pub fn skipped_exists(candidate: &Candidate, category: Category, destination_path: PathBuf) -> Self {
        Self {
            source_path: candidate.source_path.clone(),
            category,
            status: PlacementStatus::SkippedExists,
            method: None,
            destination_path,
            failure_kind: None,
            error_detail: None,
        }
    }

    pub fn failed(
        candidate: &Candidate,
        category: Category,
        destination_path: PathBuf,
        failure_kind: FailureKind,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            source_path: candidate.source_path.clone(),
            category,
            status: PlacementStatus::Failed,
            method: None,
            destination_path,
            failure_kind: Some(failure_kind),
            error_detail: Some(detail.into()),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == PlacementStatus::Failed
    }
}

/// Dry-run view of where a candidate would go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementPlan {
    pub source_path: PathBuf,
    pub category: Category,
    pub destination_path: PathBuf,
    /// Destination already occupied; a real run would skip it.
    pub already_exists: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_dirs_are_distinct() {
        let mut dirs: Vec<_> = Category::ALL.iter().map(|c| c.dir_name()).collect();
        dirs.sort_unstable();
        dirs.dedup();
        assert_eq!(dirs.len(), Category::ALL.len());
        assert_eq!(Category::Upscaler.dir_name(), "upscale_models");
        assert_eq!(Category::Embedding.dir_name(), "embeddings");
    }

    #[test]
    fn test_outcome_serialization() {
        let candidate = Candidate::flat("/dl/a.safetensors", "a.safetensors", 10);
        let outcome = PlacementOutcome::placed(
            &candidate,
            Category::Lora,
            PathBuf::from("/models/loras/a.safetensors"),
            PlacementMethod::CopyVerified,
        );
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "placed");
        assert_eq!(json["method"], "copy_verified");
        assert_eq!(json["category"], "lora");
        assert!(json.get("error_detail").is_none());
    }
}
