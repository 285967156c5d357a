//! Organizer configuration.
//!
//! Fixed constants live on the `*Config` holder structs; tunables an operator
//! may change are on [`OrganizerConfig`], which loads from JSON.

use crate::error::{OrganizerError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const MIB: u64 = 1024 * 1024;

/// Discovery constants.
pub struct DiscoveryConfig;

impl DiscoveryConfig {
    /// Levels below the scanned root, or below a cache repository directory
    /// once inside one (`snapshots/<hash>/<subdir>/<file>` is 4).
    pub const DEFAULT_MAX_DEPTH: usize = 4;
    pub const BASE_EXTENSIONS: &'static [&'static str] =
        &["safetensors", "ckpt", "pt", "pth", "bin"];
    pub const GGUF_EXTENSION: &'static str = "gguf";
    pub const ONNX_EXTENSION: &'static str = "onnx";
    /// Leading segment of content-addressed cache directories.
    pub const CACHE_MARKERS: &'static [&'static str] = &["models", "datasets", "spaces"];
    pub const CACHE_REVISION_DIRS: &'static [&'static str] = &["snapshots", "refs"];
    pub const CACHE_BLOB_DIR: &'static str = "blobs";
}

/// Scheduler constants.
pub struct SchedulerConfig;

impl SchedulerConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 8;
}

/// Paths inside the destination tree.
pub struct PathsConfig;

impl PathsConfig {
    pub const DEFAULT_MODELS_ROOT: &'static str = "/workspace/ComfyUI/models";
}

/// Size boundaries for classifying files without a naming signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SizeThresholds {
    /// Files strictly below this are embeddings.
    pub embedding_max_bytes: u64,
    /// Files strictly below this (and not embeddings) are LoRAs.
    pub lora_max_bytes: u64,
}

impl Default for SizeThresholds {
    fn default() -> Self {
        Self {
            embedding_max_bytes: 50 * MIB,
            lora_max_bytes: 500 * MIB,
        }
    }
}

/// How files are materialized at their destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStrategy {
    /// Symlink, then hardlink, then verified copy.
    #[default]
    LinkPreferred,
    /// Always copy and verify.
    CopyOnly,
}

/// Operator-tunable settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct OrganizerConfig {
    /// Root of the per-category destination tree.
    pub destination_root: PathBuf,
    /// Maximum directory depth scanned below the source root, counted from
    /// the repository directory inside a hub cache.
    pub max_depth: usize,
    pub include_gguf: bool,
    pub include_onnx: bool,
    pub size_thresholds: SizeThresholds,
    /// Files per batch. Affects progress granularity only.
    pub batch_size: usize,
    /// Upper bound on concurrent batches. `None` uses available parallelism.
    pub max_workers: Option<usize>,
    /// Stop dispatching batches after this many failed placements.
    pub halt_after_failures: Option<usize>,
    pub strategy: PlacementStrategy,
}

impl Default for OrganizerConfig {
    fn default() -> Self {
        Self {
            destination_root: PathBuf::from(PathsConfig::DEFAULT_MODELS_ROOT),
            max_depth: DiscoveryConfig::DEFAULT_MAX_DEPTH,
            include_gguf: true,
            include_onnx: true,
            size_thresholds: SizeThresholds::default(),
            batch_size: SchedulerConfig::DEFAULT_BATCH_SIZE,
            max_workers: None,
            halt_after_failures: None,
            strategy: PlacementStrategy::default(),
        }
    }
}

impl OrganizerConfig {
    /// Defaults with the given destination root.
    pub fn with_destination(destination_root: impl Into<PathBuf>) -> Self {
        Self {
            destination_root: destination_root.into(),
            ..Self::default()
        }
    }

    /// Load a JSON config file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => OrganizerError::FileNotFound(path.to_path_buf()),
            _ => OrganizerError::io_with_path(e, path),
        })?;
        let config: Self = serde_json::from_str(&content).map_err(|e| OrganizerError::Config {
            message: format!("Failed to parse {}: {}", path.display(), e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(OrganizerError::Config {
                message: "batch_size must be at least 1".to_string(),
            });
        }
        if self.max_workers == Some(0) {
            return Err(OrganizerError::Config {
                message: "max_workers must be at least 1".to_string(),
            });
        }
        if self.max_depth == 0 {
            return Err(OrganizerError::Config {
                message: "max_depth must be at least 1".to_string(),
            });
        }
        let t = self.size_thresholds;
        if t.embedding_max_bytes > t.lora_max_bytes {
            return Err(OrganizerError::Config {
                message: format!(
                    "embedding_max_bytes ({}) exceeds lora_max_bytes ({})",
                    t.embedding_max_bytes, t.lora_max_bytes
                ),
            });
        }
        Ok(())
    }

    /// Model file extensions accepted during discovery, lowercase.
    pub fn model_extensions(&self) -> Vec<&'static str> {
        let mut exts = DiscoveryConfig::BASE_EXTENSIONS.to_vec();
        if self.include_gguf {
            exts.push(DiscoveryConfig::GGUF_EXTENSION);
        }
        if self.include_onnx {
            exts.push(DiscoveryConfig::ONNX_EXTENSION);
        }
        exts
    }
}
