//! Free-space queries for the destination filesystem.

use std::path::Path;

/// Reports bytes available to unprivileged writers at a path.
pub trait FreeSpace: Send + Sync {
    fn available_space(&self, path: &Path) -> std::io::Result<u64>;
}

/// Queries the filesystem through `statvfs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFreeSpace;

impl FreeSpace for FsFreeSpace {
    fn available_space(&self, path: &Path) -> std::io::Result<u64> {
        fs2::available_space(path)
    }
}

/// Reports a constant amount of free space. Used to simulate full disks.
#[derive(Debug, Clone, Copy)]
pub struct FixedFreeSpace(pub u64);

impl FreeSpace for FixedFreeSpace {
    fn available_space(&self, _path: &Path) -> std::io::Result<u64> {
        Ok(self.0)
    }
}
