//! Content verification for copied model files.
//!
//! Copies are compared against their source over the full file contents, not
//! just size, by streaming both through BLAKE3.

use crate::error::{OrganizerError, Result};
use blake3::Hasher;
use std::io::Read;
use std::path::Path;

/// Chunk size for reading files (8MB, optimal for SSDs).
const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// BLAKE3 digest of a file as lowercase hex.
pub fn file_digest(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|e| OrganizerError::io_with_path(e, path))?;

    let mut hasher = Hasher::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|e| OrganizerError::io_with_path(e, path))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().to_hex().to_string())
}

/// Verify that `copy` holds exactly the bytes of `original`.
///
/// Sizes are compared first so truncated copies fail without hashing.
/// Returns the shared digest on success.
pub fn verify_same_content(original: impl AsRef<Path>, copy: impl AsRef<Path>) -> Result<String> {
    let original = original.as_ref();
    let copy = copy.as_ref();

    let original_len = std::fs::metadata(original)
        .map_err(|e| OrganizerError::io_with_path(e, original))?
        .len();
    let copy_len = std::fs::metadata(copy)
        .map_err(|e| OrganizerError::io_with_path(e, copy))?
        .len();
    if original_len != copy_len {
        return Err(OrganizerError::IntegrityMismatch {
            expected: format!("{} bytes", original_len),
            actual: format!("{} bytes", copy_len),
        });
    }

    let expected = file_digest(original)?;
    let actual = file_digest(copy)?;
    if expected == actual {
        Ok(expected)
    } else {
        Err(OrganizerError::IntegrityMismatch { expected, actual })
    }
}
