//! Run-level cancellation.
//!
//! The scheduler polls the token before dispatching each batch. File
//! operations already in flight always run to completion so no half-written
//! destination is left behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag observed by every clone.
///
/// ```
/// use modelorg_core::cancel::CancellationToken;
///
/// let token = CancellationToken::new();
/// let signal_side = token.clone();
///
/// signal_side.cancel();
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Return `Err(Cancelled)` once cancellation has been requested.
    pub fn check(&self) -> crate::Result<()> {
        if self.is_cancelled() {
            Err(crate::OrganizerError::Cancelled)
        } else {
            Ok(())
        }
    }
}
