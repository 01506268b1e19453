//! Cooperative cancellation for a redaction run.
//!
//! Page workers check the flag between stages; the orchestrator checks it
//! once more before assembly. A cancelled run returns
//! [`RedactError::Cancelled`](crate::RedactError::Cancelled) and never
//! writes an artifact, because a half-composited page could still show the
//! text it was meant to hide.

use crate::error::RedactError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared, cloneable cancellation handle.
///
/// Clones observe the same flag, so hand one to a signal handler and keep
/// the other in the [`RedactionConfig`](crate::RedactionConfig).
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<(), RedactError> {
        if self.is_cancelled() {
            Err(RedactError::Cancelled)
        } else {
            Ok(())
        }
    }
}
