//! Cooperative cancellation for long-running loads

use crate::error::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Number of persisted child elements replayed between cancellation checks.
pub const CANCELLATION_CHECK_INTERVAL: usize = 10;

/// Observer of a long-running operation that may ask it to stop.
pub trait ProgressIndicator {
    /// Returns `Err(Error::Canceled)` once cancellation was requested.
    fn check_canceled(&self) -> Result<()>;

    /// Describe the item currently being processed.
    fn set_text(&self, _text: &str) {}
}

/// A shareable cancellation flag
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    canceled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.canceled.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.canceled.load(Ordering::SeqCst)
    }
}

impl ProgressIndicator for CancellationToken {
    fn check_canceled(&self) -> Result<()> {
        if self.is_canceled() {
            Err(Error::Canceled)
        } else {
            Ok(())
        }
    }
}

/// Check for cancellation every [`CANCELLATION_CHECK_INTERVAL`] items.
///
/// `processed` is the 1-based count of items handled so far.
pub(crate) fn checkpoint(progress: Option<&dyn ProgressIndicator>, processed: usize) -> Result<()> {
    match progress {
        Some(progress) if processed % CANCELLATION_CHECK_INTERVAL == 0 => progress.check_canceled(),
        _ => Ok(()),
    }
}
