use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Cooperative stop flag checked at every actuation pulse boundary.
///
/// A fresh token is never cancelled, so runs go to completion unless
/// someone (e.g. the Ctrl-C handler) calls `cancel`.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Clear a previous cancellation so the next run can proceed.
    pub fn reset(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}
