use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation handle consulted by in-flight extraction work.
///
/// Clones refer to the same flag, so a clone handed to a timer or UI thread can abort work
/// started elsewhere. Setting uses `Release` and checking uses `Acquire`, so everything the
/// cancelling thread wrote before `cancel` is visible to a worker that observes the flag.
#[derive(Clone, Debug, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    /// Create a flag in the "not cancelled" state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Repeated calls are no-ops.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Return true once cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Clear a previous request so the owner can start a fresh pass.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Release);
    }
}

/// Treat a missing flag as permanently "not cancelled".
pub(crate) fn is_cancelled(flag: Option<&CancellationFlag>) -> bool {
    flag.is_some_and(CancellationFlag::is_cancelled)
}
