use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared abort signal for one run. Raised from any thread; observed by the
/// scheduler between steps and by steps at source-iteration boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
