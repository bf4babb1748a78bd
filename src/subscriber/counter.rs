use std::sync::atomic::{AtomicU64, Ordering};

/// Global receipt order across both listeners.
///
/// Bumped once per successfully decoded message, whichever listener got it.
/// Starts at zero on every process start.
#[derive(Debug, Default)]
pub struct ReceiptCounter {
    count: AtomicU64,
}

impl ReceiptCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the new count.
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }
}
