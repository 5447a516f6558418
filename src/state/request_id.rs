use std::sync::atomic::{AtomicU64, Ordering};

/// Per-process completion id sequence, started at a random offset so ids do
/// not repeat across restarts.
pub(crate) struct RequestIdGenerator {
    counter: AtomicU64,
}

impl RequestIdGenerator {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            counter: AtomicU64::new(fastrand::u64(..u64::MAX / 2)),
        }
    }

    pub(crate) fn next_seq(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::Relaxed)
    }
}
