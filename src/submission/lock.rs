//! Single-flight submission lock.

use std::sync::atomic::{AtomicBool, Ordering};

/// Guards against concurrent submissions. `lock` is an atomic test-and-set;
/// exactly one caller wins until `unlock`.
#[derive(Debug, Default)]
pub struct SubmissionLock {
    locked: AtomicBool,
}

impl SubmissionLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to take the lock. Returns false if a submission is already active.
    pub fn lock(&self) -> bool {
        self.locked
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    pub fn is_active(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }
}
