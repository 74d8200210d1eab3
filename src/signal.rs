use std::sync::atomic::{AtomicBool, Ordering};

/// Shared stop flag for one round. Workers consult it before each attempt;
/// an attempt already in flight is never interrupted.
#[derive(Debug, Default)]
pub struct TerminationSignal {
    stopped: AtomicBool,
}

impl TerminationSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag. Returns `true` only for the call that flipped it.
    pub fn trigger(&self) -> bool {
        !self.stopped.swap(true, Ordering::AcqRel)
    }

    pub fn is_set(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.stopped.store(false, Ordering::Release);
    }
}
