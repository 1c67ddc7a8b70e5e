//! Single-holder session gate.

use std::sync::atomic::{AtomicBool, Ordering};

/// Admits at most one session at a time. A second opener fails immediately.
#[derive(Debug, Default)]
pub struct SessionGate {
    held: AtomicBool,
}

impl SessionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the gate; `false` if it is already held.
    pub fn acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Release the gate, held or not.
    pub fn release(&self) {
        self.held.store(false, Ordering::Release);
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}
