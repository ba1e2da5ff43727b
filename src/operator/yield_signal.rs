//! Cooperative yield flag shared between a scheduler and a processing loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Flag an external scheduler sets to ask a running processor to return early.
///
/// The processing loop only polls it; nothing ever blocks on it. Cancellation
/// is expressed with the same flag.
#[derive(Debug, Clone, Default)]
pub struct DriverYieldSignal {
    flag: Arc<AtomicBool>,
}

impl DriverYieldSignal {
    /// Creates an unset signal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests a yield. Idempotent.
    pub fn set(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Clears the request, typically before the scheduler resumes the driver.
    pub fn reset(&self) {
        self.flag.store(false, Ordering::Release);
    }

    /// Returns true if a yield was requested.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_flag() {
        let signal = DriverYieldSignal::new();
        let scheduler_side = signal.clone();
        assert!(!signal.is_set());

        scheduler_side.set();
        scheduler_side.set();
        assert!(signal.is_set());

        signal.reset();
        assert!(!scheduler_side.is_set());
    }

    #[test]
    fn test_visible_across_threads() {
        let signal = DriverYieldSignal::new();
        let remote = signal.clone();
        std::thread::spawn(move || remote.set()).join().unwrap();
        assert!(signal.is_set());
    }
}
