//! Page processing operators.
//!
//! This module provides the resumable [`PageProcessor`], the cooperative
//! [`DriverYieldSignal`] and a [`Driver`] that runs processors to completion,
//! either one page at a time or replicated across pages with rayon.

mod driver;
mod page_processor;
mod yield_signal;

pub use driver::{project_pages_parallel, Driver, DriverProgress};
pub use page_processor::{PageProcessor, ProcessorState, ProjectedPages};
pub use yield_signal::DriverYieldSignal;

/// Default number of positions processed between yield checks.
pub const DEFAULT_YIELD_CHECK_INTERVAL: usize = 256;

/// Default per-output-page byte budget (4 MiB).
pub const DEFAULT_MAX_PAGE_SIZE_BYTES: usize = 4 * 1024 * 1024;

/// Default per-output-page row cap.
pub const DEFAULT_MAX_PAGE_POSITIONS: usize = 8192;

/// Configuration for page processors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorConfig {
    /// Positions processed between polls of the yield signal.
    pub yield_check_interval: usize,
    /// Builder size at which the current output page is flushed.
    pub max_page_size_bytes: usize,
    /// Positions at which the current output page is flushed.
    pub max_page_positions: usize,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            yield_check_interval: DEFAULT_YIELD_CHECK_INTERVAL,
            max_page_size_bytes: DEFAULT_MAX_PAGE_SIZE_BYTES,
            max_page_positions: DEFAULT_MAX_PAGE_POSITIONS,
        }
    }
}

impl ProcessorConfig {
    /// Creates a new processor configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the yield check interval (at least 1).
    #[must_use]
    pub fn with_yield_check_interval(mut self, interval: usize) -> Self {
        self.yield_check_interval = interval.max(1);
        self
    }

    /// Sets the output page byte budget (at least 1).
    #[must_use]
    pub fn with_max_page_size_bytes(mut self, bytes: usize) -> Self {
        self.max_page_size_bytes = bytes.max(1);
        self
    }

    /// Sets the output page row cap (at least 1).
    #[must_use]
    pub fn with_max_page_positions(mut self, positions: usize) -> Self {
        self.max_page_positions = positions.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults_and_clamping() {
        let config = ProcessorConfig::new();
        assert_eq!(config.yield_check_interval, 256);
        assert_eq!(config.max_page_size_bytes, 4 * 1024 * 1024);
        assert_eq!(config.max_page_positions, 8192);

        let config = config
            .with_yield_check_interval(0)
            .with_max_page_size_bytes(0)
            .with_max_page_positions(0);
        assert_eq!(config.yield_check_interval, 1);
        assert_eq!(config.max_page_size_bytes, 1);
        assert_eq!(config.max_page_positions, 1);
    }
}
