//! Configuration surface for the atime-tracking subsystem.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::flush::{HWM, LWM};

/// Default interval between flush ticks.
pub const DEFAULT_FLUSH_PERIOD: Duration = Duration::from_secs(3 * 60);
/// Default per-[`Worker`](crate::worker::Worker) set-channel buffer size.
pub const DEFAULT_SET_CHANNEL_CAPACITY: usize = 256;

/// A live, hot-reloadable upper bound on a single mountpath's `AtimeMap` occupancy.
///
/// Re-architected from the source's shared mutable pointer-to-integer: reads are lock-free
/// (`Ordering::Relaxed`) and a new value can be published at any time without restarting the
/// owning [`Worker`](crate::worker::Worker).
#[derive(Debug, Clone)]
pub struct MaxMapSize(Arc<AtomicU64>);

impl MaxMapSize {
    /// Creates a new handle with the given initial bound.
    pub fn new(initial: u64) -> Self {
        Self(Arc::new(AtomicU64::new(initial)))
    }

    /// Reads the current bound.
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    /// Publishes a new bound, observed by the owning worker on its next flush sizing decision.
    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }
}

/// Builder-style configuration for the atime cache, validated once at [`Dispatcher`] construction
/// time (see [`crate::dispatcher::Dispatcher::new`]).
///
/// [`Dispatcher`]: crate::dispatcher::Dispatcher
#[derive(Debug, Clone)]
pub struct AtimeCacheConfig {
    /// Interval between flush ticks.
    pub flush_period: Duration,
    /// Upper bound on a single mountpath's `AtimeMap` occupancy.
    pub max_map_size: MaxMapSize,
    /// Per-worker set-channel buffer size.
    pub set_channel_capacity: usize,
}

impl Default for AtimeCacheConfig {
    fn default() -> Self {
        Self {
            flush_period: DEFAULT_FLUSH_PERIOD,
            max_map_size: MaxMapSize::new(1_000_000),
            set_channel_capacity: DEFAULT_SET_CHANNEL_CAPACITY,
        }
    }
}

impl AtimeCacheConfig {
    /// Sets the flush tick interval.
    pub fn flush_period(mut self, period: Duration) -> Self {
        self.flush_period = period;
        self
    }

    /// Sets the shared `MaxMapSize` handle.
    pub fn max_map_size(mut self, max_map_size: MaxMapSize) -> Self {
        self.max_map_size = max_map_size;
        self
    }

    /// Sets the per-worker set-channel capacity.
    pub fn set_channel_capacity(mut self, capacity: usize) -> Self {
        self.set_channel_capacity = capacity;
        self
    }

    /// Validates the configuration, matching the low/high watermark constants' ordering
    /// assumption (`LWM < HWM`) baked into [`crate::flush::compute_flush_count`].
    pub fn validate(&self) -> io::Result<()> {
        if self.set_channel_capacity == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "set_channel_capacity must be at least 1",
            ));
        }
        if self.max_map_size.get() == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "max_map_size must be at least 1",
            ));
        }
        if LWM >= HWM {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "low watermark must be below high watermark",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(AtimeCacheConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_set_channel_capacity_is_rejected() {
        let cfg = AtimeCacheConfig::default().set_channel_capacity(0);
        assert_eq!(
            cfg.validate().unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
    }

    #[test]
    fn zero_max_map_size_is_rejected() {
        let cfg = AtimeCacheConfig::default().max_map_size(MaxMapSize::new(0));
        assert_eq!(
            cfg.validate().unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
    }

    #[test]
    fn max_map_size_handle_is_live() {
        let handle = MaxMapSize::new(100);
        let clone = handle.clone();
        handle.set(200);
        assert_eq!(clone.get(), 200);
    }
}
