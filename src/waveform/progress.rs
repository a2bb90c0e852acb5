//! Progress values shared between worker threads and the owning session.

use std::sync::atomic::{AtomicU64, Ordering};

/// Callback receiving progress values in `[0.0, 1.0]`.
///
/// Invoked from whichever thread made the progress, including engine worker threads.
pub type ProgressCallback = dyn Fn(f64) + Send + Sync;

/// Borrowed progress sink handed to the downsampling engine.
pub type ProgressSink<'a> = &'a (dyn Fn(f64) + Sync);

/// Atomic `f64` progress value stored as raw bits.
#[derive(Debug, Default)]
pub struct AtomicProgress {
    bits: AtomicU64,
}

impl AtomicProgress {
    /// Create a progress value starting at `value`.
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(clamp_progress(value).to_bits()),
        }
    }

    /// Current value.
    #[inline]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Unconditionally overwrite the value (used for resets and terminal states).
    #[inline]
    pub fn store(&self, value: f64) {
        self.bits
            .store(clamp_progress(value).to_bits(), Ordering::Release);
    }

    /// Move the value forward to `value` unless it is already further along.
    ///
    /// Returns the value held after the call.
    pub fn advance(&self, value: f64) -> f64 {
        let value = clamp_progress(value);
        let mut current = self.bits.load(Ordering::Acquire);
        loop {
            if f64::from_bits(current) >= value {
                return f64::from_bits(current);
            }
            match self.bits.compare_exchange_weak(
                current,
                value.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return value,
                Err(actual) => current = actual,
            }
        }
    }
}

/// Clamp into `[0.0, 1.0]`, mapping NaN to 0.0.
pub(crate) fn clamp_progress(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, 1.0)
}
