use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use sqlbridge_protocol::constants::{PROGRESS_CEILING, PROGRESS_COMPLETE};

/// Shared 0–100 progress value.
///
/// Written by the upload streamer, polled by anyone holding a clone of the
/// `Arc`. There is no notification mechanism. Writers keep the value in
/// range; the type does not clamp `set`.
#[derive(Debug, Default)]
pub struct ProgressIndicator {
    value: AtomicU8,
}

impl ProgressIndicator {
    pub fn new(initial: u8) -> Self {
        Self {
            value: AtomicU8::new(initial),
        }
    }

    pub fn get(&self) -> u8 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn set(&self, value: u8) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Advances by one unless already at `ceiling`. Returns the new value.
    pub fn advance(&self, ceiling: u8) -> u8 {
        match self
            .value
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                (v < ceiling).then_some(v + 1)
            }) {
            Ok(previous) => previous + 1,
            Err(current) => current,
        }
    }
}

/// Receives a callback for every chunk pulled from an upload source.
///
/// Called synchronously from the task that drives the request body, with
/// the bytes read since the previous callback and, when the total length
/// is known, the overall percentage.
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, bytes_since_last: u64, percent: Option<u8>);
}

/// Steps a [`ProgressIndicator`] from chunk callbacks.
///
/// With a known total, every accumulated 1% of the total advances the
/// indicator by one. With an unknown (zero or negative) total, every
/// callback advances it by one. Either way it stops at 99 until
/// [`finish`](Self::finish) sets 100.
pub struct PercentTracker {
    indicator: Arc<ProgressIndicator>,
    total_len: i64,
    accumulated: AtomicU64,
}

impl PercentTracker {
    pub fn new(indicator: Arc<ProgressIndicator>, total_len: i64) -> Self {
        Self {
            indicator,
            total_len,
            accumulated: AtomicU64::new(0),
        }
    }

    /// Marks the upload complete.
    pub fn finish(&self) {
        self.indicator.set(PROGRESS_COMPLETE);
    }
}

impl ProgressObserver for PercentTracker {
    fn on_progress(&self, bytes_since_last: u64, _percent: Option<u8>) {
        if self.total_len <= 0 {
            self.indicator.advance(PROGRESS_CEILING);
            return;
        }

        let total = self.total_len as u64;
        let accumulated = self.accumulated.fetch_add(bytes_since_last, Ordering::Relaxed)
            + bytes_since_last;
        if accumulated.saturating_mul(100) >= total {
            self.accumulated.store(0, Ordering::Relaxed);
            self.indicator.advance(PROGRESS_CEILING);
        }
    }
}

/// Forwards callbacks to several observers in order.
pub(crate) struct ObserverSet(pub(crate) Vec<Arc<dyn ProgressObserver>>);

impl ProgressObserver for ObserverSet {
    fn on_progress(&self, bytes_since_last: u64, percent: Option<u8>) {
        for observer in &self.0 {
            observer.on_progress(bytes_since_last, percent);
        }
    }
}
