/*!
 * Dispatch Statistics
 * Lock-free counters shared by both dispatchers
 */

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Live counters, updated with relaxed atomics
#[derive(Debug, Default)]
pub struct DispatchStats {
    batches: AtomicU64,
    batched_calls: AtomicU64,
    blocking_calls: AtomicU64,
    kernel_failures: AtomicU64,
    invalid_arguments: AtomicU64,
    submission_failures: AtomicU64,
    live_dedicated_threads: AtomicU64,
}

impl DispatchStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_batch(&self, calls: usize) {
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.batched_calls.fetch_add(calls as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_blocking(&self) {
        self.blocking_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_kernel_failures(&self, count: usize) {
        self.kernel_failures.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_invalid_argument(&self) {
        self.invalid_arguments.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_submission_failure(&self) {
        self.submission_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a dedicated thread until the returned guard drops
    pub(crate) fn dedicated_thread(self: &Arc<Self>) -> LiveThreadGuard {
        self.live_dedicated_threads.fetch_add(1, Ordering::AcqRel);
        LiveThreadGuard {
            stats: Arc::clone(self),
        }
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            batches: self.batches.load(Ordering::Relaxed),
            batched_calls: self.batched_calls.load(Ordering::Relaxed),
            blocking_calls: self.blocking_calls.load(Ordering::Relaxed),
            kernel_failures: self.kernel_failures.load(Ordering::Relaxed),
            invalid_arguments: self.invalid_arguments.load(Ordering::Relaxed),
            submission_failures: self.submission_failures.load(Ordering::Relaxed),
            live_dedicated_threads: self.live_dedicated_threads.load(Ordering::Acquire),
        }
    }
}

/// Decrements the live dedicated-thread count on drop
#[derive(Debug)]
pub(crate) struct LiveThreadGuard {
    stats: Arc<DispatchStats>,
}

impl Drop for LiveThreadGuard {
    fn drop(&mut self) {
        self.stats
            .live_dedicated_threads
            .fetch_sub(1, Ordering::AcqRel);
    }
}

/// Point-in-time copy of the counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStatsSnapshot {
    pub batches: u64,
    pub batched_calls: u64,
    pub blocking_calls: u64,
    pub kernel_failures: u64,
    pub invalid_arguments: u64,
    pub submission_failures: u64,
    pub live_dedicated_threads: u64,
}

impl DispatchStatsSnapshot {
    /// Kernel failures per issued call
    pub fn failure_ratio(&self) -> f64 {
        let total = self.batched_calls + self.blocking_calls;
        if total == 0 {
            0.0
        } else {
            self.kernel_failures as f64 / total as f64
        }
    }
}
