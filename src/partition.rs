//! Splitting iterations across workers.
//!
//! Every worker gets `iterations / threads` consecutive iterations. The last
//! worker also takes the remainder, so it can end up with nearly twice the
//! average share; nothing is rebalanced.

use std::ops::RangeInclusive;

/// Inclusive, 1-based range of iterations assigned to one worker.
///
/// `from > to` is the empty range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkRange {
    pub from: u64,
    pub to: u64,
}

impl WorkRange {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }

    /// Number of iterations in the range.
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.to - self.from + 1
        }
    }

    /// Iteration indices in increasing order.
    pub fn iter(&self) -> RangeInclusive<u64> {
        self.from..=self.to
    }
}

/// Range of worker `worker` out of `threads` for `iterations` total iterations.
///
/// `worker` must be below `threads`. Zero threads yield the empty range.
pub fn work_range(iterations: u64, threads: usize, worker: usize) -> WorkRange {
    if threads == 0 {
        return WorkRange::new(1, 0);
    }
    debug_assert!(worker < threads);

    let base = iterations / threads as u64;
    let r = worker as u64;
    let from = base * r + 1;
    let mut to = base * (r + 1);
    if worker == threads - 1 {
        to += iterations - to;
    }
    WorkRange { from, to }
}

/// Ranges for all `threads` workers, in worker order.
pub fn partition(iterations: u64, threads: usize) -> Vec<WorkRange> {
    (0..threads)
        .map(|worker| work_range(iterations, threads, worker))
        .collect()
}
