//! Parallel per-slot iteration.
//!
//! Splits a pass across threads using [`std::thread::scope`]. The data a
//! pass writes is handed over as [`Lanes`]: a bundle of column sub-slices
//! that can be cut into disjoint batches.

use std::ops::Range;

use crate::config::ParConfig;

/// Slot count below which parallel iteration is not worth the overhead.
pub const PARALLEL_THRESHOLD: usize = 128;

/// Something that covers a run of slots and splits into disjoint halves.
pub trait Lanes: Sized + Send {
    /// Number of slots covered.
    fn len(&self) -> usize;

    /// Checks whether no slot is covered.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Splits into `[0, mid)` and `[mid, len)`.
    fn split_at(self, mid: usize) -> (Self, Self);
}

impl Lanes for Range<usize> {
    fn len(&self) -> usize {
        ExactSizeIterator::len(self)
    }

    fn split_at(self, mid: usize) -> (Self, Self) {
        let mid = self.start + mid;
        (self.start..mid, mid..self.end)
    }
}

/// Runs `f` over `lanes`, in batches on scoped threads when large enough.
///
/// Falls back to a single call on the current thread for small slot counts
/// (< [`PARALLEL_THRESHOLD`]) or when `min_batch_size` would result in a
/// single batch.
pub fn par_for_each_lanes<L, F>(lanes: L, config: &ParConfig, f: &F)
where
    L: Lanes,
    F: Fn(L) + Sync,
{
    let count = lanes.len();
    if count < PARALLEL_THRESHOLD || count <= config.min_batch_size {
        f(lanes);
        return;
    }

    let num_threads = config.effective_threads();
    if num_threads == 1 {
        f(lanes);
        return;
    }
    let batch_size = (count / (num_threads * 4)).max(config.min_batch_size).max(1);

    std::thread::scope(|scope| {
        let mut rest = lanes;
        while rest.len() > batch_size {
            let (batch, tail) = rest.split_at(batch_size);
            scope.spawn(move || f(batch));
            rest = tail;
        }
        f(rest);
    });
}
