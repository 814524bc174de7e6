use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// A summary of what an isotope grouping run did
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ProgressRecord {
    pub features_total: usize,
    pub seeds_processed: usize,
    pub groups_found: usize,
    pub features_absorbed: usize,
    pub ms2_members_retained: usize,
    pub features_untouched: usize,
}

impl ProgressRecord {
    /// The number of features in the output feature list
    pub fn features_out(&self) -> usize {
        self.features_untouched + self.groups_found + self.ms2_members_retained
    }
}

impl Add for ProgressRecord {
    type Output = ProgressRecord;

    fn add(self, rhs: Self) -> Self::Output {
        let mut dup = self;
        dup += rhs;
        dup
    }
}

impl AddAssign for ProgressRecord {
    fn add_assign(&mut self, rhs: Self) {
        self.features_total += rhs.features_total;
        self.seeds_processed += rhs.seeds_processed;
        self.groups_found += rhs.groups_found;
        self.features_absorbed += rhs.features_absorbed;
        self.ms2_members_retained += rhs.ms2_members_retained;
        self.features_untouched += rhs.features_untouched;
    }
}

impl Sum for ProgressRecord {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(ProgressRecord::default(), |acc, x| acc + x)
    }
}

#[derive(Debug, Default)]
struct ProgressCounters {
    consumed: AtomicUsize,
    total: AtomicUsize,
    done: AtomicBool,
}

/// A cheaply cloneable view of how many features a running grouper has consumed,
/// which may be polled from another thread.
#[derive(Debug, Clone, Default)]
pub struct ProgressHandle {
    counters: Arc<ProgressCounters>,
}

impl ProgressHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn start(&self, total: usize) {
        self.counters.total.store(total, Ordering::Release);
        self.counters.consumed.store(0, Ordering::Release);
        self.counters.done.store(false, Ordering::Release);
    }

    pub(crate) fn advance(&self, n: usize) {
        self.counters.consumed.fetch_add(n, Ordering::AcqRel);
    }

    pub(crate) fn finish(&self) {
        let total = self.counters.total.load(Ordering::Acquire);
        self.counters.consumed.store(total, Ordering::Release);
        self.counters.done.store(true, Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        self.counters.done.load(Ordering::Acquire)
    }

    pub fn consumed(&self) -> usize {
        self.counters.consumed.load(Ordering::Acquire)
    }

    pub fn total(&self) -> usize {
        self.counters.total.load(Ordering::Acquire)
    }

    /// The fraction of the starting features consumed so far. An empty run counts
    /// as complete once it has finished.
    pub fn fraction(&self) -> f64 {
        let total = self.total();
        if self.is_done() {
            1.0
        } else if total == 0 {
            0.0
        } else {
            (self.consumed() as f64 / total as f64).min(1.0)
        }
    }
}
