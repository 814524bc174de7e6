//! An arena-backed working set kept in two orderings at once.
//!
//! Features live in a caller-owned slice (the arena). [`DualOrderedIndex`] only stores
//! arena positions, once sorted by descending height to drive seed selection and once
//! sorted by ascending m/z to drive neighbor search. Removal tombstones a position so
//! both orderings stop yielding it in the same step, and the m/z ordering is compacted
//! once tombstones make up more than half of it.
use tracing::trace;

use crate::feature::Feature;
use crate::traits::IsotopeGroupingError;

const COMPACTION_MIN_SIZE: usize = 64;

/// Which way to walk the m/z ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

impl Direction {
    #[inline]
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Ascending => 1.0,
            Direction::Descending => -1.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DualOrderedIndex {
    by_height: Vec<usize>,
    height_cursor: usize,
    by_mz: Vec<usize>,
    mz_keys: Vec<f64>,
    ids: Vec<u32>,
    alive: Vec<bool>,
    n_alive: usize,
    n_dead_in_mz: usize,
}

impl DualOrderedIndex {
    pub fn new(features: &[Feature]) -> Self {
        let n = features.len();
        let mut by_height: Vec<usize> = (0..n).collect();
        by_height.sort_by(|a, b| {
            let (fa, fb) = (&features[*a], &features[*b]);
            fb.height
                .total_cmp(&fa.height)
                .then_with(|| fa.mz.total_cmp(&fb.mz))
                .then_with(|| a.cmp(b))
        });

        let mut by_mz: Vec<usize> = (0..n).collect();
        by_mz.sort_by(|a, b| features[*a].mz.total_cmp(&features[*b].mz).then_with(|| a.cmp(b)));

        Self {
            by_height,
            height_cursor: 0,
            by_mz,
            mz_keys: features.iter().map(|f| f.mz).collect(),
            ids: features.iter().map(|f| f.id).collect(),
            alive: vec![true; n],
            n_alive: n,
            n_dead_in_mz: 0,
        }
    }

    /// The number of features still in the working set
    pub fn len(&self) -> usize {
        self.n_alive
    }

    pub fn is_empty(&self) -> bool {
        self.n_alive == 0
    }

    pub fn contains(&self, index: usize) -> bool {
        self.alive.get(index).copied().unwrap_or(false)
    }

    /// Remove and return the arena position of the most intense remaining feature,
    /// or `None` when the working set is exhausted.
    pub fn pop_most_intense(&mut self) -> Result<Option<usize>, IsotopeGroupingError> {
        while let Some(index) = self.by_height.get(self.height_cursor).copied() {
            self.height_cursor += 1;
            if self.alive[index] {
                self.remove(index)?;
                return Ok(Some(index));
            }
        }
        Ok(None)
    }

    /// The m/z ordering is sorted by `(m/z, arena position)` under `total_cmp`, so
    /// searches must compare the same way.
    fn mz_order_cmp(&self, a: usize, b: usize) -> std::cmp::Ordering {
        self.mz_keys[a]
            .total_cmp(&self.mz_keys[b])
            .then_with(|| a.cmp(&b))
    }

    fn locate_in_mz_order(&self, index: usize) -> Option<usize> {
        let position = self
            .by_mz
            .partition_point(|i| self.mz_order_cmp(*i, index).is_lt());
        match self.by_mz.get(position) {
            Some(i) if *i == index => Some(position),
            _ => None,
        }
    }

    /// Remove a feature from both orderings.
    ///
    /// Asking to remove a feature that was already consumed, or one the m/z ordering lost
    /// track of, is a bookkeeping defect and is reported instead of skipped.
    pub fn remove(&mut self, index: usize) -> Result<(), IsotopeGroupingError> {
        if !self.contains(index) {
            return Err(IsotopeGroupingError::FeatureAlreadyConsumed {
                feature_id: self.ids.get(index).copied().unwrap_or(u32::MAX),
            });
        }
        if self.locate_in_mz_order(index).is_none() {
            return Err(IsotopeGroupingError::IndexInvariantViolated {
                feature_id: self.ids[index],
                mz: self.mz_keys[index],
            });
        }
        self.alive[index] = false;
        self.n_alive -= 1;
        self.n_dead_in_mz += 1;
        if self.by_mz.len() >= COMPACTION_MIN_SIZE && self.n_dead_in_mz * 2 > self.by_mz.len() {
            self.compact();
        }
        Ok(())
    }

    fn compact(&mut self) {
        let n_before = self.by_mz.len();
        let alive = &self.alive;
        self.by_mz.retain(|i| alive[*i]);
        self.n_dead_in_mz = 0;
        trace!("Compacted m/z ordering from {n_before} to {}", self.by_mz.len());
    }

    /// Walk the remaining features in m/z order starting from `mz`.
    ///
    /// Walking [`Direction::Ascending`] begins at the first feature with an m/z at or above
    /// `mz`, walking [`Direction::Descending`] begins at the last feature with an m/z at or
    /// below it. The cursor is lazy, so callers can stop as soon as they leave their window.
    pub fn search_from(&self, mz: f64, direction: Direction) -> MzCursor<'_> {
        let position = match direction {
            Direction::Ascending => self
                .by_mz
                .partition_point(|i| self.mz_keys[*i].total_cmp(&mz).is_lt()),
            Direction::Descending => self
                .by_mz
                .partition_point(|i| self.mz_keys[*i].total_cmp(&mz).is_le()),
        };
        MzCursor {
            index: self,
            position,
            direction,
        }
    }

    #[cfg(test)]
    pub(crate) fn drop_from_mz_order(&mut self, index: usize) {
        self.by_mz.retain(|i| *i != index);
    }

    /// Iterate over the arena positions still in the working set, by ascending m/z
    pub fn iter_remaining(&self) -> impl Iterator<Item = usize> + '_ {
        self.by_mz.iter().copied().filter(|i| self.alive[*i])
    }
}

/// A forward-only cursor over the m/z ordering of a [`DualOrderedIndex`] that yields
/// `(arena position, m/z)` pairs and skips consumed features.
#[derive(Debug, Clone)]
pub struct MzCursor<'a> {
    index: &'a DualOrderedIndex,
    position: usize,
    direction: Direction,
}

impl Iterator for MzCursor<'_> {
    type Item = (usize, f64);

    fn next(&mut self) -> Option<Self::Item> {
        match self.direction {
            Direction::Ascending => {
                while let Some(i) = self.index.by_mz.get(self.position).copied() {
                    self.position += 1;
                    if self.index.alive[i] {
                        return Some((i, self.index.mz_keys[i]));
                    }
                }
                None
            }
            Direction::Descending => {
                while self.position > 0 {
                    self.position -= 1;
                    let i = self.index.by_mz[self.position];
                    if self.index.alive[i] {
                        return Some((i, self.index.mz_keys[i]));
                    }
                }
                None
            }
        }
    }
}
