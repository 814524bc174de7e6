use std::cmp;

use tracing::trace;

use crate::fit::{MatchedSet, PatternFitter};

/// An inclusive range of charge states, `(low, high)`
pub type ChargeRange = (i32, i32);

pub trait ChargeIterator: Iterator<Item = i32> {}

/// Iterate over an inclusive range of charge states in ascending order of magnitude,
/// carrying the sign of the range.
#[derive(Debug, Clone)]
pub struct ChargeRangeIter {
    pub min: i32,
    pub max: i32,
    pub sign: i32,
    index: usize,
    size: usize,
}

impl ChargeRangeIter {
    pub fn new(min: i32, max: i32) -> ChargeRangeIter {
        let low = cmp::min(min.abs(), max.abs());
        let high = cmp::max(min.abs(), max.abs());
        let sign = if min < 0 || max < 0 { -1 } else { 1 };
        let size = if low == 0 && high == 0 {
            0
        } else {
            (high - low.max(1) + 1) as usize
        };
        ChargeRangeIter {
            min: low.max(1),
            max: high,
            sign,
            index: 0,
            size,
        }
    }

    /// All charge states from 1 up to `max_charge`
    pub fn up_to(max_charge: i32) -> ChargeRangeIter {
        Self::new(1, max_charge)
    }

    pub fn next_charge(&mut self) -> Option<i32> {
        if self.index >= self.size {
            None
        } else {
            let i = (self.min + self.index as i32) * self.sign;
            self.index += 1;
            Some(i)
        }
    }
}

impl Iterator for ChargeRangeIter {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        self.next_charge()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.size - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChargeRangeIter {}

impl From<ChargeRange> for ChargeRangeIter {
    fn from(pair: ChargeRange) -> ChargeRangeIter {
        ChargeRangeIter::new(pair.0, pair.1)
    }
}

impl ChargeIterator for ChargeRangeIter {}

/// Runs a [`PatternFitter`] under every charge hypothesis and keeps the one that
/// explains the most features.
#[derive(Debug, Clone, Copy)]
pub struct ChargeSelector<'a> {
    fitter: PatternFitter<'a>,
}

impl<'a> ChargeSelector<'a> {
    pub fn new(fitter: PatternFitter<'a>) -> Self {
        Self { fitter }
    }

    /// Choose the charge whose matched set is strictly largest, preferring the lower
    /// charge on a tie. Returns `None` when no charge matched anything beyond the seed.
    pub fn select_best_charge<Z: ChargeIterator>(
        &self,
        seed: usize,
        charges: Z,
    ) -> Option<MatchedSet> {
        let mut best: Option<MatchedSet> = None;
        for charge in charges {
            let candidate = self.fitter.fit(seed, charge);
            let replace = match best.as_ref() {
                None => true,
                Some(current) => {
                    candidate.len() > current.len()
                        || (candidate.len() == current.len()
                            && candidate.charge.abs() < current.charge.abs())
                }
            };
            if replace {
                best = Some(candidate);
            }
        }
        match best {
            Some(best) if !best.is_seed_only() => {
                trace!(
                    "Selected charge {} with {} features for seed {}",
                    best.charge,
                    best.len(),
                    seed
                );
                Some(best)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::feature::Feature;
    use crate::index::DualOrderedIndex;
    use crate::tolerance::{MzTolerance, RtTolerance, SearchTolerance};

    struct ChargeList(std::vec::IntoIter<i32>);

    impl Iterator for ChargeList {
        type Item = i32;

        fn next(&mut self) -> Option<i32> {
            self.0.next()
        }
    }

    impl ChargeIterator for ChargeList {}

    fn tolerance() -> SearchTolerance {
        SearchTolerance::new(MzTolerance::new(0.003, 0.0), RtTolerance(0.05), None)
    }

    #[test]
    fn test_charge_range_inclusive() {
        let charges: Vec<_> = ChargeRangeIter::up_to(3).collect();
        assert_eq!(charges, vec![1, 2, 3]);
        let charges: Vec<_> = ChargeRangeIter::from((-1, -4)).collect();
        assert_eq!(charges, vec![-1, -2, -3, -4]);
        assert_eq!(ChargeRangeIter::up_to(0).count(), 0);
        assert_eq!(ChargeRangeIter::up_to(4).len(), 4);
    }

    #[test]
    fn test_tie_prefers_lower_charge() {
        // Under z=1 the seed, the 1st and the 2nd isotope match. Under z=2 the half-spaced
        // feature and the z=1 1st isotope match, then the 3rd half-spaced order is empty.
        let features = vec![
            Feature::new(1, 100.0, 5.0, 1000.0),
            Feature::new(2, 100.5016775, 5.0, 200.0),
            Feature::new(3, 101.003355, 5.0, 400.0),
            Feature::new(4, 102.00671, 5.0, 100.0),
        ];
        let index = DualOrderedIndex::new(&features);
        let fitter = PatternFitter::new(&features, &index, tolerance(), true);
        assert_eq!(fitter.fit(0, 1).len(), 3);
        assert_eq!(fitter.fit(0, 2).len(), 3);

        let selector = ChargeSelector::new(fitter);
        let best = selector
            .select_best_charge(0, ChargeRangeIter::up_to(4))
            .unwrap();
        assert_eq!(best.charge, 1);

        let best = selector
            .select_best_charge(0, ChargeList(vec![2, 1].into_iter()))
            .unwrap();
        assert_eq!(best.charge, 1);
    }

    #[test]
    fn test_larger_set_wins() {
        let features = vec![
            Feature::new(1, 200.0, 5.0, 1000.0),
            Feature::new(2, 200.5016775, 5.0, 300.0),
            Feature::new(3, 201.003355, 5.0, 300.0),
        ];
        let index = DualOrderedIndex::new(&features);
        let fitter = PatternFitter::new(&features, &index, tolerance(), true);
        assert_eq!(fitter.fit(0, 1).len(), 2);
        assert_eq!(fitter.fit(0, 2).len(), 3);
        let best = ChargeSelector::new(fitter)
            .select_best_charge(0, ChargeRangeIter::up_to(2))
            .unwrap();
        assert_eq!(best.charge, 2);
        assert_eq!(best.members, vec![0, 1, 2]);
    }

    #[test]
    fn test_no_group() {
        let features = vec![
            Feature::new(1, 200.0, 5.0, 1000.0),
            Feature::new(2, 250.0, 5.0, 300.0),
        ];
        let index = DualOrderedIndex::new(&features);
        let fitter = PatternFitter::new(&features, &index, tolerance(), false);
        let selector = ChargeSelector::new(fitter);
        assert!(selector
            .select_best_charge(0, ChargeRangeIter::up_to(5))
            .is_none());
    }
}
