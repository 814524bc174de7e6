/*! Fitting a seed feature's isotopic pattern under a single charge hypothesis */
use std::collections::HashSet;

use identity_hash::BuildIdentityHasher;
use tracing::trace;

use crate::feature::Feature;
use crate::index::{Direction, DualOrderedIndex};
use crate::tolerance::{isotopic_offset, SearchTolerance, SeedWindow};

pub(crate) type IndexSet = HashSet<usize, BuildIdentityHasher<usize>>;

/// The features believed to be isotopologues of one seed under one charge state.
///
/// Members are arena positions sorted by ascending m/z, and always include the seed.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedSet {
    pub seed: usize,
    pub charge: i32,
    pub members: Vec<usize>,
}

impl MatchedSet {
    pub fn seed_only(seed: usize, charge: i32) -> Self {
        Self {
            seed,
            charge,
            members: vec![seed],
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether nothing but the seed was matched
    pub fn is_seed_only(&self) -> bool {
        self.members.len() <= 1
    }

    pub fn iter(&self) -> std::slice::Iter<'_, usize> {
        self.members.iter()
    }

    pub fn iter_features<'a>(
        &'a self,
        features: &'a [Feature],
    ) -> impl Iterator<Item = &'a Feature> + 'a {
        self.members.iter().map(move |i| &features[*i])
    }
}

/// Expands outward from a seed feature in m/z, collecting every remaining feature
/// that lands on the next expected isotope position until an order comes up empty.
#[derive(Debug, Clone, Copy)]
pub struct PatternFitter<'a> {
    features: &'a [Feature],
    index: &'a DualOrderedIndex,
    tolerance: SearchTolerance,
    monotonic_shape: bool,
}

impl<'a> PatternFitter<'a> {
    pub fn new(
        features: &'a [Feature],
        index: &'a DualOrderedIndex,
        tolerance: SearchTolerance,
        monotonic_shape: bool,
    ) -> Self {
        Self {
            features,
            index,
            tolerance,
            monotonic_shape,
        }
    }

    /// Fit the isotopic pattern of the feature at arena position `seed` assuming `charge`.
    ///
    /// When the shape is not monotonic, lower m/z isotopologues are searched for too,
    /// so the seed need not be the monoisotopic peak.
    pub fn fit(&self, seed: usize, charge: i32) -> MatchedSet {
        if charge == 0 {
            return MatchedSet::seed_only(seed, charge);
        }
        let seed_feature = &self.features[seed];
        let window = self.tolerance.window_for(seed_feature);

        let mut fitted = IndexSet::default();
        fitted.insert(seed);
        let mut members = vec![seed];

        let orders_below = if !self.monotonic_shape {
            self.fit_half_pattern(
                seed_feature,
                &window,
                charge,
                Direction::Descending,
                &mut fitted,
                &mut members,
            )
        } else {
            0
        };
        let orders_above = self.fit_half_pattern(
            seed_feature,
            &window,
            charge,
            Direction::Ascending,
            &mut fitted,
            &mut members,
        );

        let features = self.features;
        members.sort_by(|a, b| {
            features[*a]
                .mz
                .total_cmp(&features[*b].mz)
                .then_with(|| features[*a].id.cmp(&features[*b].id))
        });
        trace!(
            "Fit {} features for {seed_feature} at charge {charge} ({orders_below} orders below, {orders_above} above)",
            members.len()
        );
        MatchedSet {
            seed,
            charge,
            members,
        }
    }

    /// Returns the highest isotope order that matched in this direction.
    fn fit_half_pattern(
        &self,
        seed: &Feature,
        window: &SeedWindow,
        charge: i32,
        direction: Direction,
        fitted: &mut IndexSet,
        members: &mut Vec<usize>,
    ) -> usize {
        let mut order = 0;
        loop {
            let expected_mz = seed.mz + direction.sign() * isotopic_offset(order + 1, charge);
            let (lower, upper) = window.mz_bounds(expected_mz);
            let mut n_found = 0;
            let start = match direction {
                Direction::Ascending => lower,
                Direction::Descending => upper,
            };
            for (i, mz) in self.index.search_from(start, direction) {
                let outside = match direction {
                    Direction::Ascending => mz > upper,
                    Direction::Descending => mz < lower,
                };
                if outside {
                    break;
                }
                if fitted.contains(&i) {
                    continue;
                }
                if window.accepts(expected_mz, &self.features[i]) {
                    fitted.insert(i);
                    members.push(i);
                    n_found += 1;
                }
            }
            if n_found == 0 {
                break;
            }
            order += 1;
        }
        order
    }
}
