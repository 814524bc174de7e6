/*! Turning a winning [`MatchedSet`] into a representative feature and its isotopic pattern */
use std::cmp::Ordering;

use itertools::{Either, Itertools};
use tracing::warn;

use crate::feature::{Feature, IsotopePattern};
use crate::fit::MatchedSet;
use crate::params::RepresentativeIsotope;

/// The decisions made for one isotopic group, not yet applied to the features.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializedGroup {
    pub seed: usize,
    pub charge: i32,
    /// The arena position of the member kept to stand for the group
    pub representative: usize,
    /// Members dropped from the output
    pub absorbed: Vec<usize>,
    /// Members that were absorbed but survive in the output because they have
    /// fragmentation spectra
    pub retained_ms2: Vec<usize>,
    pub pattern: IsotopePattern,
    /// Whether `pattern` should be written to the representative. A representative
    /// that already carries a pattern keeps it.
    pub assign_pattern: bool,
}

impl MaterializedGroup {
    /// Every member of the group, all of which leave the working set
    pub fn members(&self) -> impl Iterator<Item = usize> + '_ {
        std::iter::once(self.representative)
            .chain(self.absorbed.iter().copied())
            .chain(self.retained_ms2.iter().copied())
    }

    /// Write the pattern and charge to the representative if it may receive them
    pub fn apply(&self, features: &mut [Feature]) {
        if self.assign_pattern {
            let rep = &mut features[self.representative];
            rep.charge = self.pattern.charge;
            rep.isotope_pattern = Some(self.pattern.clone());
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupMaterializer {
    pub representative: RepresentativeIsotope,
    pub keep_ms2_members: bool,
}

impl GroupMaterializer {
    pub fn new(representative: RepresentativeIsotope, keep_ms2_members: bool) -> Self {
        Self {
            representative,
            keep_ms2_members,
        }
    }

    fn compare_members(&self, a: &Feature, b: &Feature) -> Ordering {
        match self.representative {
            RepresentativeIsotope::MostIntense => b
                .height
                .total_cmp(&a.height)
                .then_with(|| a.mz.total_cmp(&b.mz))
                .then_with(|| a.id.cmp(&b.id)),
            RepresentativeIsotope::LowestMz => a
                .mz
                .total_cmp(&b.mz)
                .then_with(|| b.height.total_cmp(&a.height))
                .then_with(|| a.id.cmp(&b.id)),
        }
    }

    /// Pick the member that represents the group under the configured policy
    pub fn select_representative(&self, matched: &MatchedSet, features: &[Feature]) -> usize {
        matched
            .iter()
            .copied()
            .min_by(|a, b| self.compare_members(&features[*a], &features[*b]))
            .unwrap_or(matched.seed)
    }

    pub fn materialize(&self, matched: &MatchedSet, features: &[Feature]) -> MaterializedGroup {
        let seed = &features[matched.seed];
        let pattern = IsotopePattern::from_members(
            matched.iter_features(features),
            matched.charge,
            format!("Isotope pattern of {seed}"),
        );

        let representative = self.select_representative(matched, features);
        let assign_pattern = !features[representative].has_isotope_pattern();
        if !assign_pattern {
            warn!(
                "{} already has an isotope pattern, keeping it instead of the {} member pattern found at charge {}",
                features[representative],
                pattern.len(),
                matched.charge
            );
        }

        let keep_ms2 = self.keep_ms2_members;
        let (absorbed, retained_ms2): (Vec<usize>, Vec<usize>) = matched
            .iter()
            .copied()
            .filter(|i| *i != representative)
            .partition_map(|i| {
                if keep_ms2 && features[i].has_ms2 {
                    Either::Right(i)
                } else {
                    Either::Left(i)
                }
            });

        MaterializedGroup {
            seed: matched.seed,
            charge: matched.charge,
            representative,
            absorbed,
            retained_ms2,
            pattern,
            assign_pattern,
        }
    }
}
