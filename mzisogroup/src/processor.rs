//! The greedy outer loop of isotope grouping.
//!
//! Seeds are drawn from the working set in order of decreasing height. Each seed is
//! fit under every allowed charge, and if any charge explains more than the seed
//! alone, the winning group is materialized and all of its members leave the working
//! set for good. Every feature ends the run tagged with exactly one [`FeatureState`],
//! which decides whether and how it appears in the output.
use std::cmp::Ordering;

use tracing::{debug, info, trace};

use crate::charge::{ChargeRangeIter, ChargeSelector};
use crate::feature::{AppliedMethod, Feature, FeatureList};
use crate::fit::PatternFitter;
use crate::index::DualOrderedIndex;
use crate::materialize::{GroupMaterializer, MaterializedGroup};
use crate::params::{IsotopeGrouperParams, RepresentativeIsotope};
use crate::progress::{ProgressHandle, ProgressRecord};
use crate::tolerance::{MobilityTolerance, MzTolerance, RtTolerance};
use crate::traits::{CancellationSignal, IsotopeGroupingError, NeverCancel};

pub const METHOD_NAME: &str = "Isotopic peaks grouper";

const PROGRESS_INTERVAL: usize = 5000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingState {
    #[default]
    Running,
    Cancelled,
    Done,
}

/// What the grouper decided about a single feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FeatureState {
    /// No group was found, the feature is passed through as-is
    #[default]
    Untouched,
    /// The feature stands for a group
    Representative,
    /// The feature was merged into a group and is dropped
    Absorbed,
    /// The feature was merged into a group but kept for its fragmentation spectra
    Retained,
}

impl FeatureState {
    pub fn is_kept(&self) -> bool {
        !matches!(self, FeatureState::Absorbed)
    }
}

/// The result of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct GroupingResult {
    pub feature_list: FeatureList,
    pub progress: ProgressRecord,
}

/// Groups the isotopic features of one feature list.
///
/// The working set is private to each call to [`IsotopeGrouper::run`], so one grouper
/// can be reused for many lists, one at a time.
#[derive(Debug, Clone)]
pub struct IsotopeGrouper<C: CancellationSignal = NeverCancel> {
    params: IsotopeGrouperParams,
    cancellation: C,
    progress: ProgressHandle,
    state: ProcessingState,
}

impl IsotopeGrouper<NeverCancel> {
    pub fn new(params: IsotopeGrouperParams) -> Self {
        Self {
            params,
            cancellation: NeverCancel,
            progress: ProgressHandle::new(),
            state: ProcessingState::default(),
        }
    }
}

impl<C: CancellationSignal> IsotopeGrouper<C> {
    /// Replace the cancellation source polled once per seed
    pub fn with_cancellation<C2: CancellationSignal>(self, cancellation: C2) -> IsotopeGrouper<C2> {
        IsotopeGrouper {
            params: self.params,
            cancellation,
            progress: self.progress,
            state: self.state,
        }
    }

    pub fn with_progress_handle(mut self, progress: ProgressHandle) -> Self {
        self.progress = progress;
        self
    }

    pub fn params(&self) -> &IsotopeGrouperParams {
        &self.params
    }

    pub fn state(&self) -> ProcessingState {
        self.state
    }

    /// A view of this grouper's progress that can be polled from another thread
    pub fn progress_handle(&self) -> ProgressHandle {
        self.progress.clone()
    }

    fn check_preconditions(&self, feature_list: &FeatureList) -> Result<(), IsotopeGroupingError> {
        let n_sources = feature_list.raw_data_sources.len();
        if n_sources != 1 {
            return Err(IsotopeGroupingError::RawDataSourceCount(n_sources));
        }
        self.params.validate()?;
        for feature in feature_list.iter() {
            let field = if !feature.mz.is_finite() {
                "m/z"
            } else if !feature.rt.is_finite() {
                "RT"
            } else if !feature.height.is_finite() {
                "height"
            } else if feature.mobility.is_some_and(|m| !m.is_finite()) {
                "mobility"
            } else {
                continue;
            };
            return Err(IsotopeGroupingError::NonFiniteValue {
                feature_id: feature.id,
                field,
            });
        }
        Ok(())
    }

    fn make_applied_method(&self) -> AppliedMethod {
        let mut method = AppliedMethod::new(METHOD_NAME);
        let params = &self.params;
        method.add_param("max_charge", params.max_charge);
        method.add_param("monotonic_shape", params.monotonic_shape);
        method.add_param("representative", params.representative);
        method.add_param("keep_ms2_members", params.keep_ms2_members);
        method.add_param("mz_tolerance", params.tolerance.mz);
        method.add_param("rt_tolerance", params.tolerance.rt);
        match params.tolerance.mobility {
            Some(mobility) => method.add_param("mobility_tolerance", mobility),
            None => method.add_param("mobility_tolerance", "none"),
        }
        method
    }

    fn find_group(
        &self,
        seed: usize,
        features: &[Feature],
        index: &DualOrderedIndex,
    ) -> Option<MaterializedGroup> {
        let fitter = PatternFitter::new(
            features,
            index,
            self.params.tolerance,
            self.params.monotonic_shape,
        );
        let materializer =
            GroupMaterializer::new(self.params.representative, self.params.keep_ms2_members);
        ChargeSelector::new(fitter)
            .select_best_charge(seed, ChargeRangeIter::up_to(self.params.max_charge))
            .map(|matched| materializer.materialize(&matched, features))
    }

    /// Group the isotopic features of `feature_list`, producing a new feature list.
    ///
    /// The input is never modified. Returns `Ok(None)` if the run was cancelled, in
    /// which case all work is discarded.
    pub fn run(
        &mut self,
        feature_list: &FeatureList,
    ) -> Result<Option<GroupingResult>, IsotopeGroupingError> {
        self.check_preconditions(feature_list)?;
        let index = DualOrderedIndex::new(&feature_list.features);
        self.run_indexed(feature_list, index)
    }

    fn run_indexed(
        &mut self,
        feature_list: &FeatureList,
        mut index: DualOrderedIndex,
    ) -> Result<Option<GroupingResult>, IsotopeGroupingError> {
        let mut features = feature_list.features.clone();
        let n = features.len();
        let mut states = vec![FeatureState::Untouched; n];
        let mut record = ProgressRecord {
            features_total: n,
            ..Default::default()
        };

        debug!("Grouping isotopes of {n} features in {}", feature_list.name);
        self.progress.start(n);
        self.state = ProcessingState::Running;

        while self.state == ProcessingState::Running {
            let seed = match index.pop_most_intense()? {
                Some(seed) => seed,
                None => {
                    self.state = ProcessingState::Done;
                    break;
                }
            };
            record.seeds_processed += 1;
            if record.seeds_processed % PROGRESS_INTERVAL == 0 {
                let consumed = n - index.len();
                debug!(
                    "Processing seed {}/{n} ({:0.2}%)",
                    record.seeds_processed,
                    consumed as f32 / n as f32 * 100.0
                );
            }

            let mut n_consumed = 1;
            if let Some(group) = self.find_group(seed, &features, &index) {
                for i in group.members().filter(|i| *i != seed) {
                    index.remove(i)?;
                    n_consumed += 1;
                }
                states[group.representative] = FeatureState::Representative;
                for i in group.absorbed.iter() {
                    states[*i] = FeatureState::Absorbed;
                }
                for i in group.retained_ms2.iter() {
                    states[*i] = FeatureState::Retained;
                }
                record.groups_found += 1;
                record.features_absorbed += group.absorbed.len();
                record.ms2_members_retained += group.retained_ms2.len();
                group.apply(&mut features);
            } else {
                trace!("No isotopic group found for {}", features[seed]);
            }
            self.progress.advance(n_consumed);

            if self.cancellation.is_cancelled() {
                self.state = ProcessingState::Cancelled;
            }
        }

        if self.state == ProcessingState::Cancelled {
            info!(
                "Isotope grouping of {} was cancelled after {} seeds",
                feature_list.name, record.seeds_processed
            );
            return Ok(None);
        }
        self.progress.finish();

        record.features_untouched = states
            .iter()
            .filter(|s| **s == FeatureState::Untouched)
            .count();

        let mut kept: Vec<Feature> = features
            .into_iter()
            .zip(states)
            .filter(|(_, state)| state.is_kept())
            .map(|(f, _)| f)
            .collect();
        kept.sort_by(output_order);

        debug!(
            "Found {} isotopic groups in {}, {} features absorbed, {} retained for MS2, {} untouched",
            record.groups_found,
            feature_list.name,
            record.features_absorbed,
            record.ms2_members_retained,
            record.features_untouched
        );

        let mut applied_methods = feature_list.applied_methods.clone();
        applied_methods.push(self.make_applied_method());
        let output = FeatureList {
            name: format!("{} {}", feature_list.name, self.params.suffix),
            raw_data_sources: feature_list.raw_data_sources.clone(),
            features: kept,
            applied_methods,
        };
        Ok(Some(GroupingResult {
            feature_list: output,
            progress: record,
        }))
    }
}

fn output_order(a: &Feature, b: &Feature) -> Ordering {
    a.rt.total_cmp(&b.rt)
        .then_with(|| a.mz.total_cmp(&b.mz))
        .then_with(|| a.id.cmp(&b.id))
}

/// Build an [`IsotopeGrouper`] one parameter at a time
#[derive(Debug, Clone, Default)]
pub struct IsotopeGrouperBuilder {
    params: IsotopeGrouperParams,
}

impl IsotopeGrouperBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_charge(&mut self, max_charge: i32) -> &mut Self {
        self.params.max_charge = max_charge;
        self
    }

    pub fn monotonic_shape(&mut self, monotonic_shape: bool) -> &mut Self {
        self.params.monotonic_shape = monotonic_shape;
        self
    }

    pub fn mz_tolerance(&mut self, mz_tolerance: MzTolerance) -> &mut Self {
        self.params.tolerance.mz = mz_tolerance;
        self
    }

    pub fn rt_tolerance(&mut self, rt_tolerance: RtTolerance) -> &mut Self {
        self.params.tolerance.rt = rt_tolerance;
        self
    }

    pub fn mobility_tolerance(
        &mut self,
        mobility_tolerance: Option<MobilityTolerance>,
    ) -> &mut Self {
        self.params.tolerance.mobility = mobility_tolerance;
        self
    }

    pub fn representative(&mut self, representative: RepresentativeIsotope) -> &mut Self {
        self.params.representative = representative;
        self
    }

    pub fn keep_ms2_members(&mut self, keep_ms2_members: bool) -> &mut Self {
        self.params.keep_ms2_members = keep_ms2_members;
        self
    }

    pub fn suffix(&mut self, suffix: impl Into<String>) -> &mut Self {
        self.params.suffix = suffix.into();
        self
    }

    /// Validate the accumulated parameters and create the grouper
    pub fn build(&self) -> Result<IsotopeGrouper<NeverCancel>, IsotopeGroupingError> {
        self.params.validate()?;
        Ok(IsotopeGrouper::new(self.params.clone()))
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::AtomicBool;

    use super::*;

    fn features() -> Vec<Feature> {
        vec![
            Feature::new(1, 100.0, 5.0, 1000.0),
            Feature::new(2, 101.0033, 5.0, 300.0),
            Feature::new(3, 102.0066, 5.0, 90.0),
            Feature::new(4, 250.0, 3.0, 500.0),
        ]
    }

    fn grouper() -> IsotopeGrouper {
        IsotopeGrouperBuilder::new()
            .max_charge(1)
            .mz_tolerance(MzTolerance::new(0.003, 0.0))
            .rt_tolerance(RtTolerance(0.05))
            .build()
            .unwrap()
    }

    #[test_log::test]
    fn test_run() {
        let list = FeatureList::new("features", "run1.mzML", features());
        let mut grouper = grouper();
        let result = grouper.run(&list).unwrap().unwrap();
        assert_eq!(grouper.state(), ProcessingState::Done);
        assert_eq!(grouper.progress_handle().fraction(), 1.0);

        let out = &result.feature_list;
        assert_eq!(out.name, "features deiso");
        assert_eq!(out.len(), 2);
        // sorted by RT
        assert_eq!(out.features[0].id, 4);
        assert_eq!(out.features[1].id, 1);
        assert_eq!(out.features[1].charge, 1);
        assert_eq!(out.features[0].isotope_pattern, None);

        let method = out.applied_methods.last().unwrap();
        assert_eq!(method.name, METHOD_NAME);
        assert_eq!(method.get_param("max_charge"), Some("1"));
        assert_eq!(method.get_param("mobility_tolerance"), Some("none"));

        assert_eq!(
            result.progress,
            ProgressRecord {
                features_total: 4,
                seeds_processed: 2,
                groups_found: 1,
                features_absorbed: 2,
                ms2_members_retained: 0,
                features_untouched: 1,
            }
        );
        assert_eq!(result.progress.features_out(), out.len());
    }

    #[test]
    fn test_input_untouched() {
        let list = FeatureList::new("features", "run1.mzML", features());
        let before = list.clone();
        grouper().run(&list).unwrap();
        assert_eq!(list, before);
    }

    #[test]
    fn test_multiple_sources_rejected() {
        let mut list = FeatureList::new("aligned", "run1.mzML", features());
        list.raw_data_sources.push("run2.mzML".to_string());
        let err = grouper().run(&list).unwrap_err();
        assert_eq!(err, IsotopeGroupingError::RawDataSourceCount(2));
    }

    #[test]
    fn test_invalid_charge_rejected() {
        let err = IsotopeGrouperBuilder::new().max_charge(0).build().unwrap_err();
        assert_eq!(err, IsotopeGroupingError::InvalidMaximumCharge(0));
    }

    #[test]
    fn test_cancelled() {
        let list = FeatureList::new("features", "run1.mzML", features());
        let flag = AtomicBool::new(true);
        let mut grouper = grouper().with_cancellation(&flag);
        let handle = grouper.progress_handle();
        assert!(grouper.run(&list).unwrap().is_none());
        assert_eq!(grouper.state(), ProcessingState::Cancelled);
        assert!(!handle.is_done());
        // one seed and its group were consumed before the signal was seen
        assert_eq!(handle.consumed(), 3);
    }

    #[test]
    fn test_empty_list() {
        let list = FeatureList::new("empty", "run1.mzML", Vec::new());
        let result = grouper().run(&list).unwrap().unwrap();
        assert!(result.feature_list.is_empty());
        assert_eq!(result.progress.seeds_processed, 0);
    }

    #[test]
    fn test_non_finite_rejected() {
        let mut features = features();
        features[2].rt = f32::NAN;
        let list = FeatureList::new("features", "run1.mzML", features);
        let err = grouper().run(&list).unwrap_err();
        assert_eq!(
            err,
            IsotopeGroupingError::NonFiniteValue {
                feature_id: 3,
                field: "RT"
            }
        );

        let mut nan_mz = self::features();
        nan_mz[0].mz = -f64::NAN;
        let list = FeatureList::new("features", "run1.mzML", nan_mz);
        assert!(matches!(
            grouper().run(&list),
            Err(IsotopeGroupingError::NonFiniteValue { feature_id: 1, .. })
        ));
    }

    #[test]
    fn test_index_defect_aborts_run() {
        let list = FeatureList::new("features", "run1.mzML", features());
        let mut index = DualOrderedIndex::new(&list.features);
        index.drop_from_mz_order(1);
        let mut grouper = grouper();
        let handle = grouper.progress_handle();
        let err = grouper.run_indexed(&list, index).unwrap_err();
        assert_eq!(
            err,
            IsotopeGroupingError::IndexInvariantViolated {
                feature_id: 2,
                mz: 101.0033
            }
        );
        assert!(!handle.is_done());
    }
}
