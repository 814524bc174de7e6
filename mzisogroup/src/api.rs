//! High level APIs for grouping isotopic features
use crate::feature::FeatureList;
use crate::params::IsotopeGrouperParams;
use crate::processor::{GroupingResult, IsotopeGrouper};
use crate::progress::{ProgressHandle, ProgressRecord};
use crate::traits::{CancellationSignal, IsotopeGroupingError};

/// A single-shot isotope grouping of `feature_list`.
///
/// # Arguments
/// - `feature_list`: The features of a single raw data file to group
/// - `params`: The tolerances, charge limit and retention policies to use
/// - `cancellation`: Polled once per seed, if it fires the run is abandoned
///
/// Returns `Ok(None)` when the run was cancelled.
///
/// # See also
/// [`IsotopeGroupingEngine::group_isotopes`]
pub fn group_isotopes<C: CancellationSignal>(
    feature_list: &FeatureList,
    params: IsotopeGrouperParams,
    cancellation: C,
) -> Result<Option<FeatureList>, IsotopeGroupingError> {
    let engine = IsotopeGroupingEngine::new(params);
    engine.group_isotopes(feature_list, cancellation)
}

/// Holds a consistent set of parameters to group many feature lists with, and
/// accumulates a summary of everything it has processed.
#[derive(Debug, Clone, Default)]
pub struct IsotopeGroupingEngine {
    params: IsotopeGrouperParams,
    progress: ProgressRecord,
}

impl IsotopeGroupingEngine {
    pub fn new(params: IsotopeGrouperParams) -> Self {
        Self {
            params,
            progress: ProgressRecord::default(),
        }
    }

    pub fn params(&self) -> &IsotopeGrouperParams {
        &self.params
    }

    /// The summed progress of every completed run of this engine
    pub fn progress(&self) -> ProgressRecord {
        self.progress
    }

    /// Group `feature_list`, returning the result along with its summary.
    ///
    /// `progress` is updated as features are consumed and may be watched from another thread.
    pub fn run_with_progress<C: CancellationSignal>(
        &mut self,
        feature_list: &FeatureList,
        cancellation: C,
        progress: ProgressHandle,
    ) -> Result<Option<GroupingResult>, IsotopeGroupingError> {
        let mut grouper = IsotopeGrouper::new(self.params.clone())
            .with_cancellation(cancellation)
            .with_progress_handle(progress);
        let result = grouper.run(feature_list)?;
        if let Some(result) = result.as_ref() {
            self.progress += result.progress;
        }
        Ok(result)
    }

    /// Group `feature_list`, returning `Ok(None)` if `cancellation` fired first.
    pub fn group_isotopes<C: CancellationSignal>(
        &self,
        feature_list: &FeatureList,
        cancellation: C,
    ) -> Result<Option<FeatureList>, IsotopeGroupingError> {
        let mut grouper = IsotopeGrouper::new(self.params.clone()).with_cancellation(cancellation);
        Ok(grouper.run(feature_list)?.map(|r| r.feature_list))
    }
}
