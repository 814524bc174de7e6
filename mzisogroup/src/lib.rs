//! `mzisogroup` groups chromatographic features detected in a single LC-MS run into
//! isotopic patterns.
//!
//! Each group is collapsed onto one representative feature which is annotated with
//! the detected [`IsotopePattern`] and charge state, while the other isotopologues
//! are dropped from the feature list, or kept when they carry fragmentation spectra.
//!
//! The most intense remaining feature is always tried first, every charge state up
//! to a limit is tried, and the charge that explains the most features wins.
//!
//! ```
//! use mzisogroup::{group_isotopes, Feature, FeatureList, IsotopeGrouperParams, NeverCancel};
//!
//! let features = vec![
//!     Feature::new(1, 100.0, 5.0, 1000.0),
//!     Feature::new(2, 101.003355, 5.0, 300.0),
//! ];
//! let list = FeatureList::new("features", "sample.mzML", features);
//! let grouped = group_isotopes(&list, IsotopeGrouperParams::default(), NeverCancel)
//!     .unwrap()
//!     .unwrap();
//! assert_eq!(grouped.len(), 1);
//! assert_eq!(grouped.features[0].charge, 1);
//! ```
pub mod api;
pub mod charge;
pub mod feature;
pub mod fit;
pub mod index;
pub mod materialize;
pub mod params;
pub mod processor;
pub mod progress;
pub mod tolerance;
pub mod traits;

pub use crate::api::{group_isotopes, IsotopeGroupingEngine};
pub use crate::feature::{
    AppliedMethod, Feature, FeatureList, IsotopePattern, IsotopePatternStatus,
};
pub use crate::params::{IsotopeGrouperParams, RepresentativeIsotope};
pub use crate::processor::{
    FeatureState, GroupingResult, IsotopeGrouper, IsotopeGrouperBuilder, ProcessingState,
};
pub use crate::progress::{ProgressHandle, ProgressRecord};
pub use crate::tolerance::{
    MobilityTolerance, MobilityType, MzTolerance, RtTolerance, SearchTolerance,
};
pub use crate::traits::{CancellationSignal, IsotopeGroupingError, NeverCancel};
