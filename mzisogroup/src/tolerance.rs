//! Tolerance windows for matching features to expected isotope positions.
//!
//! All windows are anchored to the seed feature of a fit attempt, so the m/z
//! window width is computed once from the seed's m/z and reused for every
//! isotope order probed from that seed.
use std::fmt::Display;

use mzpeaks::Tolerance;

use crate::feature::Feature;

/// The mass difference between consecutive isotopologues, the 13C - 12C mass difference
pub const ISOTOPE_DISTANCE: f64 = 1.003355;

/// The m/z offset of the `order`-th isotopologue under `charge`
#[inline]
pub fn isotopic_offset(order: usize, charge: i32) -> f64 {
    order as f64 * ISOTOPE_DISTANCE / charge.abs() as f64
}

/// An m/z tolerance made of a relative part and an absolute floor. The wider
/// of the two applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MzTolerance {
    pub absolute: f64,
    pub ppm: f64,
}

impl MzTolerance {
    pub fn new(absolute: f64, ppm: f64) -> Self {
        Self { absolute, ppm }
    }

    pub fn half_width(&self, reference_mz: f64) -> f64 {
        let (_, upper) = Tolerance::PPM(self.ppm).bounds(reference_mz);
        (upper - reference_mz).max(self.absolute)
    }

    pub fn is_valid(&self) -> bool {
        self.absolute.is_finite() && self.ppm.is_finite() && self.absolute >= 0.0 && self.ppm >= 0.0
    }
}

impl Default for MzTolerance {
    fn default() -> Self {
        Self::new(0.003, 10.0)
    }
}

impl Display for MzTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} m/z or {} ppm", self.absolute, self.ppm)
    }
}

/// An absolute retention time window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RtTolerance(pub f32);

impl RtTolerance {
    pub fn contains(&self, reference: f32, observed: f32) -> bool {
        (observed - reference).abs() <= self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_finite() && self.0 >= 0.0
    }
}

impl Default for RtTolerance {
    fn default() -> Self {
        Self(0.1)
    }
}

impl Display for RtTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The kind of ion mobility separation the features were acquired with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MobilityType {
    Tims,
    DriftTube,
    TravellingWave,
}

/// An absolute ion mobility window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MobilityTolerance(pub f32);

impl MobilityTolerance {
    /// A sensible default window for the units each instrument type reports in
    pub fn for_instrument(mobility_type: MobilityType) -> Self {
        match mobility_type {
            MobilityType::Tims => Self(0.008),
            MobilityType::DriftTube | MobilityType::TravellingWave => Self(1.0),
        }
    }

    pub fn contains(&self, reference: f32, observed: f32) -> bool {
        (observed - reference).abs() <= self.0
    }

    pub fn is_valid(&self) -> bool {
        self.0.is_finite() && self.0 >= 0.0
    }
}

impl Display for MobilityTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The full set of configured windows
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SearchTolerance {
    pub mz: MzTolerance,
    pub rt: RtTolerance,
    pub mobility: Option<MobilityTolerance>,
}

impl SearchTolerance {
    pub fn new(mz: MzTolerance, rt: RtTolerance, mobility: Option<MobilityTolerance>) -> Self {
        Self { mz, rt, mobility }
    }

    /// Fix the windows around a seed feature
    pub fn window_for(&self, seed: &Feature) -> SeedWindow {
        SeedWindow {
            mz_half_width: self.mz.half_width(seed.mz),
            rt: seed.rt,
            rt_tolerance: self.rt,
            mobility: match (self.mobility, seed.mobility) {
                (Some(tol), Some(mobility)) => Some((mobility, tol)),
                _ => None,
            },
        }
    }
}

/// The tolerance windows of a single seed, precomputed so that every isotope order
/// is judged against the same reference point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeedWindow {
    pub mz_half_width: f64,
    rt: f32,
    rt_tolerance: RtTolerance,
    mobility: Option<(f32, MobilityTolerance)>,
}

impl SeedWindow {
    /// The inclusive m/z interval an isotope expected at `expected_mz` may fall in
    #[inline]
    pub fn mz_bounds(&self, expected_mz: f64) -> (f64, f64) {
        (
            expected_mz - self.mz_half_width,
            expected_mz + self.mz_half_width,
        )
    }

    #[inline]
    pub fn mz_matches(&self, expected_mz: f64, observed_mz: f64) -> bool {
        (observed_mz - expected_mz).abs() <= self.mz_half_width
    }

    #[inline]
    pub fn rt_matches(&self, observed_rt: f32) -> bool {
        self.rt_tolerance.contains(self.rt, observed_rt)
    }

    /// Mobility is only compared when a tolerance is configured and both
    /// the seed and the candidate carry a mobility value.
    #[inline]
    pub fn mobility_matches(&self, observed: Option<f32>) -> bool {
        match (self.mobility, observed) {
            (Some((reference, tol)), Some(observed)) => tol.contains(reference, observed),
            _ => true,
        }
    }

    pub fn accepts(&self, expected_mz: f64, candidate: &Feature) -> bool {
        self.mz_matches(expected_mz, candidate.mz)
            && self.rt_matches(candidate.rt)
            && self.mobility_matches(candidate.mobility)
    }
}
