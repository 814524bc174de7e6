use std::fmt::Display;

use crate::tolerance::{MobilityTolerance, MzTolerance, SearchTolerance};
use crate::traits::IsotopeGroupingError;

/// Which member of an isotopic group is kept to stand for the whole group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepresentativeIsotope {
    /// The member with the greatest height
    #[default]
    MostIntense,
    /// The member with the lowest m/z, the presumed monoisotopic peak
    LowestMz,
}

impl Display for RepresentativeIsotope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RepresentativeIsotope::MostIntense => write!(f, "most intense"),
            RepresentativeIsotope::LowestMz => write!(f, "lowest m/z"),
        }
    }
}

/// The parameters controlling a single isotope grouping run
#[derive(Debug, Clone, PartialEq)]
pub struct IsotopeGrouperParams {
    /// The highest charge state to try, charges `1..=max_charge` are all tested
    pub max_charge: i32,
    /// Only search towards increasing m/z from each seed
    pub monotonic_shape: bool,
    pub tolerance: SearchTolerance,
    pub representative: RepresentativeIsotope,
    /// Keep absorbed group members which have fragmentation spectra in the output
    pub keep_ms2_members: bool,
    /// Appended to the input feature list's name to name the output list
    pub suffix: String,
}

impl Default for IsotopeGrouperParams {
    fn default() -> Self {
        Self {
            max_charge: 2,
            monotonic_shape: true,
            tolerance: SearchTolerance::default(),
            representative: RepresentativeIsotope::MostIntense,
            keep_ms2_members: true,
            suffix: "deiso".to_string(),
        }
    }
}

impl IsotopeGrouperParams {
    pub fn new(
        max_charge: i32,
        monotonic_shape: bool,
        tolerance: SearchTolerance,
        representative: RepresentativeIsotope,
        keep_ms2_members: bool,
    ) -> Self {
        Self {
            max_charge,
            monotonic_shape,
            tolerance,
            representative,
            keep_ms2_members,
            ..Default::default()
        }
    }

    /// Check the parameters before any work is done with them
    pub fn validate(&self) -> Result<(), IsotopeGroupingError> {
        if self.max_charge < 1 {
            return Err(IsotopeGroupingError::InvalidMaximumCharge(self.max_charge));
        }
        if !self.tolerance.mz.is_valid() {
            return Err(IsotopeGroupingError::InvalidTolerance(format!(
                "m/z tolerance {}",
                self.tolerance.mz
            )));
        }
        if !self.tolerance.rt.is_valid() {
            return Err(IsotopeGroupingError::InvalidTolerance(format!(
                "RT tolerance {}",
                self.tolerance.rt
            )));
        }
        if let Some(mobility) = self.tolerance.mobility {
            if !mobility.is_valid() {
                return Err(IsotopeGroupingError::InvalidTolerance(format!(
                    "mobility tolerance {mobility}"
                )));
            }
        }
        Ok(())
    }

    pub fn mz_tolerance(&self) -> MzTolerance {
        self.tolerance.mz
    }

    pub fn mobility_tolerance(&self) -> Option<MobilityTolerance> {
        self.tolerance.mobility
    }
}
