use std::{error::Error, fmt::Display, num::ParseFloatError, str::FromStr};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use mzisogroup::{MobilityType, MzTolerance, RepresentativeIsotope};

/// An m/z tolerance written as `ABS:PPM`, where either part may carry an `mz` or
/// `ppm` unit suffix, e.g. `0.003:10` or `0.003mz:10ppm`. A single value is taken
/// as the absolute part with no relative part.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ArgMzTolerance(pub MzTolerance);

impl Default for ArgMzTolerance {
    fn default() -> Self {
        Self(MzTolerance::default())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MzToleranceParseError {
    MalformedAbsolute(ParseFloatError),
    MalformedPPM(ParseFloatError),
    Negative(String),
}

impl Display for MzToleranceParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MzToleranceParseError::MalformedAbsolute(e) => {
                write!(f, "Failed to parse m/z tolerance absolute part {e}")
            }
            MzToleranceParseError::MalformedPPM(e) => {
                write!(f, "Failed to parse m/z tolerance ppm part {e}")
            }
            MzToleranceParseError::Negative(s) => {
                write!(f, "m/z tolerance `{s}` must not be negative")
            }
        }
    }
}

impl Error for MzToleranceParseError {}

impl FromStr for ArgMzTolerance {
    type Err = MzToleranceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut tokens = s.trim().splitn(2, ':');
        let abs_s = tokens.next().unwrap_or_default().trim();
        let abs_s = abs_s.strip_suffix("mz").unwrap_or(abs_s);
        let absolute: f64 = abs_s
            .parse()
            .map_err(MzToleranceParseError::MalformedAbsolute)?;
        let ppm = match tokens.next() {
            Some(ppm_s) => {
                let ppm_s = ppm_s.trim();
                let ppm_s = ppm_s.strip_suffix("ppm").unwrap_or(ppm_s);
                ppm_s.parse().map_err(MzToleranceParseError::MalformedPPM)?
            }
            None => 0.0,
        };
        let tol = MzTolerance::new(absolute, ppm);
        if !tol.is_valid() {
            return Err(MzToleranceParseError::Negative(s.to_string()));
        }
        Ok(Self(tol))
    }
}

impl TryFrom<String> for ArgMzTolerance {
    type Error = MzToleranceParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ArgMzTolerance> for String {
    fn from(value: ArgMzTolerance) -> Self {
        value.to_string()
    }
}

impl Display for ArgMzTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.0.absolute, self.0.ppm)
    }
}

impl From<ArgMzTolerance> for MzTolerance {
    fn from(value: ArgMzTolerance) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgRepresentative {
    #[default]
    /// Keep the most intense feature of each group
    MostIntense,
    /// Keep the lowest m/z feature of each group
    LowestMz,
}

impl Display for ArgRepresentative {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<ArgRepresentative> for RepresentativeIsotope {
    fn from(value: ArgRepresentative) -> Self {
        match value {
            ArgRepresentative::MostIntense => RepresentativeIsotope::MostIntense,
            ArgRepresentative::LowestMz => RepresentativeIsotope::LowestMz,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArgMobilityType {
    /// Trapped ion mobility, reported as 1/K0
    Tims,
    /// Drift tube ion mobility, reported as drift time
    DriftTube,
    /// Travelling wave ion mobility, reported as drift time
    TravellingWave,
}

impl From<ArgMobilityType> for MobilityType {
    fn from(value: ArgMobilityType) -> Self {
        match value {
            ArgMobilityType::Tims => MobilityType::Tims,
            ArgMobilityType::DriftTube => MobilityType::DriftTube,
            ArgMobilityType::TravellingWave => MobilityType::TravellingWave,
        }
    }
}

impl Display for ArgMobilityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub(crate) fn non_negative_float_f32(s: &str) -> Result<f32, String> {
    let value = s.parse::<f32>().map_err(|e| e.to_string())?;
    if value < 0.0 {
        Err(format!("`{s}` is less than zero"))
    } else {
        Ok(value)
    }
}
