/*! The feature list data model the isotope grouper consumes and annotates */
use std::cmp::Ordering;
use std::fmt::Display;

use mzpeaks::peak::MZPoint;
use mzpeaks::{CoordinateLike, IntensityMeasurement, MZ};

/// Where an [`IsotopePattern`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsotopePatternStatus {
    /// Assembled from observed features by a grouping algorithm
    #[default]
    Detected,
    /// Computed from a chemical formula by an earlier stage
    Predicted,
}

impl Display for IsotopePatternStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IsotopePatternStatus::Detected => write!(f, "detected"),
            IsotopePatternStatus::Predicted => write!(f, "predicted"),
        }
    }
}

/// A consolidated isotopic pattern, a sequence of m/z and intensity pairs sorted
/// by ascending m/z, tagged with the charge state it was detected under.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IsotopePattern {
    pub peaks: Vec<MZPoint>,
    pub charge: i32,
    pub status: IsotopePatternStatus,
    pub description: String,
}

impl IsotopePattern {
    pub fn new(
        mut peaks: Vec<MZPoint>,
        charge: i32,
        status: IsotopePatternStatus,
        description: String,
    ) -> Self {
        peaks.sort_by(|a, b| a.mz.total_cmp(&b.mz));
        Self {
            peaks,
            charge,
            status,
            description,
        }
    }

    /// Build a detected pattern from anything with an m/z coordinate and an intensity.
    pub fn from_members<'a, P, I>(members: I, charge: i32, description: String) -> Self
    where
        P: CoordinateLike<MZ> + IntensityMeasurement + 'a,
        I: IntoIterator<Item = &'a P>,
    {
        let peaks = members
            .into_iter()
            .map(|p| MZPoint::new(p.coordinate(), p.intensity()))
            .collect();
        Self::new(peaks, charge, IsotopePatternStatus::Detected, description)
    }

    pub fn len(&self) -> usize {
        self.peaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peaks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MZPoint> {
        self.peaks.iter()
    }

    pub fn total_intensity(&self) -> f32 {
        self.peaks.iter().map(|p| p.intensity).sum()
    }

    /// The most intense point of the pattern
    pub fn base_peak(&self) -> Option<&MZPoint> {
        self.peaks
            .iter()
            .max_by(|a, b| a.intensity.total_cmp(&b.intensity))
    }

    pub fn lowest_mz(&self) -> Option<f64> {
        self.peaks.first().map(|p| p.mz)
    }

    pub fn highest_mz(&self) -> Option<f64> {
        self.peaks.last().map(|p| p.mz)
    }
}

/// A chromatographic feature detected in a single raw data file.
///
/// Features are owned by the caller. The grouper only ever writes `charge` and
/// `isotope_pattern`, and only for features chosen to represent a group.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feature {
    pub id: u32,
    pub mz: f64,
    pub rt: f32,
    pub mobility: Option<f32>,
    pub height: f32,
    /// The assigned charge state, 0 when unknown
    pub charge: i32,
    pub isotope_pattern: Option<IsotopePattern>,
    /// Whether any fragmentation spectra were acquired for this feature
    pub has_ms2: bool,
}

impl Feature {
    pub fn new(id: u32, mz: f64, rt: f32, height: f32) -> Self {
        Self {
            id,
            mz,
            rt,
            height,
            ..Default::default()
        }
    }

    pub fn with_mobility(mut self, mobility: f32) -> Self {
        self.mobility = Some(mobility);
        self
    }

    pub fn with_ms2(mut self, has_ms2: bool) -> Self {
        self.has_ms2 = has_ms2;
        self
    }

    pub fn with_isotope_pattern(mut self, pattern: IsotopePattern) -> Self {
        self.charge = pattern.charge;
        self.isotope_pattern = Some(pattern);
        self
    }

    pub fn has_isotope_pattern(&self) -> bool {
        self.isotope_pattern.is_some()
    }
}

impl Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} m/z {:0.4} RT {:0.2}", self.id, self.mz, self.rt)?;
        if let Some(mobility) = self.mobility {
            write!(f, " mobility {mobility:0.4}")?;
        }
        Ok(())
    }
}

/// Features order by m/z, then RT, then id. Distinct features that agree on all three
/// are incomparable, keeping `Some(Equal)` reserved for `==`.
impl PartialOrd for Feature {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self == other {
            return Some(Ordering::Equal);
        }
        let ord = self
            .mz
            .total_cmp(&other.mz)
            .then_with(|| self.rt.total_cmp(&other.rt))
            .then_with(|| self.id.cmp(&other.id));
        match ord {
            Ordering::Equal => None,
            ord => Some(ord),
        }
    }
}

impl CoordinateLike<MZ> for Feature {
    fn coordinate(&self) -> f64 {
        self.mz
    }
}

impl IntensityMeasurement for Feature {
    fn intensity(&self) -> f32 {
        self.height
    }
}

/// A record of a processing step applied to a [`FeatureList`]
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AppliedMethod {
    pub name: String,
    pub parameters: Vec<(String, String)>,
}

impl AppliedMethod {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
        }
    }

    pub fn add_param(&mut self, key: impl Into<String>, value: impl ToString) {
        self.parameters.push((key.into(), value.to_string()));
    }

    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// A named collection of features and the raw data sources they were detected in
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureList {
    pub name: String,
    pub raw_data_sources: Vec<String>,
    pub features: Vec<Feature>,
    pub applied_methods: Vec<AppliedMethod>,
}

impl FeatureList {
    pub fn new(
        name: impl Into<String>,
        raw_data_source: impl Into<String>,
        features: Vec<Feature>,
    ) -> Self {
        Self {
            name: name.into(),
            raw_data_sources: vec![raw_data_source.into()],
            features,
            applied_methods: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    pub fn get_by_id(&self, id: u32) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_pattern_sorted() {
        let members = vec![
            Feature::new(2, 101.0033, 5.0, 300.0),
            Feature::new(1, 100.0, 5.0, 1000.0),
            Feature::new(3, 102.0066, 5.0, 90.0),
        ];
        let pattern = IsotopePattern::from_members(members.iter(), 1, "test".to_string());
        assert_eq!(pattern.len(), 3);
        assert_eq!(pattern.lowest_mz(), Some(100.0));
        assert_eq!(pattern.highest_mz(), Some(102.0066));
        assert_eq!(pattern.base_peak().unwrap().intensity, 1000.0);
        assert_eq!(pattern.status, IsotopePatternStatus::Detected);
        assert!((pattern.total_intensity() - 1390.0).abs() < 1e-3);
    }

    #[test]
    fn test_feature_display() {
        let f = Feature::new(7, 500.25, 12.5, 10.0).with_mobility(0.85);
        assert_eq!(f.to_string(), "#7 m/z 500.2500 RT 12.50 mobility 0.8500");
    }

    #[test]
    fn test_ordering_agrees_with_equality() {
        let a = Feature::new(1, 100.0, 5.0, 10.0);
        let b = Feature::new(2, 100.0, 5.0, 10.0);
        assert_ne!(a, b);
        assert_eq!(a.partial_cmp(&b), Some(Ordering::Less));
        assert_eq!(b.partial_cmp(&a), Some(Ordering::Greater));
        assert_eq!(a.partial_cmp(&a.clone()), Some(Ordering::Equal));

        let c = a.clone().with_ms2(true);
        assert_ne!(a, c);
        assert_eq!(a.partial_cmp(&c), None);

        let d = Feature::new(3, 99.5, 9.0, 10.0);
        assert!(d < a);
    }
}
