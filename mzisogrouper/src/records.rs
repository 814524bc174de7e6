//! The JSON interchange format for feature lists.
//!
//! A document holds any number of feature lists, each of which is grouped
//! independently.
use serde::{Deserialize, Serialize};

use mzpeaks::peak::MZPoint;

use mzisogroup::{AppliedMethod, Feature, FeatureList, IsotopePattern, IsotopePatternStatus};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureListDocument {
    pub feature_lists: Vec<FeatureListRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureListRecord {
    pub name: String,
    pub raw_data_sources: Vec<String>,
    pub features: Vec<FeatureRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub applied_methods: Vec<AppliedMethodRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    pub id: u32,
    pub mz: f64,
    pub rt: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobility: Option<f32>,
    pub height: f32,
    #[serde(default)]
    pub charge: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isotope_pattern: Option<IsotopePatternRecord>,
    #[serde(default)]
    pub has_ms2: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternStatusRecord {
    #[default]
    Detected,
    Predicted,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub mz: f64,
    pub intensity: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IsotopePatternRecord {
    pub charge: i32,
    #[serde(default)]
    pub status: PatternStatusRecord,
    #[serde(default)]
    pub description: String,
    pub peaks: Vec<PointRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppliedMethodRecord {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterRecord>,
}

impl From<PatternStatusRecord> for IsotopePatternStatus {
    fn from(value: PatternStatusRecord) -> Self {
        match value {
            PatternStatusRecord::Detected => IsotopePatternStatus::Detected,
            PatternStatusRecord::Predicted => IsotopePatternStatus::Predicted,
        }
    }
}

impl From<IsotopePatternStatus> for PatternStatusRecord {
    fn from(value: IsotopePatternStatus) -> Self {
        match value {
            IsotopePatternStatus::Detected => PatternStatusRecord::Detected,
            IsotopePatternStatus::Predicted => PatternStatusRecord::Predicted,
        }
    }
}

impl From<IsotopePatternRecord> for IsotopePattern {
    fn from(value: IsotopePatternRecord) -> Self {
        IsotopePattern::new(
            value
                .peaks
                .into_iter()
                .map(|p| MZPoint::new(p.mz, p.intensity))
                .collect(),
            value.charge,
            value.status.into(),
            value.description,
        )
    }
}

impl From<&IsotopePattern> for IsotopePatternRecord {
    fn from(value: &IsotopePattern) -> Self {
        Self {
            charge: value.charge,
            status: value.status.into(),
            description: value.description.clone(),
            peaks: value
                .iter()
                .map(|p| PointRecord {
                    mz: p.mz,
                    intensity: p.intensity,
                })
                .collect(),
        }
    }
}

impl From<FeatureRecord> for Feature {
    fn from(value: FeatureRecord) -> Self {
        Feature {
            id: value.id,
            mz: value.mz,
            rt: value.rt,
            mobility: value.mobility,
            height: value.height,
            charge: value.charge,
            isotope_pattern: value.isotope_pattern.map(IsotopePattern::from),
            has_ms2: value.has_ms2,
        }
    }
}

impl From<&Feature> for FeatureRecord {
    fn from(value: &Feature) -> Self {
        Self {
            id: value.id,
            mz: value.mz,
            rt: value.rt,
            mobility: value.mobility,
            height: value.height,
            charge: value.charge,
            isotope_pattern: value.isotope_pattern.as_ref().map(IsotopePatternRecord::from),
            has_ms2: value.has_ms2,
        }
    }
}

impl From<AppliedMethodRecord> for AppliedMethod {
    fn from(value: AppliedMethodRecord) -> Self {
        let mut method = AppliedMethod::new(value.name);
        for param in value.parameters {
            method.add_param(param.name, param.value);
        }
        method
    }
}

impl From<&AppliedMethod> for AppliedMethodRecord {
    fn from(value: &AppliedMethod) -> Self {
        Self {
            name: value.name.clone(),
            parameters: value
                .parameters
                .iter()
                .map(|(name, value)| ParameterRecord {
                    name: name.clone(),
                    value: value.clone(),
                })
                .collect(),
        }
    }
}

impl From<FeatureListRecord> for FeatureList {
    fn from(value: FeatureListRecord) -> Self {
        FeatureList {
            name: value.name,
            raw_data_sources: value.raw_data_sources,
            features: value.features.into_iter().map(Feature::from).collect(),
            applied_methods: value
                .applied_methods
                .into_iter()
                .map(AppliedMethod::from)
                .collect(),
        }
    }
}

impl From<&FeatureList> for FeatureListRecord {
    fn from(value: &FeatureList) -> Self {
        Self {
            name: value.name.clone(),
            raw_data_sources: value.raw_data_sources.clone(),
            features: value.iter().map(FeatureRecord::from).collect(),
            applied_methods: value
                .applied_methods
                .iter()
                .map(AppliedMethodRecord::from)
                .collect(),
        }
    }
}
