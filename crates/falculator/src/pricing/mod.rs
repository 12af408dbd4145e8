//! Normalized pricing records and the rules that produce them.
//!
//! A record comes in one of two shapes, told apart by the `schema_version`
//! discriminant: the flat legacy shape (`v1`) and the richer unit-based shape
//! (`v2`). Everything downstream matches on [`PricingRecord`] rather than
//! probing for fields.

pub mod cost;
pub mod validate;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

pub use cost::{CostBreakdown, ResolutionCost, RunsPerDollar};
pub use validate::{Correction, Validated, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaVersion {
    #[serde(rename = "v1")]
    V1,
    #[serde(rename = "v2")]
    V2,
}

impl SchemaVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVersion::V1 => "v1",
            SchemaVersion::V2 => "v2",
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The billing dimension a model charges by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PricingUnit {
    PerMegapixel,
    PerImage,
    PerSecondVideo,
    PerVideo,
    PerSecondGpu,
    Free,
    Unknown,
}

impl PricingUnit {
    pub const ALL: [PricingUnit; 7] = [
        PricingUnit::PerMegapixel,
        PricingUnit::PerImage,
        PricingUnit::PerSecondVideo,
        PricingUnit::PerVideo,
        PricingUnit::PerSecondGpu,
        PricingUnit::Free,
        PricingUnit::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PricingUnit::PerMegapixel => "PER_MEGAPIXEL",
            PricingUnit::PerImage => "PER_IMAGE",
            PricingUnit::PerSecondVideo => "PER_SECOND_VIDEO",
            PricingUnit::PerVideo => "PER_VIDEO",
            PricingUnit::PerSecondGpu => "PER_SECOND_GPU",
            PricingUnit::Free => "FREE",
            PricingUnit::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for PricingUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PricingUnit {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PricingUnit::ALL
            .iter()
            .copied()
            .find(|unit| unit.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownPricingUnit(s.to_string()))
    }
}

/// An output size offered on the pricing page. `0x0` is the sentinel for
/// "default / unspecified" and never shows up in cost tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl Resolution {
    pub fn new(name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            name: name.into(),
            width,
            height,
        }
    }

    pub fn is_sentinel(&self) -> bool {
        self.width == 0 && self.height == 0
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// The flat two-field shape produced by the legacy contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyPricingRecord {
    pub cost_per_image: f64,
    pub runs_per_dollar: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRecordV2 {
    pub pricing_unit: PricingUnit,
    pub base_cost: f64,
    pub gpu_type: Option<String>,
    pub resolutions: Option<Vec<Resolution>>,
}

impl PricingRecordV2 {
    pub fn new(pricing_unit: PricingUnit, base_cost: f64) -> Self {
        Self {
            pricing_unit,
            base_cost,
            gpu_type: None,
            resolutions: None,
        }
    }

    pub fn with_gpu_type(mut self, gpu_type: impl Into<String>) -> Self {
        self.gpu_type = Some(gpu_type.into());
        self
    }

    pub fn with_resolutions(mut self, resolutions: Vec<Resolution>) -> Self {
        self.resolutions = Some(resolutions);
        self
    }

    /// Resolutions that describe a concrete size.
    pub fn sized_resolutions(&self) -> impl Iterator<Item = &Resolution> {
        self.resolutions
            .iter()
            .flatten()
            .filter(|resolution| !resolution.is_sentinel())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "schema_version")]
pub enum PricingRecord {
    #[serde(rename = "v1")]
    V1(LegacyPricingRecord),
    #[serde(rename = "v2")]
    V2(PricingRecordV2),
}

impl PricingRecord {
    pub fn schema_version(&self) -> SchemaVersion {
        match self {
            PricingRecord::V1(_) => SchemaVersion::V1,
            PricingRecord::V2(_) => SchemaVersion::V2,
        }
    }

    /// Validate and normalize a raw model output extracted under `version`.
    pub fn validate_from(raw: &Value, version: SchemaVersion) -> Result<Validated, ValidationError> {
        let object = raw.as_object().ok_or(ValidationError::NotAnObject)?;
        validate::validate(object, version)
    }

    /// Headline cost for a single run, without picking a resolution.
    pub fn cost_per_image(&self) -> f64 {
        match self {
            PricingRecord::V1(legacy) => legacy.cost_per_image,
            PricingRecord::V2(record) => cost::cost_per_image(record, None),
        }
    }

    /// Legacy records carry the figure read off the page; v2 records derive it.
    pub fn runs_per_dollar(&self) -> RunsPerDollar {
        match self {
            PricingRecord::V1(legacy) => RunsPerDollar::Runs(legacy.runs_per_dollar),
            PricingRecord::V2(record) => cost::runs_per_dollar(cost::cost_per_image(record, None)),
        }
    }

    pub fn cost_summary(&self) -> CostSummary {
        CostSummary {
            cost_per_image: self.cost_per_image(),
            runs_per_dollar: self.runs_per_dollar(),
        }
    }
}

/// Headline figures for a record, independent of schema version.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CostSummary {
    pub cost_per_image: f64,
    pub runs_per_dollar: RunsPerDollar,
}

impl From<LegacyPricingRecord> for PricingRecord {
    fn from(record: LegacyPricingRecord) -> Self {
        PricingRecord::V1(record)
    }
}

impl From<PricingRecordV2> for PricingRecord {
    fn from(record: PricingRecordV2) -> Self {
        PricingRecord::V2(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_record_serializes_with_version_tag() {
        let record = PricingRecord::V2(
            PricingRecordV2::new(PricingUnit::PerMegapixel, 0.005)
                .with_resolutions(vec![Resolution::new("Square HD", 1024, 1024)]),
        );
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(
            value,
            json!({
                "schema_version": "v2",
                "pricing_unit": "PER_MEGAPIXEL",
                "base_cost": 0.005,
                "gpu_type": null,
                "resolutions": [{"name": "Square HD", "width": 1024, "height": 1024}]
            })
        );

        let legacy = PricingRecord::V1(LegacyPricingRecord {
            cost_per_image: 0.039,
            runs_per_dollar: 25,
        });
        let value = serde_json::to_value(&legacy).unwrap();
        assert_eq!(value["schema_version"], "v1");
        assert_eq!(value["runs_per_dollar"], 25);
    }

    #[test]
    fn test_record_deserializes_by_tag() {
        let record: PricingRecord = serde_json::from_value(json!({
            "schema_version": "v1",
            "cost_per_image": 0.5,
            "runs_per_dollar": 2
        }))
        .unwrap();
        assert_eq!(record.schema_version(), SchemaVersion::V1);
        assert_eq!(record.runs_per_dollar(), RunsPerDollar::Runs(2));
    }

    #[test]
    fn test_cost_summary_for_both_versions() {
        let legacy = PricingRecord::V1(LegacyPricingRecord {
            cost_per_image: 0.039,
            runs_per_dollar: 25,
        });
        assert_eq!(
            legacy.cost_summary(),
            CostSummary {
                cost_per_image: 0.039,
                runs_per_dollar: RunsPerDollar::Runs(25),
            }
        );

        let free = PricingRecord::V2(PricingRecordV2::new(PricingUnit::Free, 0.0));
        assert_eq!(free.cost_summary().runs_per_dollar, RunsPerDollar::Unlimited);
    }

    #[test]
    fn test_pricing_unit_parsing() {
        for unit in PricingUnit::ALL {
            assert_eq!(unit.as_str().parse::<PricingUnit>().unwrap(), unit);
        }
        assert!(matches!(
            "PER_TOKEN".parse::<PricingUnit>(),
            Err(ValidationError::UnknownPricingUnit(value)) if value == "PER_TOKEN"
        ));
    }

    #[test]
    fn test_sized_resolutions_skip_sentinel() {
        let record = PricingRecordV2::new(PricingUnit::PerMegapixel, 0.01).with_resolutions(vec![
            Resolution::new("Default", 0, 0),
            Resolution::new("Landscape", 1280, 720),
        ]);
        let names: Vec<_> = record.sized_resolutions().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Landscape"]);
    }
}
