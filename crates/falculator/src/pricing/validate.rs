use super::{
    LegacyPricingRecord, PricingRecord, PricingRecordV2, PricingUnit, Resolution, SchemaVersion,
};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;

/// Structural problems that make a model output unusable under the contract it
/// was requested with.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Extraction result is not a JSON object")]
    NotAnObject,

    #[error("Missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Unknown pricing unit: {0}")]
    UnknownPricingUnit(String),

    #[error("Field `{field}` must be a non-negative number, got {value}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("Field `{field}` has an unexpected type: {value}")]
    InvalidType { field: &'static str, value: String },
}

/// A silent fix applied to an otherwise acceptable extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum Correction {
    ZeroedFreeCost { original: f64 },
    ClearedGpuType { original: String },
    DroppedResolution { entry: Value, reason: &'static str },
}

impl Correction {
    pub fn kind(&self) -> &'static str {
        match self {
            Correction::ZeroedFreeCost { .. } => "zeroed_free_cost",
            Correction::ClearedGpuType { .. } => "cleared_gpu_type",
            Correction::DroppedResolution { .. } => "dropped_resolution",
        }
    }
}

impl fmt::Display for Correction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Correction::ZeroedFreeCost { original } => {
                write!(f, "FREE pricing reported base_cost {}, set to 0", original)
            }
            Correction::ClearedGpuType { original } => {
                write!(f, "gpu_type {:?} only applies to PER_SECOND_GPU, cleared", original)
            }
            Correction::DroppedResolution { entry, reason } => {
                write!(f, "dropped resolution {} ({})", entry, reason)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Validated {
    pub record: PricingRecord,
    pub corrections: Vec<Correction>,
}

pub fn validate(raw: &Map<String, Value>, version: SchemaVersion) -> Result<Validated, ValidationError> {
    match version {
        SchemaVersion::V1 => validate_legacy(raw).map(|record| Validated {
            record: PricingRecord::V1(record),
            corrections: Vec::new(),
        }),
        SchemaVersion::V2 => {
            validate_v2(raw).map(|(record, corrections)| Validated {
                record: PricingRecord::V2(record),
                corrections,
            })
        }
    }
}

fn non_negative_number(raw: &Map<String, Value>, field: &'static str) -> Result<f64, ValidationError> {
    let value = raw.get(field).ok_or(ValidationError::MissingField(field))?;
    match value.as_f64() {
        Some(number) if number.is_finite() && number >= 0.0 => Ok(number),
        _ => Err(ValidationError::InvalidNumber {
            field,
            value: value.to_string(),
        }),
    }
}

fn validate_legacy(raw: &Map<String, Value>) -> Result<LegacyPricingRecord, ValidationError> {
    let cost_per_image = non_negative_number(raw, "cost_per_image")?;
    let runs_per_dollar = non_negative_number(raw, "runs_per_dollar")?;
    Ok(LegacyPricingRecord {
        cost_per_image,
        runs_per_dollar: runs_per_dollar.floor() as u64,
    })
}

fn validate_v2(
    raw: &Map<String, Value>,
) -> Result<(PricingRecordV2, Vec<Correction>), ValidationError> {
    let mut corrections = Vec::new();

    let pricing_unit = match raw.get("pricing_unit") {
        Some(Value::String(unit)) => unit.parse::<PricingUnit>()?,
        Some(other) => return Err(ValidationError::UnknownPricingUnit(other.to_string())),
        None => return Err(ValidationError::MissingField("pricing_unit")),
    };

    let mut base_cost = non_negative_number(raw, "base_cost")?;
    if pricing_unit == PricingUnit::Free && base_cost != 0.0 {
        corrections.push(Correction::ZeroedFreeCost {
            original: base_cost,
        });
        base_cost = 0.0;
    }

    let mut gpu_type = match raw.get("gpu_type") {
        None | Some(Value::Null) => None,
        Some(Value::String(gpu)) => Some(gpu.clone()),
        Some(other) => {
            return Err(ValidationError::InvalidType {
                field: "gpu_type",
                value: other.to_string(),
            })
        }
    };
    if pricing_unit != PricingUnit::PerSecondGpu {
        if let Some(original) = gpu_type.take() {
            corrections.push(Correction::ClearedGpuType { original });
        }
    }

    let resolutions = match raw.get("resolutions") {
        None | Some(Value::Null) => None,
        Some(Value::Array(entries)) => {
            let kept: Vec<Resolution> = entries
                .iter()
                .filter_map(|entry| match parse_resolution(entry) {
                    Ok(resolution) => Some(resolution),
                    Err(reason) => {
                        corrections.push(Correction::DroppedResolution {
                            entry: entry.clone(),
                            reason,
                        });
                        None
                    }
                })
                .collect();
            if kept.is_empty() {
                None
            } else {
                Some(kept)
            }
        }
        Some(other) => {
            return Err(ValidationError::InvalidType {
                field: "resolutions",
                value: other.to_string(),
            })
        }
    };

    Ok((
        PricingRecordV2 {
            pricing_unit,
            base_cost,
            gpu_type,
            resolutions,
        },
        corrections,
    ))
}

fn dimension(entry: &Map<String, Value>, field: &str) -> Result<u32, &'static str> {
    let value = entry
        .get(field)
        .and_then(Value::as_f64)
        .ok_or("dimension is not a number")?;
    if value < 0.0 {
        return Err("negative dimension");
    }
    if value.fract() != 0.0 || value > f64::from(u32::MAX) {
        return Err("dimension is not a whole pixel count");
    }
    Ok(value as u32)
}

fn parse_resolution(entry: &Value) -> Result<Resolution, &'static str> {
    let entry = entry.as_object().ok_or("entry is not an object")?;
    let name = entry
        .get("name")
        .and_then(Value::as_str)
        .ok_or("missing name")?;
    let width = dimension(entry, "width")?;
    let height = dimension(entry, "height")?;
    Ok(Resolution::new(name, width, height))
}
