//! Cost arithmetic over normalized records. Everything here is pure.

use super::{PricingRecord, PricingRecordV2, PricingUnit, Resolution};
use serde::{Serialize, Serializer};
use std::fmt;

pub const DEFAULT_BUDGET: f64 = 10.0;

/// How many runs a budget buys. `Unlimited` stands in for a free model so
/// callers never divide by zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunsPerDollar {
    Runs(u64),
    Unlimited,
}

impl fmt::Display for RunsPerDollar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunsPerDollar::Runs(runs) => f.pad(&runs.to_string()),
            RunsPerDollar::Unlimited => f.pad("∞"),
        }
    }
}

impl Serialize for RunsPerDollar {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            RunsPerDollar::Runs(runs) => serializer.serialize_u64(*runs),
            RunsPerDollar::Unlimited => serializer.serialize_str("Infinity"),
        }
    }
}

pub fn megapixels(width: u32, height: u32) -> f64 {
    (f64::from(width) * f64::from(height)) / 1_000_000.0
}

/// Cost of a single run at the given size. Only per-megapixel pricing depends
/// on the size; every other unit passes `base_cost` through.
pub fn cost_per_image(record: &PricingRecordV2, dimensions: Option<(u32, u32)>) -> f64 {
    match (record.pricing_unit, dimensions) {
        (PricingUnit::PerMegapixel, Some((width, height))) if width > 0 && height > 0 => {
            record.base_cost * megapixels(width, height)
        }
        (PricingUnit::Free, _) => 0.0,
        _ => record.base_cost,
    }
}

pub fn runs_per_dollar(cost_per_image: f64) -> RunsPerDollar {
    runs_for_budget(cost_per_image, 1.0)
}

pub fn runs_for_budget(cost_per_image: f64, budget: f64) -> RunsPerDollar {
    if !cost_per_image.is_finite() || cost_per_image <= 0.0 {
        return RunsPerDollar::Unlimited;
    }
    let runs = (budget / cost_per_image).floor();
    if runs <= 0.0 {
        RunsPerDollar::Runs(0)
    } else {
        RunsPerDollar::Runs(runs as u64)
    }
}

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        let remainder = a % b;
        a = b;
        b = remainder;
    }
    a
}

/// Reduced width:height ratio. `None` for a zero dimension, which means the
/// caller forgot to drop the sentinel resolution.
pub fn aspect_ratio(width: u32, height: u32) -> Option<(u32, u32)> {
    if width == 0 || height == 0 {
        return None;
    }
    let divisor = gcd(width, height);
    Some((width / divisor, height / divisor))
}

/// Dollar amount the way the results card shows it: four decimals below a
/// cent, two otherwise.
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("${:.4}", cost)
    } else {
        format!("${:.2}", cost)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolutionCost {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub megapixels: f64,
    pub aspect_ratio: (u32, u32),
    pub cost_per_image: f64,
    pub runs_per_dollar: RunsPerDollar,
}

impl ResolutionCost {
    fn for_resolution(record: &PricingRecordV2, resolution: &Resolution) -> Option<Self> {
        let aspect_ratio = aspect_ratio(resolution.width, resolution.height)?;
        let cost = cost_per_image(record, Some(resolution.dimensions()));
        Some(Self {
            name: resolution.name.clone(),
            width: resolution.width,
            height: resolution.height,
            megapixels: megapixels(resolution.width, resolution.height),
            aspect_ratio,
            cost_per_image: cost,
            runs_per_dollar: runs_per_dollar(cost),
        })
    }
}

/// One row per concrete resolution. Sentinel entries never reach
/// [`aspect_ratio`].
pub fn resolution_breakdown(record: &PricingRecordV2) -> Vec<ResolutionCost> {
    record
        .sized_resolutions()
        .filter_map(|resolution| ResolutionCost::for_resolution(record, resolution))
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub cost_per_image: f64,
    pub formatted_cost: String,
    pub runs_per_dollar: RunsPerDollar,
    pub budget: f64,
    pub runs_for_budget: RunsPerDollar,
    pub resolutions: Vec<ResolutionCost>,
}

impl CostBreakdown {
    pub fn new(record: &PricingRecord, budget: f64) -> Self {
        let cost = record.cost_per_image();
        let resolutions = match record {
            PricingRecord::V1(_) => Vec::new(),
            PricingRecord::V2(record) => resolution_breakdown(record),
        };
        let runs_for_budget = match record {
            // The page already told us the integer runs per dollar; scale it
            // like the original results card does.
            PricingRecord::V1(legacy) => {
                RunsPerDollar::Runs((legacy.runs_per_dollar as f64 * budget).floor() as u64)
            }
            PricingRecord::V2(_) => runs_for_budget(cost, budget),
        };
        Self {
            cost_per_image: cost,
            formatted_cost: format_cost(cost),
            runs_per_dollar: record.runs_per_dollar(),
            budget,
            runs_for_budget,
            resolutions,
        }
    }
}
