use anyhow::{Context, Result};
use falculator::extraction::{CallerIdentity, Extraction, ExtractionRequest, Extractor};
use falculator::image::ImagePayload;
use falculator::pricing::cost::{format_cost, CostBreakdown};
use falculator::providers::ProviderKind;
use falculator::rate_limit::RateLimiter;
use falculator_server::configuration::Settings;
use falculator_server::logging::setup_logging;
use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

pub struct ExtractArgs<'a> {
    pub path: &'a Path,
    pub api_key: Option<String>,
    pub provider: Option<ProviderKind>,
    pub budget: f64,
    pub config: Option<&'a Path>,
}

pub async fn run(args: ExtractArgs<'_>) -> Result<()> {
    let settings = Settings::load(args.config)?;
    setup_logging(settings.log_format, settings.log_dir.as_deref())?;

    let bytes = std::fs::read(args.path)
        .with_context(|| format!("failed to read {}", args.path.display()))?;
    let image = ImagePayload::from_bytes(&bytes, settings.extractor.max_image_bytes)?;

    // A local caller has no shared quota to protect.
    let limiter = Arc::new(RateLimiter::new(
        u32::MAX,
        settings.extractor.rate_limit.window(),
    ));
    let extractor = Extractor::new(settings.extractor, limiter)?;

    let request = ExtractionRequest::new(image)
        .with_credential(args.api_key)
        .with_provider(args.provider)
        .with_caller(CallerIdentity::new("cli"));

    let extraction = extractor
        .run(&request)
        .await
        .map_err(|e| anyhow::anyhow!(e.user_message()).context(e.to_string()))?;

    println!("{}", serde_json::to_string_pretty(&extraction.record)?);
    eprint!("{}", render_report(&extraction, args.budget));
    Ok(())
}

fn render_report(extraction: &Extraction, budget: f64) -> String {
    let breakdown = CostBreakdown::new(&extraction.record, budget);
    let mut out = String::new();

    let _ = writeln!(
        out,
        "\nExtracted by {} ({}) in {} call(s)",
        extraction.provider, extraction.model, extraction.attempts
    );
    for correction in &extraction.corrections {
        let _ = writeln!(out, "  corrected: {}", correction);
    }

    let _ = writeln!(out, "Cost per image: {}", breakdown.formatted_cost);
    let _ = writeln!(out, "Runs per $1:    {}", breakdown.runs_per_dollar);
    let _ = writeln!(
        out,
        "Runs for {}: {}",
        format_cost(breakdown.budget),
        breakdown.runs_for_budget
    );

    if !breakdown.resolutions.is_empty() {
        let _ = writeln!(
            out,
            "\n{:<20} {:>11} {:>8} {:>7} {:>10} {:>8}",
            "Resolution", "Size", "MP", "Ratio", "Cost", "Runs/$"
        );
        for row in &breakdown.resolutions {
            let _ = writeln!(
                out,
                "{:<20} {:>11} {:>8.2} {:>7} {:>10} {:>8}",
                row.name,
                format!("{}x{}", row.width, row.height),
                row.megapixels,
                format!("{}:{}", row.aspect_ratio.0, row.aspect_ratio.1),
                format_cost(row.cost_per_image),
                row.runs_per_dollar
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use falculator::pricing::{PricingRecord, PricingRecordV2, PricingUnit, Resolution};

    #[test]
    fn test_report_lists_sized_resolutions_only() {
        let record = PricingRecord::V2(
            PricingRecordV2::new(PricingUnit::PerMegapixel, 0.0078125).with_resolutions(vec![
                Resolution::new("Default", 0, 0),
                Resolution::new("Square HD", 1024, 1024),
                Resolution::new("Landscape", 1920, 1080),
            ]),
        );
        let extraction = Extraction {
            record,
            corrections: vec![],
            provider: "google".to_string(),
            model: "gemini-2.0-flash".to_string(),
            attempts: 1,
        };

        let report = render_report(&extraction, 10.0);
        assert!(report.contains("Runs for $10.00: 1280"));
        assert!(report.contains("1:1"));
        assert!(report.contains("16:9"));
        assert!(!report.contains("Default"));
    }
}
