//! The two extraction contracts a provider can be asked to fulfil.

use crate::pricing::{PricingUnit, SchemaVersion};
use indoc::indoc;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptContract {
    /// Unit-based extraction producing a v2 record.
    Rich,
    /// Two-field extraction producing a v1 record.
    Legacy,
}

const RICH_INSTRUCTIONS: &str = indoc! {r#"
    Analyze the attached screenshot of an AI model pricing page and extract how the model is billed.

    Return these fields:
    - pricing_unit: one of PER_MEGAPIXEL, PER_IMAGE, PER_SECOND_VIDEO, PER_VIDEO, PER_SECOND_GPU, FREE, UNKNOWN
    - base_cost: the cost in US dollars for one pricing unit, as a decimal number (e.g. 0.025)
    - gpu_type: the GPU name (e.g. "A100", "H100") only when pricing_unit is PER_SECOND_GPU, otherwise null
    - resolutions: the output sizes offered by the page as a list of {name, width, height}, otherwise null

    Decision rules:
    1. If the page lists resolution or image size options, use PER_MEGAPIXEL unless the text explicitly says otherwise.
    2. "per image", "per run" or "per generation" means PER_IMAGE.
    3. "per second" of output video means PER_SECOND_VIDEO; a flat price per clip means PER_VIDEO.
    4. "per second" of compute or hardware time means PER_SECOND_GPU; record the GPU in gpu_type.
    5. If the page states the model is free, use FREE with base_cost 0.
    6. If there is no cost text at all, use UNKNOWN with base_cost 0.
    7. Never guess. Every optional field that is not shown must be null, never omitted.
    8. A default or unspecified size is written as width 0 and height 0.
"#};

const LEGACY_INSTRUCTIONS: &str = indoc! {r#"
    Analyze the attached image which contains AI model pricing information.
    Extract the following information:
    1. cost_per_image: The cost per image/run in dollars (as a decimal number, e.g., 0.039)
    2. runs_per_dollar: The number of runs/images you can generate for $1.00 (as an integer)

    Look for text patterns like:
    - "$X.XX per image" or "costs $X.XX"
    - "For $1.00, you can run this model X times"
    - Any pricing table or cost breakdown
"#};

const RICH_EXAMPLE: &str = r#"{"pricing_unit": "PER_MEGAPIXEL", "base_cost": 0.025, "gpu_type": null, "resolutions": [{"name": "Square HD", "width": 1024, "height": 1024}]}"#;

const LEGACY_EXAMPLE: &str = r#"{"cost_per_image": 0.039, "runs_per_dollar": 25}"#;

impl PromptContract {
    pub fn schema_version(&self) -> SchemaVersion {
        match self {
            PromptContract::Rich => SchemaVersion::V2,
            PromptContract::Legacy => SchemaVersion::V1,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PromptContract::Rich => "rich",
            PromptContract::Legacy => "legacy",
        }
    }

    /// Fields an answer must carry before it is worth validating.
    pub fn required_fields(&self) -> &'static [&'static str] {
        match self {
            PromptContract::Rich => &["pricing_unit", "base_cost"],
            PromptContract::Legacy => &["cost_per_image", "runs_per_dollar"],
        }
    }

    /// Instructions for providers that enforce [`Self::response_schema`].
    pub fn instructions(&self) -> String {
        let body = match self {
            PromptContract::Rich => RICH_INSTRUCTIONS,
            PromptContract::Legacy => LEGACY_INSTRUCTIONS,
        };
        format!("{}\nFormat your response according to the provided schema.", body)
    }

    /// Instructions for providers without a structured-output mode.
    pub fn free_text_instructions(&self) -> String {
        let (body, example) = match self {
            PromptContract::Rich => (RICH_INSTRUCTIONS, RICH_EXAMPLE),
            PromptContract::Legacy => (LEGACY_INSTRUCTIONS, LEGACY_EXAMPLE),
        };
        format!(
            "{}\nRespond with a single JSON object and nothing else, for example:\n{}",
            body, example
        )
    }

    /// Response schema in the OpenAPI subset Gemini accepts for
    /// `generationConfig.responseSchema`.
    pub fn response_schema(&self) -> Value {
        match self {
            PromptContract::Rich => {
                let units: Vec<&str> = PricingUnit::ALL.iter().map(|unit| unit.as_str()).collect();
                json!({
                    "type": "OBJECT",
                    "properties": {
                        "pricing_unit": {
                            "type": "STRING",
                            "enum": units,
                            "description": "The billing dimension the model charges by"
                        },
                        "base_cost": {
                            "type": "NUMBER",
                            "description": "Cost in US dollars for one pricing unit"
                        },
                        "gpu_type": {
                            "type": "STRING",
                            "nullable": true,
                            "description": "GPU name, only for PER_SECOND_GPU pricing"
                        },
                        "resolutions": {
                            "type": "ARRAY",
                            "nullable": true,
                            "items": {
                                "type": "OBJECT",
                                "properties": {
                                    "name": {"type": "STRING"},
                                    "width": {"type": "INTEGER"},
                                    "height": {"type": "INTEGER"}
                                },
                                "required": ["name", "width", "height"]
                            }
                        }
                    },
                    "required": ["pricing_unit", "base_cost", "gpu_type", "resolutions"]
                })
            }
            PromptContract::Legacy => json!({
                "type": "OBJECT",
                "properties": {
                    "cost_per_image": {
                        "type": "NUMBER",
                        "description": "The cost per image/run in dollars"
                    },
                    "runs_per_dollar": {
                        "type": "INTEGER",
                        "description": "The number of runs/images you can generate for $1.00"
                    }
                },
                "required": ["cost_per_image", "runs_per_dollar"]
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rich_schema_lists_every_unit() {
        let schema = PromptContract::Rich.response_schema();
        let units = schema["properties"]["pricing_unit"]["enum"].as_array().unwrap();
        assert_eq!(units.len(), PricingUnit::ALL.len());
        assert!(units.contains(&json!("PER_SECOND_GPU")));
    }

    #[test]
    fn test_required_fields_are_in_schema() {
        for contract in [PromptContract::Rich, PromptContract::Legacy] {
            let schema = contract.response_schema();
            let required = schema["required"].as_array().unwrap();
            for field in contract.required_fields() {
                assert!(required.contains(&json!(field)), "{} missing {}", contract.name(), field);
            }
        }
    }

    #[test]
    fn test_free_text_example_parses() {
        for contract in [PromptContract::Rich, PromptContract::Legacy] {
            let text = contract.free_text_instructions();
            let example = text.lines().last().unwrap();
            let value: Value = serde_json::from_str(example).unwrap();
            for field in contract.required_fields() {
                assert!(value.get(field).is_some());
            }
        }
    }

    #[test]
    fn test_rich_rules_mention_null_policy() {
        assert!(PromptContract::Rich.instructions().contains("must be null"));
        assert_eq!(PromptContract::Legacy.schema_version(), SchemaVersion::V1);
    }
}
