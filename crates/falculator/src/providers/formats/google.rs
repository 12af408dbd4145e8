use crate::image::ImagePayload;
use crate::prompts::PromptContract;
use crate::providers::errors::ProviderError;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: &'a str,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    Text { text: String },
    Image { inline_data: InlineData<'a> },
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
    temperature: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

/// `generateContent` body asking for JSON that matches the contract's schema.
pub fn create_request(contract: PromptContract, image: &ImagePayload) -> Result<Value, ProviderError> {
    let request = GoogleRequest {
        contents: vec![Content {
            role: "user",
            parts: vec![
                Part::Text {
                    text: contract.instructions(),
                },
                Part::Image {
                    inline_data: InlineData {
                        mime_type: image.mime_type(),
                        data: image.data(),
                    },
                },
            ],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_schema: contract.response_schema(),
            temperature: 0.0,
        },
    };

    serde_json::to_value(request)
        .map_err(|e| ProviderError::RequestFailed(format!("Failed to create request: {}", e)))
}

/// Concatenated text parts of the first candidate.
pub fn response_text(response: &Value) -> Result<String, ProviderError> {
    if let Some(reason) = response
        .get("promptFeedback")
        .and_then(|f| f.get("blockReason"))
        .and_then(|r| r.as_str())
    {
        return Err(ProviderError::ExtractionFailed(format!(
            "Prompt was blocked: {}",
            reason
        )));
    }

    let candidate = response
        .get("candidates")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| ProviderError::ExtractionFailed("Response has no candidates".to_string()))?;

    let text: String = candidate
        .get("content")
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .map(|parts| {
            parts
                .iter()
                .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        let finish_reason = candidate
            .get("finishReason")
            .and_then(|r| r.as_str())
            .unwrap_or("unknown");
        return Err(ProviderError::ExtractionFailed(format!(
            "Candidate has no text (finish reason: {})",
            finish_reason
        )));
    }

    Ok(text)
}

/// In structured-output mode the whole text must be the JSON object.
pub fn response_to_object(response: &Value) -> Result<Map<String, Value>, ProviderError> {
    let text = response_text(response)?;
    match serde_json::from_str::<Value>(text.trim())? {
        Value::Object(object) => Ok(object),
        other => Err(ProviderError::ExtractionFailed(format!(
            "Expected a JSON object, got {}",
            other
        ))),
    }
}
