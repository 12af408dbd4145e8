use super::errors::ProviderError;
use crate::prompts::PromptContract;
use reqwest::{Response, StatusCode};
use serde_json::{Map, Value};

fn extract_error_message(payload: Option<&Value>) -> String {
    payload
        .and_then(|p| {
            p.get("error")
                .and_then(|e| e.get("message"))
                .or_else(|| p.get("message"))
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| payload.map(|p| p.to_string()).unwrap_or_default())
}

pub fn map_http_error_to_provider_error(status: StatusCode, payload: Option<Value>) -> ProviderError {
    let message = extract_error_message(payload.as_ref());

    let error = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Authentication(format!(
            "Authentication failed. Status: {}. Response: {}",
            status, message
        )),
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimitExceeded {
            details: message,
            retry_delay: None,
        },
        StatusCode::NOT_FOUND => {
            ProviderError::RequestFailed(format!("Resource not found (404): {}", message))
        }
        StatusCode::BAD_REQUEST => {
            ProviderError::RequestFailed(format!("Bad request (400): {}", message))
        }
        _ if status.is_server_error() => {
            ProviderError::ServerError(format!("Server error ({}): {}", status, message))
        }
        _ => ProviderError::RequestFailed(format!(
            "Request failed with status {}: {}",
            status, message
        )),
    };

    tracing::warn!(
        status = %status,
        error_type = error.telemetry_type(),
        "provider request failed: {}",
        error
    );

    error
}

/// Read the body as JSON, routing non-2xx statuses through `map_error`.
pub async fn handle_response<F>(response: Response, map_error: F) -> Result<Value, ProviderError>
where
    F: FnOnce(StatusCode, Option<Value>) -> ProviderError,
{
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let payload = serde_json::from_str::<Value>(&body).ok();
        return Err(map_error(status, payload));
    }

    response.json::<Value>().await.map_err(|e| {
        ProviderError::ServerError(format!("Response body is not valid JSON: {}", e))
    })
}

// Offsets come from `find`/`char_indices`, so they sit on char boundaries.
#[allow(clippy::string_slice)]
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let after_lang = after_fence.strip_prefix("json").unwrap_or(after_fence);
    let end = after_lang.find("```")?;
    Some(after_lang[..end].trim())
}

/// End index (exclusive) of the balanced object starting at `start`, honoring
/// string literals and escapes.
#[allow(clippy::string_slice)]
fn balanced_object_end(text: &str, start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(start + offset + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Locate the first balanced `{...}` span in free text that parses as a JSON
/// object.
pub fn extract_json_object(text: &str) -> Option<Map<String, Value>> {
    let text = text.trim();
    fenced_block(text)
        .and_then(first_object_in)
        .or_else(|| first_object_in(text))
}

#[allow(clippy::string_slice)]
fn first_object_in(text: &str) -> Option<Map<String, Value>> {
    let mut search_from = 0;

    while let Some(found) = text[search_from..].find('{') {
        let start = search_from + found;
        if let Some(end) = balanced_object_end(text, start) {
            if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(&text[start..end]) {
                return Some(object);
            }
        }
        search_from = start + 1;
    }
    None
}

pub fn ensure_required_fields(
    object: &Map<String, Value>,
    contract: PromptContract,
) -> Result<(), ProviderError> {
    let missing: Vec<&str> = contract
        .required_fields()
        .iter()
        .copied()
        .filter(|field| object.get(*field).map_or(true, Value::is_null))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ProviderError::ExtractionFailed(format!(
            "Response is missing required fields for the {} contract: {}",
            contract.name(),
            missing.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(r#"{"cost_per_image": 0.04, "runs_per_dollar": 25}"#; "bare object")]
    #[test_case("Here is the pricing:\n{\"cost_per_image\": 0.04, \"runs_per_dollar\": 25}\nHope that helps!"; "surrounding prose")]
    #[test_case("```json\n{\"cost_per_image\": 0.04, \"runs_per_dollar\": 25}\n```"; "fenced block")]
    #[test_case("Use {braces} carefully. {\"cost_per_image\": 0.04, \"runs_per_dollar\": 25}"; "earlier invalid span")]
    fn test_extract_json_object_finds_answer(text: &str) {
        let object = extract_json_object(text).unwrap();
        assert_eq!(object["cost_per_image"], json!(0.04));
        assert_eq!(object["runs_per_dollar"], json!(25));
    }

    #[test]
    fn test_extract_json_object_respects_strings() {
        let text = r#"{"name": "curly } brace", "nested": {"value": "\"{"}} trailing }"#;
        let object = extract_json_object(text).unwrap();
        assert_eq!(object["name"], "curly } brace");
        assert_eq!(object["nested"]["value"], "\"{");
    }

    #[test_case("I could not find any pricing information."; "no braces")]
    #[test_case("{ this is not json }"; "invalid json")]
    #[test_case("{\"unterminated\": 1"; "unbalanced")]
    fn test_extract_json_object_none(text: &str) {
        assert!(extract_json_object(text).is_none());
    }

    #[test]
    fn test_ensure_required_fields() {
        let complete = json!({"pricing_unit": "PER_IMAGE", "base_cost": 0.04});
        assert!(ensure_required_fields(complete.as_object().unwrap(), PromptContract::Rich).is_ok());

        let partial = json!({"pricing_unit": "PER_IMAGE", "base_cost": null});
        let err = ensure_required_fields(partial.as_object().unwrap(), PromptContract::Rich).unwrap_err();
        assert!(matches!(err, ProviderError::ExtractionFailed(msg) if msg.contains("base_cost")));
    }

    #[test_case(StatusCode::UNAUTHORIZED, "auth")]
    #[test_case(StatusCode::FORBIDDEN, "auth")]
    #[test_case(StatusCode::TOO_MANY_REQUESTS, "rate_limit")]
    #[test_case(StatusCode::BAD_GATEWAY, "server")]
    #[test_case(StatusCode::BAD_REQUEST, "request")]
    fn test_status_mapping(status: StatusCode, expected: &str) {
        let error = map_http_error_to_provider_error(
            status,
            Some(json!({"error": {"message": "nope"}})),
        );
        assert_eq!(error.telemetry_type(), expected);
        assert!(error.to_string().contains("nope"));
    }
}
