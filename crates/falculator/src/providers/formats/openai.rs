use crate::image::ImagePayload;
use crate::prompts::PromptContract;
use crate::providers::errors::ProviderError;
use serde_json::{json, Value};

/// Chat-completions body carrying the free-text instructions and the image as
/// a data URL. No `response_format` is sent; the answer is located afterwards.
pub fn create_request(model: &str, contract: PromptContract, image: &ImagePayload) -> Value {
    json!({
        "model": model,
        "temperature": 0,
        "messages": [{
            "role": "user",
            "content": [
                {"type": "text", "text": contract.free_text_instructions()},
                {"type": "image_url", "image_url": {"url": image.data_url()}}
            ]
        }]
    })
}

/// Text content of the first choice. Some routers return content as a list of
/// typed parts instead of a plain string.
pub fn response_text(response: &Value) -> Result<String, ProviderError> {
    let content = response
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .ok_or_else(|| {
            ProviderError::ExtractionFailed("Response has no message content".to_string())
        })?;

    let text = match content {
        Value::String(text) => text.clone(),
        Value::Array(parts) => parts
            .iter()
            .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    };

    if text.trim().is_empty() {
        return Err(ProviderError::ExtractionFailed(
            "Response message is empty".to_string(),
        ));
    }
    Ok(text)
}

pub fn get_model(response: &Value) -> Option<&str> {
    response.get("model").and_then(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_uses_data_url() {
        let image = ImagePayload::from_bytes(&[0xFF, 0xD8, 0xFF, 0xE0], 1024).unwrap();
        let payload = create_request("google/gemini-2.0-flash-001", PromptContract::Rich, &image);

        assert_eq!(payload["model"], "google/gemini-2.0-flash-001");
        let content = &payload["messages"][0]["content"];
        assert!(content[0]["text"].as_str().unwrap().contains("single JSON object"));
        assert!(content[1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
        assert!(payload.get("response_format").is_none());
    }

    #[test]
    fn test_response_text_variants() {
        let plain = json!({"choices": [{"message": {"content": "{\"a\": 1}"}}]});
        assert_eq!(response_text(&plain).unwrap(), "{\"a\": 1}");

        let parts = json!({"choices": [{"message": {"content": [
            {"type": "text", "text": "{\"a\": "},
            {"type": "text", "text": "1}"}
        ]}}]});
        assert_eq!(response_text(&parts).unwrap(), "{\"a\": 1}");

        let empty = json!({"choices": []});
        assert!(response_text(&empty).unwrap_err().permits_fallback());
    }
}
