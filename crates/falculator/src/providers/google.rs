use super::api_client::{ApiClient, AuthMethod};
use super::base::{ConfigKey, ProviderKind, ProviderMetadata, VisionProvider};
use super::errors::{GoogleErrorCode, ProviderError};
use super::utils::{handle_response, map_http_error_to_provider_error};
use crate::config::GoogleConfig;
use crate::image::ImagePayload;
use crate::prompts::PromptContract;
use crate::providers::formats::google::{create_request, response_to_object};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};
use std::time::Duration;

pub const GOOGLE_API_HOST: &str = "https://generativelanguage.googleapis.com";
pub const GOOGLE_DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const GOOGLE_DOC_URL: &str = "https://ai.google.dev/gemini-api/docs/models";

#[derive(Debug)]
pub struct GoogleProvider {
    api_client: ApiClient,
    model: String,
    name: String,
}

impl GoogleProvider {
    pub fn new(config: &GoogleConfig, client: Client, api_key: String) -> Self {
        if !api_key.starts_with("AIza") {
            tracing::debug!("Gemini API key does not have the usual AIza prefix");
        }

        let auth = AuthMethod::ApiKey {
            header_name: "x-goog-api-key".to_string(),
            key: api_key,
        };

        Self {
            api_client: ApiClient::new(client, config.host.clone(), auth),
            model: config.model.clone(),
            name: Self::metadata().name,
        }
    }

    pub fn metadata() -> ProviderMetadata {
        ProviderMetadata::new(
            "google",
            ProviderKind::Primary,
            "Google Gemini",
            "Gemini vision models with enforced JSON output",
            GOOGLE_DEFAULT_MODEL,
            true,
            GOOGLE_DOC_URL,
            vec![
                ConfigKey::new("GEMINI_API_KEY", false, true, None),
                ConfigKey::new("GOOGLE_HOST", false, false, Some(GOOGLE_API_HOST)),
            ],
        )
    }

    async fn post(&self, payload: &Value) -> Result<Value, ProviderError> {
        let path = format!("v1beta/models/{}:generateContent", self.model);
        let response = self.api_client.response_post(&path, payload).await?;
        handle_response(response, map_google_error).await
    }
}

fn error_reasons(payload: &Value) -> impl Iterator<Item = &str> {
    payload
        .pointer("/error/details")
        .and_then(|d| d.as_array())
        .into_iter()
        .flatten()
        .filter_map(|detail| detail.get("reason").and_then(|r| r.as_str()))
}

fn retry_delay(payload: &Value) -> Option<Duration> {
    payload
        .pointer("/error/details")?
        .as_array()?
        .iter()
        .find_map(|detail| detail.get("retryDelay").and_then(|d| d.as_str()))
        .and_then(|delay| delay.strip_suffix('s'))
        .and_then(|secs| secs.parse::<f64>().ok())
        .map(Duration::from_secs_f64)
}

/// Gemini reports a bad key as `400 INVALID_ARGUMENT` with an
/// `API_KEY_INVALID` reason, so status alone is not enough.
pub fn map_google_error(status: StatusCode, payload: Option<Value>) -> ProviderError {
    let Some(body) = payload.as_ref() else {
        return map_http_error_to_provider_error(status, payload);
    };

    let status = body
        .pointer("/error/code")
        .and_then(|c| c.as_u64())
        .map(|code| GoogleErrorCode::from_code(code).to_status_code())
        .unwrap_or(status);

    let invalid_key = error_reasons(body).any(|reason| reason == "API_KEY_INVALID")
        || body.pointer("/error/status").and_then(|s| s.as_str()) == Some("UNAUTHENTICATED");

    if invalid_key {
        let message = body
            .pointer("/error/message")
            .and_then(|m| m.as_str())
            .unwrap_or("API key not valid");
        return ProviderError::Authentication(message.to_string());
    }

    let delay = retry_delay(body);
    match map_http_error_to_provider_error(status, payload) {
        ProviderError::RateLimitExceeded { details, .. } => ProviderError::RateLimitExceeded {
            details,
            retry_delay: delay,
        },
        other => other,
    }
}

#[async_trait]
impl VisionProvider for GoogleProvider {
    fn get_name(&self) -> &str {
        &self.name
    }

    fn get_model(&self) -> &str {
        &self.model
    }

    #[tracing::instrument(skip(self, image), fields(model = %self.model, contract = contract.name()))]
    async fn extract(
        &self,
        image: &ImagePayload,
        contract: PromptContract,
    ) -> Result<Map<String, Value>, ProviderError> {
        let payload = create_request(contract, image)?;
        let response = self.post(&payload).await?;
        let object = response_to_object(&response)?;
        tracing::debug!(fields = object.len(), "parsed structured response");
        Ok(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::api_client::build_http_client;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> GoogleProvider {
        let config = GoogleConfig {
            host: server.uri(),
            ..GoogleConfig::default()
        };
        let client = build_http_client(Duration::from_secs(5)).unwrap();
        GoogleProvider::new(&config, client, "AIza-test".to_string())
    }

    fn png() -> ImagePayload {
        ImagePayload::from_bytes(&[0x89, b'P', b'N', b'G', 0, 0], 1024).unwrap()
    }

    #[tokio::test]
    async fn test_extract_parses_structured_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "AIza-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{
                    "content": {"parts": [{
                        "text": "{\"pricing_unit\": \"PER_MEGAPIXEL\", \"base_cost\": 0.005, \"gpu_type\": null, \"resolutions\": null}"
                    }]},
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let object = provider_for(&server)
            .extract(&png(), PromptContract::Rich)
            .await
            .unwrap();
        assert_eq!(object["pricing_unit"], "PER_MEGAPIXEL");
        assert_eq!(object["base_cost"], 0.005);
    }

    #[tokio::test]
    async fn test_invalid_key_is_authentication_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": 400,
                    "message": "API key not valid. Please pass a valid API key.",
                    "status": "INVALID_ARGUMENT",
                    "details": [{
                        "@type": "type.googleapis.com/google.rpc.ErrorInfo",
                        "reason": "API_KEY_INVALID"
                    }]
                }
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .extract(&png(), PromptContract::Rich)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Authentication(msg) if msg.contains("API key not valid")));
    }

    #[tokio::test]
    async fn test_unparseable_text_is_extraction_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "No pricing here"}]}}]
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .extract(&png(), PromptContract::Rich)
            .await
            .unwrap_err();
        assert!(err.permits_fallback());
    }

    #[tokio::test]
    async fn test_server_error_does_not_permit_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(json!({
                "error": {"code": 503, "message": "The model is overloaded.", "status": "UNAVAILABLE"}
            })))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .extract(&png(), PromptContract::Legacy)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ServerError(_)));
        assert!(!err.permits_fallback());
    }

    #[test]
    fn test_quota_error_carries_retry_delay() {
        let err = map_google_error(
            StatusCode::TOO_MANY_REQUESTS,
            Some(json!({
                "error": {
                    "code": 429,
                    "message": "Quota exceeded",
                    "status": "RESOURCE_EXHAUSTED",
                    "details": [{
                        "@type": "type.googleapis.com/google.rpc.RetryInfo",
                        "retryDelay": "33s"
                    }]
                }
            })),
        );
        assert_eq!(
            err,
            ProviderError::RateLimitExceeded {
                details: "Quota exceeded".to_string(),
                retry_delay: Some(Duration::from_secs(33)),
            }
        );
    }
}
