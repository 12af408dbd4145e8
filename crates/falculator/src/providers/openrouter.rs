use super::api_client::{ApiClient, AuthMethod};
use super::base::{ConfigKey, ProviderKind, ProviderMetadata, VisionProvider};
use super::errors::ProviderError;
use super::utils::{
    ensure_required_fields, extract_json_object, handle_response,
    map_http_error_to_provider_error,
};
use crate::config::OpenRouterConfig;
use crate::image::ImagePayload;
use crate::prompts::PromptContract;
use crate::providers::formats::openai::{create_request, get_model, response_text};
use anyhow::Result;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Map, Value};

pub const OPENROUTER_API_HOST: &str = "https://openrouter.ai";
pub const OPENROUTER_DEFAULT_MODEL: &str = "google/gemini-2.0-flash-001";
pub const OPENROUTER_DOC_URL: &str = "https://openrouter.ai/models?input_modalities=image";

const COMPLETIONS_PATH: &str = "api/v1/chat/completions";

#[derive(Debug)]
pub struct OpenRouterProvider {
    api_client: ApiClient,
    model: String,
    name: String,
}

impl OpenRouterProvider {
    pub fn new(config: &OpenRouterConfig, client: Client, api_key: String) -> Result<Self> {
        let mut api_client = ApiClient::new(
            client,
            config.host.clone(),
            AuthMethod::BearerToken(api_key),
        );
        if let Some(referer) = &config.referer {
            api_client = api_client.with_header("HTTP-Referer", referer)?;
        }
        if let Some(title) = &config.title {
            api_client = api_client.with_header("X-Title", title)?;
        }

        Ok(Self {
            api_client,
            model: config.model.clone(),
            name: Self::metadata().name,
        })
    }

    pub fn metadata() -> ProviderMetadata {
        ProviderMetadata::new(
            "openrouter",
            ProviderKind::Secondary,
            "OpenRouter",
            "Vision models behind the OpenRouter chat completions API",
            OPENROUTER_DEFAULT_MODEL,
            false,
            OPENROUTER_DOC_URL,
            vec![
                ConfigKey::new("OPENROUTER_API_KEY", true, true, None),
                ConfigKey::new("OPENROUTER_HOST", false, false, Some(OPENROUTER_API_HOST)),
            ],
        )
    }
}

/// OpenRouter can answer 200 with an `error` object when the routed model
/// fails upstream.
fn check_embedded_error(response: &Value) -> Result<(), ProviderError> {
    let Some(error) = response.get("error") else {
        return Ok(());
    };
    let code = error
        .get("code")
        .and_then(|c| c.as_u64())
        .and_then(|c| u16::try_from(c).ok())
        .and_then(|c| StatusCode::from_u16(c).ok())
        .unwrap_or(StatusCode::BAD_GATEWAY);
    Err(map_http_error_to_provider_error(
        code,
        Some(serde_json::json!({ "error": error })),
    ))
}

#[async_trait]
impl VisionProvider for OpenRouterProvider {
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
        let payload = create_request(&self.model, contract, image);
        let response = self
            .api_client
            .response_post(COMPLETIONS_PATH, &payload)
            .await?;
        let response = handle_response(response, map_http_error_to_provider_error).await?;
        check_embedded_error(&response)?;

        if let Some(routed) = get_model(&response) {
            tracing::debug!(routed_model = routed, "completion received");
        }

        let text = response_text(&response)?;
        let object = extract_json_object(&text).ok_or_else(|| {
            ProviderError::ExtractionFailed("No JSON object found in the response text".to_string())
        })?;
        ensure_required_fields(&object, contract)?;
        Ok(object)
    }
}
