use std::sync::Arc;

use super::{
    api_client::build_http_client,
    base::{ProviderKind, ProviderMetadata, VisionProvider},
    google::GoogleProvider,
    openrouter::OpenRouterProvider,
};
use crate::config::ExtractorConfig;
use anyhow::Result;
use reqwest::Client;

/// Builds a provider for one request. Credentials differ per caller, so
/// providers are constructed on demand rather than held in a registry.
pub trait ProviderFactory: Send + Sync {
    fn create(&self, kind: ProviderKind, api_key: String) -> Result<Arc<dyn VisionProvider>>;
}

/// Factory that talks to the real upstream APIs. One pooled HTTP client is
/// shared by every provider it builds; only the credential varies per request.
#[derive(Debug, Clone)]
pub struct HttpProviderFactory {
    config: ExtractorConfig,
    client: Client,
}

impl HttpProviderFactory {
    pub fn new(config: ExtractorConfig) -> Result<Self> {
        let client = build_http_client(config.request_timeout())?;
        Ok(Self { config, client })
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn create(&self, kind: ProviderKind, api_key: String) -> Result<Arc<dyn VisionProvider>> {
        let client = self.client.clone();
        let provider: Arc<dyn VisionProvider> = match kind {
            ProviderKind::Primary => {
                Arc::new(GoogleProvider::new(&self.config.google, client, api_key))
            }
            ProviderKind::Secondary => Arc::new(OpenRouterProvider::new(
                &self.config.openrouter,
                client,
                api_key,
            )?),
        };
        Ok(provider)
    }
}

pub fn providers() -> Vec<ProviderMetadata> {
    vec![GoogleProvider::metadata(), OpenRouterProvider::metadata()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_builds_each_kind() {
        let factory = HttpProviderFactory::new(ExtractorConfig::default()).unwrap();

        let primary = factory
            .create(ProviderKind::Primary, "AIza-test".to_string())
            .unwrap();
        assert_eq!(primary.get_name(), "google");
        assert_eq!(primary.get_model(), "gemini-2.0-flash");

        let secondary = factory
            .create(ProviderKind::Secondary, "sk-or-test".to_string())
            .unwrap();
        assert_eq!(secondary.get_name(), "openrouter");
    }

    #[tokio::test]
    async fn test_one_factory_serves_callers_with_their_own_keys() {
        use crate::image::ImagePayload;
        use crate::prompts::PromptContract;
        use serde_json::json;
        use wiremock::matchers::{header, method};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        for key in ["AIza-one", "AIza-two"] {
            Mock::given(method("POST"))
                .and(header("x-goog-api-key", key))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "candidates": [{"content": {"parts": [{
                        "text": "{\"cost_per_image\": 0.04, \"runs_per_dollar\": 25}"
                    }]}}]
                })))
                .expect(1)
                .mount(&server)
                .await;
        }

        let mut config = ExtractorConfig::default();
        config.google.host = server.uri();
        let factory = HttpProviderFactory::new(config).unwrap();
        let image = ImagePayload::from_bytes(&[0x89, b'P', b'N', b'G'], 1024).unwrap();

        for key in ["AIza-one", "AIza-two"] {
            let provider = factory.create(ProviderKind::Primary, key.to_string()).unwrap();
            let object = provider
                .extract(&image, PromptContract::Legacy)
                .await
                .unwrap();
            assert_eq!(object["runs_per_dollar"], 25);
        }
    }

    #[test]
    fn test_metadata_lists_primary_first() {
        let all = providers();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].kind, ProviderKind::Primary);
        assert!(all[0].structured_output);
        assert!(!all[1].structured_output);
    }
}
