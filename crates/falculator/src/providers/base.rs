use super::errors::ProviderError;
use crate::image::ImagePayload;
use crate::prompts::PromptContract;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Which upstream handles a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Vision model with an enforced structured-output mode.
    #[default]
    #[serde(alias = "google", alias = "gemini")]
    Primary,
    /// Vision model reached through a router, answering in free text.
    #[serde(alias = "openrouter")]
    Secondary,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Primary => "primary",
            ProviderKind::Secondary => "secondary",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "primary" | "google" | "gemini" => Ok(ProviderKind::Primary),
            "secondary" | "openrouter" => Ok(ProviderKind::Secondary),
            other => Err(format!("Unknown provider: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfigKey {
    pub name: String,
    pub required: bool,
    pub secret: bool,
    pub default: Option<String>,
}

impl ConfigKey {
    pub fn new(name: &str, required: bool, secret: bool, default: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            required,
            secret,
            default: default.map(|s| s.to_string()),
        }
    }
}

/// Static description of a provider, surfaced by the server's provider listing.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderMetadata {
    pub name: String,
    pub kind: ProviderKind,
    pub display_name: String,
    pub description: String,
    pub default_model: String,
    pub structured_output: bool,
    pub model_doc_link: String,
    pub config_keys: Vec<ConfigKey>,
}

impl ProviderMetadata {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: &str,
        kind: ProviderKind,
        display_name: &str,
        description: &str,
        default_model: &str,
        structured_output: bool,
        model_doc_link: &str,
        config_keys: Vec<ConfigKey>,
    ) -> Self {
        Self {
            name: name.to_string(),
            kind,
            display_name: display_name.to_string(),
            description: description.to_string(),
            default_model: default_model.to_string(),
            structured_output,
            model_doc_link: model_doc_link.to_string(),
            config_keys,
        }
    }
}

/// One external vision model. Implementations make exactly one outbound call
/// per `extract` and never retry; fallback belongs to the orchestrator.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    fn get_name(&self) -> &str;

    fn get_model(&self) -> &str;

    async fn extract(
        &self,
        image: &ImagePayload,
        contract: PromptContract,
    ) -> Result<Map<String, Value>, ProviderError>;
}
