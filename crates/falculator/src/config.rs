//! Extractor configuration. Every field has a default so a bare environment
//! still yields a usable (if credential-less) extractor.

use crate::image::DEFAULT_MAX_IMAGE_BYTES;
use crate::providers::google::{GOOGLE_API_HOST, GOOGLE_DEFAULT_MODEL};
use crate::providers::openrouter::{OPENROUTER_API_HOST, OPENROUTER_DEFAULT_MODEL};
use serde::Deserialize;
use std::time::Duration;

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub host: String,
    pub model: String,
    /// Server-side default credential, used when the caller brings none.
    pub api_key: Option<String>,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            host: GOOGLE_API_HOST.to_string(),
            model: GOOGLE_DEFAULT_MODEL.to_string(),
            api_key: None,
        }
    }
}

impl std::fmt::Debug for GoogleConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleConfig")
            .field("host", &self.host)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenRouterConfig {
    pub host: String,
    pub model: String,
    /// Sent as `HTTP-Referer` for OpenRouter app attribution.
    pub referer: Option<String>,
    /// Sent as `X-Title`.
    pub title: Option<String>,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            host: OPENROUTER_API_HOST.to_string(),
            model: OPENROUTER_DEFAULT_MODEL.to_string(),
            referer: None,
            title: Some("Falculator".to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window_secs: 60 * 60,
        }
    }
}

impl RateLimitConfig {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub google: GoogleConfig,
    pub openrouter: OpenRouterConfig,
    pub rate_limit: RateLimitConfig,
    pub request_timeout_secs: u64,
    pub max_image_bytes: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            google: GoogleConfig::default(),
            openrouter: OpenRouterConfig::default(),
            rate_limit: RateLimitConfig::default(),
            request_timeout_secs: 60,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl ExtractorConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// The shared server credential, ignoring blank values.
    pub fn default_api_key(&self) -> Option<&str> {
        self.google
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }
}
