use anyhow::{Context, Result};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File};
use falculator::config::ExtractorConfig;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Bare variable honored when no Google key is configured under the
/// `FALCULATOR_` prefix.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub log_format: LogFormat,
    /// Daily rolling log files are written here when set.
    pub log_dir: Option<PathBuf>,
    pub extractor: ExtractorConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            log_format: LogFormat::default(),
            log_dir: None,
            extractor: ExtractorConfig::default(),
        }
    }
}

impl Settings {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.host, self.port))
    }

    /// Load settings from an optional TOML file, then `FALCULATOR_*`
    /// environment variables (`__` separates nested keys), then bare fallbacks.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("failed to read .env file: {}", e);
            }
        }

        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix("FALCULATOR")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut settings = Self::build(builder)?;
        settings.apply_fallbacks(|key| std::env::var(key).ok());
        Ok(settings)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<Self> {
        builder
            .build()
            .context("failed to read settings")?
            .try_deserialize()
            .context("failed to parse settings")
    }

    fn apply_fallbacks(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.extractor.default_api_key().is_none() {
            self.extractor.google.api_key =
                lookup(GEMINI_API_KEY_ENV).filter(|key| !key.trim().is_empty());
        }
    }
}
