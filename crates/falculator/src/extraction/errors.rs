use crate::image::ImageError;
use crate::providers::errors::ProviderError;
use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

pub const NOT_FOUND_MESSAGE: &str = "Could not find pricing information in the image. Please make sure your screenshot includes the cost details.";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionError {
    #[error("{0}")]
    InvalidInput(String),

    /// No credential from the caller and none configured on the server.
    #[error("Server configuration error: {0}")]
    Configuration(String),

    #[error("Rate limit exceeded, retry in {}s", retry_after.as_secs())]
    RateLimited { retry_after: Duration },

    /// Both contracts were tried and neither produced a usable record.
    #[error("Could not find pricing information in the image")]
    NotFound,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ExtractionError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ExtractionError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ExtractionError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ExtractionError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            ExtractionError::NotFound => StatusCode::UNPROCESSABLE_ENTITY,
            ExtractionError::Provider(ProviderError::Authentication(_)) => StatusCode::UNAUTHORIZED,
            ExtractionError::Provider(ProviderError::ExtractionFailed(_)) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            // Upstream 429s are not the caller's own quota.
            ExtractionError::Provider(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Text safe to show the end user. Configuration details and upstream
    /// payloads stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            ExtractionError::InvalidInput(message) => message.clone(),
            ExtractionError::Configuration(_) => "Server configuration error".to_string(),
            ExtractionError::RateLimited { .. } => {
                "Rate limit exceeded. Please add your own Gemini API key in Advanced Settings."
                    .to_string()
            }
            ExtractionError::NotFound => NOT_FOUND_MESSAGE.to_string(),
            ExtractionError::Provider(ProviderError::Authentication(_)) => {
                "The AI provider rejected the API key. Please check your key and try again."
                    .to_string()
            }
            ExtractionError::Provider(ProviderError::ExtractionFailed(_)) => {
                NOT_FOUND_MESSAGE.to_string()
            }
            ExtractionError::Provider(ProviderError::RateLimitExceeded { .. }) => {
                "The AI provider is rate limiting requests. Please try again later.".to_string()
            }
            ExtractionError::Provider(error) => {
                format!("The AI provider request failed: {}", error)
            }
        }
    }

    /// Our own quota window, or the upstream provider's retry hint.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            ExtractionError::RateLimited { retry_after } => Some(*retry_after),
            ExtractionError::Provider(ProviderError::RateLimitExceeded {
                retry_delay, ..
            }) => *retry_delay,
            _ => None,
        }
    }
}

impl From<ImageError> for ExtractionError {
    fn from(error: ImageError) -> Self {
        ExtractionError::InvalidInput(error.to_string())
    }
}
