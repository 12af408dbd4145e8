use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// The upstream answered, but not with something shaped like the contract.
    #[error("Extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("Rate limit exceeded: {details}")]
    RateLimitExceeded {
        details: String,
        retry_delay: Option<Duration>,
    },

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),
}

impl ProviderError {
    pub fn telemetry_type(&self) -> &'static str {
        match self {
            ProviderError::Authentication(_) => "auth",
            ProviderError::ExtractionFailed(_) => "extraction",
            ProviderError::RateLimitExceeded { .. } => "rate_limit",
            ProviderError::ServerError(_) => "server",
            ProviderError::RequestFailed(_) => "request",
        }
    }

    /// Only a malformed answer is worth asking again under the legacy
    /// contract. Auth and transport failures would recur identically.
    pub fn permits_fallback(&self) -> bool {
        matches!(self, ProviderError::ExtractionFailed(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        let mut details = vec![];

        if let Some(status) = error.status() {
            details.push(format!("status: {}", status));
        }
        if error.is_timeout() {
            details.push("timeout".to_string());
        }
        if error.is_connect() {
            match error.url().and_then(|url| url.host_str().map(|h| (h.to_string(), url.port()))) {
                Some((host, port)) => {
                    let port_info = port.map(|p| format!(":{}", p)).unwrap_or_default();
                    details.push(format!("failed to connect to {}{}", host, port_info));
                }
                None => details.push("connection failed".to_string()),
            }
        }

        let msg = if details.is_empty() {
            error.to_string()
        } else {
            format!("{} ({})", error, details.join(", "))
        };
        ProviderError::RequestFailed(msg)
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(error: serde_json::Error) -> Self {
        ProviderError::ExtractionFailed(format!("Response is not valid JSON: {}", error))
    }
}

#[derive(Debug)]
pub enum GoogleErrorCode {
    BadRequest = 400,
    Unauthorized = 401,
    Forbidden = 403,
    NotFound = 404,
    TooManyRequests = 429,
    InternalServerError = 500,
    ServiceUnavailable = 503,
}

impl GoogleErrorCode {
    pub fn to_status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::TooManyRequests => StatusCode::TOO_MANY_REQUESTS,
            Self::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn from_code(code: u64) -> Self {
        match code {
            400 => Self::BadRequest,
            401 => Self::Unauthorized,
            403 => Self::Forbidden,
            404 => Self::NotFound,
            429 => Self::TooManyRequests,
            503 => Self::ServiceUnavailable,
            _ => Self::InternalServerError,
        }
    }
}
