use super::errors::ProviderError;
use anyhow::Result;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

/// Shared HTTP client for every provider. Connection pooling lives here, so
/// build it once and hand clones to each [`ApiClient`].
pub fn build_http_client(timeout: Duration) -> Result<Client> {
    Ok(Client::builder().timeout(timeout).build()?)
}

#[derive(Clone)]
pub enum AuthMethod {
    BearerToken(String),
    ApiKey { header_name: String, key: String },
}

impl fmt::Debug for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthMethod::BearerToken(_) => f.write_str("BearerToken(***)"),
            AuthMethod::ApiKey { header_name, .. } => {
                write!(f, "ApiKey {{ header_name: {:?}, key: *** }}", header_name)
            }
        }
    }
}

/// Thin reqwest wrapper that knows its host, its credential and a fixed set of
/// extra headers.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    host: String,
    auth: AuthMethod,
    default_headers: HeaderMap,
}

impl ApiClient {
    pub fn new(client: Client, host: impl Into<String>, auth: AuthMethod) -> Self {
        Self {
            client,
            host: host.into(),
            auth,
            default_headers: HeaderMap::new(),
        }
    }

    pub fn with_header(mut self, key: &str, value: &str) -> Result<Self> {
        let name = HeaderName::from_bytes(key.as_bytes())?;
        let value = HeaderValue::from_str(value)?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    fn build_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.host.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub async fn response_post(&self, path: &str, payload: &Value) -> Result<Response, ProviderError> {
        let request = self
            .client
            .post(self.build_url(path))
            .headers(self.default_headers.clone())
            .json(payload);

        let request = match &self.auth {
            AuthMethod::BearerToken(token) => request.bearer_auth(token),
            AuthMethod::ApiKey { header_name, key } => request.header(header_name.as_str(), key),
        };

        Ok(request.send().await?)
    }
}
