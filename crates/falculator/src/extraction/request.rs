use crate::image::ImagePayload;
use crate::providers::ProviderKind;
use std::fmt;
use std::net::SocketAddr;

const ANONYMOUS: &str = "anonymous";

/// Key under which anonymous requests are counted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CallerIdentity(String);

impl CallerIdentity {
    pub fn new(identity: impl Into<String>) -> Self {
        let identity = identity.into();
        let identity = identity.trim();
        if identity.is_empty() {
            Self::anonymous()
        } else {
            Self(identity.to_string())
        }
    }

    pub fn anonymous() -> Self {
        Self(ANONYMOUS.to_string())
    }

    /// First `x-forwarded-for` hop, then `x-real-ip`, then the socket peer.
    pub fn resolve(
        forwarded_for: Option<&str>,
        real_ip: Option<&str>,
        peer: Option<SocketAddr>,
    ) -> Self {
        forwarded_for
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .or_else(|| real_ip.map(str::trim).filter(|value| !value.is_empty()))
            .map(Self::new)
            .or_else(|| peer.map(|addr| Self::new(addr.ip().to_string())))
            .unwrap_or_else(Self::anonymous)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CallerIdentity {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub image: ImagePayload,
    /// Caller-supplied provider key. Requests carrying one skip the shared quota.
    pub credential: Option<String>,
    pub provider: Option<ProviderKind>,
    pub caller: CallerIdentity,
}

impl ExtractionRequest {
    pub fn new(image: ImagePayload) -> Self {
        Self {
            image,
            credential: None,
            provider: None,
            caller: CallerIdentity::anonymous(),
        }
    }

    /// Blank keys are treated as absent.
    pub fn with_credential(mut self, credential: Option<String>) -> Self {
        self.credential = credential
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());
        self
    }

    pub fn with_provider(mut self, provider: Option<ProviderKind>) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_caller(mut self, caller: CallerIdentity) -> Self {
        self.caller = caller;
        self
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }
}
