//! Turns one screenshot into one validated [`PricingRecord`].
//!
//! A request moves through an explicit [`Stage`] machine:
//!
//! ```text
//! Start -> RateLimitCheck -> RichAttempt -> Success
//!                                        \-> LegacyFallback -> LegacyAttempt -> Success | Fail
//! ```
//!
//! Only a structurally unusable rich answer leads to the legacy contract.
//! Authentication and transport failures end the request immediately.

pub mod errors;
pub mod request;

use std::sync::Arc;

use crate::config::ExtractorConfig;
use crate::pricing::{validate::validate, Correction, PricingRecord, Validated, ValidationError};
use crate::prompts::PromptContract;
use crate::providers::{
    HttpProviderFactory, ProviderError, ProviderFactory, ProviderKind, VisionProvider,
};
use crate::rate_limit::RateLimiter;

pub use errors::{ExtractionError, NOT_FOUND_MESSAGE};
pub use request::{CallerIdentity, ExtractionRequest};

/// Why a single attempt produced no record.
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptFailure {
    Provider(ProviderError),
    Validation(ValidationError),
}

impl AttemptFailure {
    pub fn permits_fallback(&self) -> bool {
        match self {
            AttemptFailure::Provider(error) => error.permits_fallback(),
            AttemptFailure::Validation(_) => true,
        }
    }

    /// Terminal error once no further contract is left to try.
    fn into_terminal(self) -> ExtractionError {
        match self {
            AttemptFailure::Provider(ProviderError::ExtractionFailed(_))
            | AttemptFailure::Validation(_) => ExtractionError::NotFound,
            AttemptFailure::Provider(error) => ExtractionError::Provider(error),
        }
    }
}

#[derive(Debug)]
pub enum Stage {
    Start,
    RateLimitCheck,
    RichAttempt,
    LegacyFallback(AttemptFailure),
    LegacyAttempt,
    Success(Validated),
    Fail(ExtractionError),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Start => "start",
            Stage::RateLimitCheck => "rate_limit_check",
            Stage::RichAttempt => "rich_attempt",
            Stage::LegacyFallback(_) => "legacy_fallback",
            Stage::LegacyAttempt => "legacy_attempt",
            Stage::Success(_) => "success",
            Stage::Fail(_) => "fail",
        }
    }
}

/// Result of a completed extraction with the bookkeeping the caller may want
/// to surface.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: PricingRecord,
    pub corrections: Vec<Correction>,
    pub provider: String,
    pub model: String,
    /// Outbound provider calls made for this request (1 or 2).
    pub attempts: u32,
}

/// Per-request state carried between stages.
struct Run<'a> {
    request: &'a ExtractionRequest,
    provider: Option<Arc<dyn VisionProvider>>,
    attempts: u32,
}

pub struct Extractor {
    config: ExtractorConfig,
    rate_limiter: Arc<RateLimiter>,
    factory: Arc<dyn ProviderFactory>,
}

impl Extractor {
    pub fn new(config: ExtractorConfig, rate_limiter: Arc<RateLimiter>) -> anyhow::Result<Self> {
        let factory = Arc::new(HttpProviderFactory::new(config.clone())?);
        Ok(Self::with_factory(config, rate_limiter, factory))
    }

    pub fn with_factory(
        config: ExtractorConfig,
        rate_limiter: Arc<RateLimiter>,
        factory: Arc<dyn ProviderFactory>,
    ) -> Self {
        Self {
            config,
            rate_limiter,
            factory,
        }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.rate_limiter
    }

    pub async fn extract(&self, request: ExtractionRequest) -> Result<PricingRecord, ExtractionError> {
        self.run(&request).await.map(|extraction| extraction.record)
    }

    #[tracing::instrument(
        skip(self, request),
        fields(caller = %request.caller, provider, stage, attempts)
    )]
    pub async fn run(&self, request: &ExtractionRequest) -> Result<Extraction, ExtractionError> {
        let mut run = Run {
            request,
            provider: None,
            attempts: 0,
        };

        let span = tracing::Span::current();
        let mut stage = Stage::Start;
        let outcome = loop {
            span.record("stage", stage.name());
            stage = match stage {
                Stage::Success(validated) => break Ok(validated),
                Stage::Fail(error) => break Err(error),
                next => self.transition(next, &mut run).await,
            };
        };

        span.record("attempts", run.attempts);
        tracing::debug!(outbound_calls = run.attempts, "extraction finished");

        let Validated {
            record,
            corrections,
        } = outcome.inspect_err(|error| {
            tracing::warn!(error = %error, "extraction failed");
        })?;

        let (provider, model) = run
            .provider
            .as_ref()
            .map(|p| (p.get_name().to_string(), p.get_model().to_string()))
            .unwrap_or_default();
        Ok(Extraction {
            record,
            corrections,
            provider,
            model,
            attempts: run.attempts,
        })
    }

    /// Consume one stage and produce the next.
    async fn transition(&self, stage: Stage, run: &mut Run<'_>) -> Stage {
        match stage {
            Stage::Start => match self.select_provider(run.request) {
                Ok(provider) => {
                    tracing::Span::current().record("provider", provider.get_name());
                    run.provider = Some(provider);
                    if run.request.has_credential() {
                        Stage::RichAttempt
                    } else {
                        Stage::RateLimitCheck
                    }
                }
                Err(error) => Stage::Fail(error),
            },
            Stage::RateLimitCheck => {
                match self
                    .rate_limiter
                    .check_and_increment(run.request.caller.as_str())
                {
                    Ok(()) => Stage::RichAttempt,
                    Err(limited) => Stage::Fail(ExtractionError::RateLimited {
                        retry_after: limited.retry_after,
                    }),
                }
            }
            Stage::RichAttempt => match self.attempt(run, PromptContract::Rich).await {
                Ok(validated) => Stage::Success(validated),
                Err(failure) if failure.permits_fallback() => Stage::LegacyFallback(failure),
                Err(failure) => Stage::Fail(failure.into_terminal()),
            },
            Stage::LegacyFallback(cause) => {
                tracing::warn!(cause = ?cause, "rich extraction unusable, retrying with legacy contract");
                Stage::LegacyAttempt
            }
            Stage::LegacyAttempt => match self.attempt(run, PromptContract::Legacy).await {
                Ok(validated) => Stage::Success(validated),
                Err(failure) => Stage::Fail(failure.into_terminal()),
            },
            terminal @ (Stage::Success(_) | Stage::Fail(_)) => terminal,
        }
    }

    /// One outbound call under `contract`, followed by validation.
    async fn attempt(
        &self,
        run: &mut Run<'_>,
        contract: PromptContract,
    ) -> Result<Validated, AttemptFailure> {
        let provider = run.provider.clone().ok_or_else(|| {
            AttemptFailure::Provider(ProviderError::RequestFailed(
                "No provider selected".to_string(),
            ))
        })?;

        run.attempts += 1;
        let raw = provider
            .extract(&run.request.image, contract)
            .await
            .map_err(AttemptFailure::Provider)?;

        let validated = validate(&raw, contract.schema_version()).map_err(|error| {
            tracing::info!(contract = contract.name(), error = %error, "model output failed validation");
            AttemptFailure::Validation(error)
        })?;

        for correction in &validated.corrections {
            tracing::info!(
                contract = contract.name(),
                correction = correction.kind(),
                "{}",
                correction
            );
        }
        Ok(validated)
    }

    fn select_provider(
        &self,
        request: &ExtractionRequest,
    ) -> Result<Arc<dyn VisionProvider>, ExtractionError> {
        let requested = request.provider.unwrap_or_default();

        let (kind, api_key) = match (&request.credential, requested) {
            (Some(key), kind) => (kind, key.clone()),
            (None, kind) => {
                if kind == ProviderKind::Secondary {
                    tracing::info!(
                        "secondary provider requested without a caller key, using the primary provider"
                    );
                }
                let key = self.config.default_api_key().ok_or_else(|| {
                    ExtractionError::Configuration(
                        "no caller API key and no server default Gemini key configured"
                            .to_string(),
                    )
                })?;
                (ProviderKind::Primary, key.to_string())
            }
        };

        self.factory.create(kind, api_key).map_err(|e| {
            tracing::error!(provider = %kind, error = %e, "failed to build provider");
            ExtractionError::Configuration(format!("failed to build {} provider: {}", kind, e))
        })
    }
}
