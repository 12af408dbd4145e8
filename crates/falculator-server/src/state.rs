use falculator::config::ExtractorConfig;
use falculator::extraction::Extractor;
use falculator::rate_limit::RateLimiter;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<Extractor>,
}

impl AppState {
    pub fn new(config: ExtractorConfig) -> anyhow::Result<Arc<AppState>> {
        let rate_limiter = Arc::new(RateLimiter::from_config(&config.rate_limit));
        Ok(Self::with_extractor(Extractor::new(config, rate_limiter)?))
    }

    pub fn with_extractor(extractor: Extractor) -> Arc<AppState> {
        Arc::new(Self {
            extractor: Arc::new(extractor),
        })
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        self.extractor.rate_limiter()
    }
}
