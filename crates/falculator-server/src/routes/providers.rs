use crate::state::AppState;
use axum::{extract::State, routing::get, Json, Router};
use falculator::providers::{providers, ProviderKind};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
pub struct ProviderStatus {
    pub name: String,
    /// `primary` or `secondary`
    pub kind: String,
    pub display_name: String,
    pub description: String,
    pub model: String,
    /// Whether the provider enforces a JSON schema on its answer
    pub structured_output: bool,
    pub model_doc_link: String,
    /// Whether requests without a caller key can use this provider
    pub server_key_configured: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RateLimitStatus {
    pub max_requests: u32,
    pub window_secs: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProvidersResponse {
    pub providers: Vec<ProviderStatus>,
    /// Applies only to requests without a caller key
    pub rate_limit: RateLimitStatus,
}

#[utoipa::path(
    get,
    path = "/providers",
    responses(
        (status = 200, description = "Extraction providers and the shared rate limit", body = ProvidersResponse)
    )
)]
pub async fn list_providers(State(state): State<Arc<AppState>>) -> Json<ProvidersResponse> {
    let config = state.extractor.config();
    let has_default_key = config.default_api_key().is_some();

    let providers = providers()
        .into_iter()
        .map(|metadata| {
            let (model, server_key_configured) = match metadata.kind {
                ProviderKind::Primary => (config.google.model.clone(), has_default_key),
                ProviderKind::Secondary => (config.openrouter.model.clone(), false),
            };
            ProviderStatus {
                name: metadata.name,
                kind: metadata.kind.to_string(),
                display_name: metadata.display_name,
                description: metadata.description,
                model,
                structured_output: metadata.structured_output,
                model_doc_link: metadata.model_doc_link,
                server_key_configured,
            }
        })
        .collect();

    Json(ProvidersResponse {
        providers,
        rate_limit: RateLimitStatus {
            max_requests: config.rate_limit.max_requests,
            window_secs: config.rate_limit.window_secs,
        },
    })
}

pub fn routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/providers", get(list_providers))
        .with_state(state)
}
