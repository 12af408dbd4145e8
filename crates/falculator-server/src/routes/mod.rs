pub mod errors;
pub mod extract;
pub mod providers;
pub mod status;

use std::sync::Arc;

use axum::http::{header, HeaderName, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn configure(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(status::routes())
        .merge(crate::openapi::routes())
        .merge(providers::routes(state.clone()))
        .merge(extract::routes(state))
}

/// Browser clients call from any origin and send their own key headers.
pub fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("x-client-info"),
            HeaderName::from_static("apikey"),
            HeaderName::from_static(extract::GEMINI_KEY_HEADER),
            HeaderName::from_static(extract::PROVIDER_KEY_HEADER),
        ])
}

/// The full application as served: routes plus CORS and request tracing.
pub fn app(state: Arc<AppState>) -> Router {
    configure(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors())
}
