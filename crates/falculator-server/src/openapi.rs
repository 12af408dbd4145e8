use axum::{routing::get, Json, Router};
use utoipa::OpenApi;

use crate::routes::errors::ErrorBody;
use crate::routes::extract::ExtractRequest;
use crate::routes::providers::{ProviderStatus, ProvidersResponse, RateLimitStatus};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "falculator-server",
        description = "Extracts normalized pricing records from model pricing screenshots"
    ),
    paths(
        crate::routes::status::status,
        crate::routes::extract::extract,
        crate::routes::extract::image_parser,
        crate::routes::providers::list_providers,
    ),
    components(schemas(
        ErrorBody,
        ExtractRequest,
        ProviderStatus,
        ProvidersResponse,
        RateLimitStatus,
    ))
)]
pub struct ApiDoc;

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

pub fn routes() -> Router {
    Router::new().route("/openapi.json", get(openapi_json))
}
