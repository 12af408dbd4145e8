use crate::routes::errors::{ErrorBody, ErrorResponse};
use crate::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, DefaultBodyLimit, State},
    http::{Extensions, HeaderMap},
    routing::post,
    Json, Router,
};
use falculator::extraction::{CallerIdentity, ExtractionRequest};
use falculator::image::{ImageError, ImagePayload};
use falculator::pricing::cost::{CostBreakdown, DEFAULT_BUDGET};
use falculator::providers::ProviderKind;
use serde::Deserialize;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use utoipa::ToSchema;

/// Header carrying a caller's own Gemini key.
pub const GEMINI_KEY_HEADER: &str = "x-gemini-key";
/// Provider-neutral alternative to [`GEMINI_KEY_HEADER`].
pub const PROVIDER_KEY_HEADER: &str = "x-provider-key";

/// Room for the JSON envelope and a `data:` URL prefix around the image.
const ENVELOPE_HEADROOM: usize = 64 * 1024;

/// Largest request body worth buffering: the base64 form of the biggest
/// accepted image plus the envelope. Anything between this and the image
/// limit is rejected by the image check with a precise message.
pub fn body_limit(max_image_bytes: usize) -> usize {
    max_image_bytes
        .div_ceil(3)
        .saturating_mul(4)
        .saturating_add(ENVELOPE_HEADROOM)
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(default)]
pub struct ExtractRequest {
    /// Base64 screenshot, or a `data:image/...;base64,` URL
    pub image: Option<String>,
    /// `primary` (default) or `secondary`; secondary requires a caller key
    pub provider: Option<String>,
    /// Caller's own provider key; lifts the shared rate limit
    pub api_key: Option<String>,
    /// Attach per-resolution costs and the $10 budget figures
    pub include_breakdown: bool,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

fn caller_identity(headers: &HeaderMap, extensions: &Extensions) -> CallerIdentity {
    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    CallerIdentity::resolve(
        header_str(headers, "x-forwarded-for"),
        header_str(headers, "x-real-ip"),
        peer,
    )
}

/// Body key first, then the provider-neutral header, then the Gemini header.
fn credential(body: Option<String>, headers: &HeaderMap) -> Option<String> {
    body.or_else(|| header_str(headers, PROVIDER_KEY_HEADER).map(str::to_string))
        .or_else(|| header_str(headers, GEMINI_KEY_HEADER).map(str::to_string))
}

async fn handle_extract(
    state: Arc<AppState>,
    headers: HeaderMap,
    extensions: Extensions,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<Value>, ErrorResponse> {
    let Json(request) = payload?;

    let image = request
        .image
        .filter(|image| !image.trim().is_empty())
        .ok_or_else(|| ErrorResponse::bad_request(ImageError::Empty.to_string()))?;
    let max_bytes = state.extractor.config().max_image_bytes;
    let image = ImagePayload::from_base64(&image, max_bytes)
        .map_err(|e| ErrorResponse::bad_request(e.to_string()))?;

    let provider = request
        .provider
        .as_deref()
        .map(str::parse::<ProviderKind>)
        .transpose()
        .map_err(ErrorResponse::bad_request)?;

    let extraction_request = ExtractionRequest::new(image)
        .with_credential(credential(request.api_key, &headers))
        .with_provider(provider)
        .with_caller(caller_identity(&headers, &extensions));

    let record = state.extractor.extract(extraction_request).await?;

    let mut body = serde_json::to_value(&record)?;
    if request.include_breakdown {
        if let Value::Object(map) = &mut body {
            map.insert(
                "breakdown".to_string(),
                serde_json::to_value(CostBreakdown::new(&record, DEFAULT_BUDGET))?,
            );
        }
    }
    Ok(Json(body))
}

#[utoipa::path(
    post,
    path = "/extract",
    request_body = ExtractRequest,
    params(
        ("x-gemini-key" = Option<String>, Header, description = "Caller's own Gemini API key"),
        ("x-provider-key" = Option<String>, Header, description = "Caller's own key for the selected provider"),
    ),
    responses(
        (status = 200, description = "Pricing record tagged with schema_version", body = Value),
        (status = 400, description = "Missing or invalid image", body = ErrorBody),
        (status = 401, description = "Provider rejected the API key", body = ErrorBody),
        (status = 422, description = "No pricing information found", body = ErrorBody),
        (status = 429, description = "Shared rate limit exceeded", body = ErrorBody),
        (status = 500, description = "Server configuration error", body = ErrorBody),
        (status = 502, description = "Provider request failed", body = ErrorBody),
    )
)]
pub async fn extract(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    extensions: Extensions,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<Value>, ErrorResponse> {
    handle_extract(state, headers, extensions, payload).await
}

/// Same contract as `/extract`, under the path existing clients call.
#[utoipa::path(
    post,
    path = "/image-parser",
    request_body = ExtractRequest,
    responses(
        (status = 200, description = "Pricing record tagged with schema_version", body = Value),
        (status = 400, description = "Missing or invalid image", body = ErrorBody),
        (status = 422, description = "No pricing information found", body = ErrorBody),
        (status = 429, description = "Shared rate limit exceeded", body = ErrorBody),
    )
)]
pub async fn image_parser(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    extensions: Extensions,
    payload: Result<Json<ExtractRequest>, JsonRejection>,
) -> Result<Json<Value>, ErrorResponse> {
    handle_extract(state, headers, extensions, payload).await
}

pub fn routes(state: Arc<AppState>) -> Router {
    let limit = body_limit(state.extractor.config().max_image_bytes);
    Router::new()
        .route("/extract", post(extract))
        .route("/image-parser", post(image_parser))
        .layer(DefaultBodyLimit::max(limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::test_support::{scripted_state, scripted_state_with, Script};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
    use falculator::config::{ExtractorConfig, GoogleConfig};
    use serde_json::json;
    use tower::ServiceExt;

    const PNG_BASE64: &str = "iVBORw0KGgo=";

    /// Base64 of a PNG-headed blob of exactly `len` bytes.
    fn png_of_size(len: usize) -> String {
        let mut bytes = vec![0u8; len];
        bytes[..8].copy_from_slice(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
        BASE64.encode(bytes)
    }

    fn post_json(path: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "203.0.113.7")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_extract_returns_tagged_record_with_breakdown() {
        let (state, script) = scripted_state(Some("AIza-server"), vec![Script::rich_megapixel()]);
        let app = routes(state);

        let response = app
            .oneshot(post_json(
                "/extract",
                json!({"image": PNG_BASE64, "include_breakdown": true}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["schema_version"], "v2");
        assert_eq!(body["pricing_unit"], "PER_MEGAPIXEL");
        assert_eq!(body["breakdown"]["resolutions"][0]["runs_per_dollar"], 190);
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test]
    async fn test_multi_megabyte_screenshot_is_accepted() {
        let (state, script) = scripted_state(Some("AIza-server"), vec![Script::rich_megapixel()]);

        let response = routes(state)
            .oneshot(post_json(
                "/extract",
                json!({"image": png_of_size(3 * 1024 * 1024)}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(script.calls(), 1);
    }

    #[tokio::test]
    async fn test_image_over_configured_limit_is_too_large() {
        let max_image_bytes = 4 * 1024 * 1024;
        let config = ExtractorConfig {
            google: GoogleConfig {
                api_key: Some("AIza-server".to_string()),
                ..GoogleConfig::default()
            },
            max_image_bytes,
            ..ExtractorConfig::default()
        };
        let (state, script) = scripted_state_with(config, vec![Script::rich_megapixel()]);

        let response = routes(state)
            .oneshot(post_json(
                "/image-parser",
                json!({"image": png_of_size(max_image_bytes + 1)}),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let error = json_body(response).await["error"].as_str().unwrap().to_string();
        assert!(error.starts_with("Image too large"), "{}", error);
        assert_eq!(script.calls(), 0);
    }

    #[test]
    fn test_body_limit_covers_base64_image() {
        let max: usize = 20 * 1024 * 1024;
        let encoded_len = max.div_ceil(3) * 4;
        assert!(body_limit(max) > encoded_len);
        assert!(body_limit(max) < encoded_len + 1024 * 1024);
    }

    #[tokio::test]
    async fn test_missing_image_is_rejected_before_any_provider_call() {
        let (state, script) = scripted_state(Some("AIza-server"), vec![Script::rich_megapixel()]);
        let app = routes(state);

        let response = app
            .oneshot(post_json("/image-parser", json!({"image": ""})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(
            body["error"],
            "Missing or invalid 'image' field. Expected base64 string."
        );
        assert_eq!(script.calls(), 0);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let (state, _) = scripted_state(Some("AIza-server"), vec![]);
        let request = Request::builder()
            .method("POST")
            .uri("/extract")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = routes(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_provider_is_bad_request() {
        let (state, _) = scripted_state(Some("AIza-server"), vec![]);
        let response = routes(state)
            .oneshot(post_json(
                "/extract",
                json!({"image": PNG_BASE64, "provider": "tertiary"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_missing_server_key_is_configuration_error() {
        let (state, _) = scripted_state(None, vec![Script::rich_megapixel()]);
        let response = routes(state)
            .oneshot(post_json("/extract", json!({"image": PNG_BASE64})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(json_body(response).await["error"], "Server configuration error");
    }

    #[tokio::test]
    async fn test_header_credential_bypasses_quota() {
        let replies = (0..12).map(|_| Script::rich_megapixel()).collect();
        let (state, script) = scripted_state(None, replies);
        let app = routes(state.clone());

        for _ in 0..12 {
            let mut request = post_json("/extract", json!({"image": PNG_BASE64}));
            request
                .headers_mut()
                .insert(GEMINI_KEY_HEADER, "AIza-caller".parse().unwrap());
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(script.calls(), 12);
        assert!(state.rate_limiter().is_empty());
        assert!(script.keys().iter().all(|key| key == "AIza-caller"));
    }

    #[tokio::test]
    async fn test_anonymous_quota_returns_429() {
        let replies = (0..11).map(|_| Script::rich_megapixel()).collect();
        let (state, _) = scripted_state(Some("AIza-server"), replies);
        let app = routes(state);

        for _ in 0..10 {
            let response = app
                .clone()
                .oneshot(post_json("/extract", json!({"image": PNG_BASE64})))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(post_json("/extract", json!({"image": PNG_BASE64})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
    }

    #[tokio::test]
    async fn test_exhausted_contracts_return_422() {
        let (state, script) = scripted_state(
            Some("AIza-server"),
            vec![Script::no_json(), Script::no_json()],
        );
        let response = routes(state)
            .oneshot(post_json("/extract", json!({"image": PNG_BASE64})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(script.calls(), 2);
    }

    #[test]
    fn test_credential_precedence() {
        let mut headers = HeaderMap::new();
        headers.insert(GEMINI_KEY_HEADER, "AIza-gemini".parse().unwrap());
        headers.insert(PROVIDER_KEY_HEADER, "sk-provider".parse().unwrap());

        assert_eq!(
            credential(Some("from-body".to_string()), &headers).as_deref(),
            Some("from-body")
        );
        assert_eq!(credential(None, &headers).as_deref(), Some("sk-provider"));
        headers.remove(PROVIDER_KEY_HEADER);
        assert_eq!(credential(None, &headers).as_deref(), Some("AIza-gemini"));
    }
}
