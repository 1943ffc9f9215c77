//! Tower layers wrapped around every route.
//!
//! Outermost first: request id assignment, tracing, gzip compression, CORS,
//! timeout, then request id propagation onto the response.

use axum::http::header::HeaderName;
use axum::http::{HeaderValue, Method, StatusCode};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{AllowHeaders, AllowOrigin, Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::config::{CorsConfig, NetworkConfig};

/// Header carrying the per-request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

const ALLOWED_METHODS: [Method; 6] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::PATCH,
    Method::DELETE,
    Method::OPTIONS,
];

/// Wraps `router` in the HTTP middleware stack.
///
/// Requests exceeding `config.request_timeout` are answered with 408.
/// Authentication is not a layer: handlers that need a caller extract
/// [`CurrentUser`](crate::auth::CurrentUser).
#[must_use]
pub fn with_http_layers<S>(router: Router<S>, config: &NetworkConfig) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    router.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(CompressionLayer::new())
            .layer(cors_layer(&config.cors))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                config.request_timeout,
            ))
            .layer(PropagateRequestIdLayer::new(request_id)),
    )
}

/// CORS policy for the configured origins.
///
/// `"*"` allows any origin. Browsers refuse a literal wildcard on
/// credentialed requests, so with credentials on the wildcard mirrors the
/// request's origin and headers instead.
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let wildcard = config.origins.iter().any(|o| o == "*");
    let layer = CorsLayer::new().allow_methods(ALLOWED_METHODS);

    match (wildcard, config.allow_credentials) {
        (true, true) => layer
            .allow_origin(AllowOrigin::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true),
        (false, true) => layer
            .allow_origin(header_values(&config.origins))
            .allow_headers(AllowHeaders::mirror_request())
            .allow_credentials(true),
        (true, false) => layer.allow_origin(Any).allow_headers(Any),
        (false, false) => layer
            .allow_origin(header_values(&config.origins))
            .allow_headers(Any),
    }
}

fn header_values(origins: &[String]) -> Vec<HeaderValue> {
    origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(%origin, "ignoring unparsable CORS origin");
                None
            }
        })
        .collect()
}
