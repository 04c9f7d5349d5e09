//! HTTP middleware stack for the agent's local control API.
//!
//! Middleware ordering follows the outer-to-inner convention: the first layer listed is the
//! outermost (processes the request first on the way in, the response last on the way out).

use axum::http::header::HeaderName;
use axum::http::{Method, StatusCode};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// The composed Tower layer type produced by [`build_http_layers`].
type HttpLayers = tower::layer::util::Stack<
    PropagateRequestIdLayer,
    tower::layer::util::Stack<
        TimeoutLayer,
        tower::layer::util::Stack<
            CorsLayer,
            tower::layer::util::Stack<
                CompressionLayer,
                tower::layer::util::Stack<
                    TraceLayer<
                        tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>,
                    >,
                    tower::layer::util::Stack<SetRequestIdLayer<MakeRequestUuid>, tower::layer::util::Identity>,
                >,
            >,
        >,
    >,
>;

/// Builds the Tower middleware stack applied to every control-API request.
///
/// Outermost to innermost: `SetRequestId` -> `Tracing` -> `Compression` -> `CORS` -> `Timeout` ->
/// `PropagateRequestId`. CORS is wide open: the embedding application's own UI (often a
/// `file://` or dev-server origin) is the only expected caller, and this API never leaves
/// loopback.
#[must_use]
pub fn build_http_layers() -> HttpLayers {
    let x_request_id = HeaderName::from_static("x-request-id");

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(x_request_id))
        .into_inner()
}
