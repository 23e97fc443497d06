use std::time::Duration;

use axum::http::header::{HeaderValue, ACCEPT, CONTENT_TYPE, ORIGIN};
use axum::http::{HeaderName, Method, Request, Response};
use axum::routing::get;
use axum::Router;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::normalize_path::NormalizePathLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::{DefaultOnRequest, MakeSpan, OnResponse, TraceLayer};
use tracing::Span;

use crate::api::{exam_info, handlers};
use crate::core::config::CorsSettings;
use crate::core::metrics;
use crate::core::state::AppState;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

pub(crate) fn router(state: AppState) -> Router {
    let settings = state.settings();

    let mut routes: Router<AppState> = Router::new()
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz).head(handlers::healthz))
        .nest("/exam", exam_info::router());
    if settings.telemetry().prometheus_enabled {
        routes = routes.route("/metrics", get(handlers::metrics));
    }

    routes
        .layer(NormalizePathLayer::trim_trailing_slash())
        .layer(PropagateRequestIdLayer::new(REQUEST_ID))
        .layer(SetRequestIdLayer::new(REQUEST_ID, MakeRequestUuid))
        .layer(trace_layer())
        .layer(cors_layer(settings.cors()))
        .with_state(state)
}

type HttpTraceLayer =
    TraceLayer<SharedClassifier<ServerErrorsAsFailures>, RequestSpan, DefaultOnRequest, Recorder>;

fn trace_layer() -> HttpTraceLayer {
    TraceLayer::new_for_http().make_span_with(RequestSpan).on_response(Recorder)
}

/// One span per request, tagged with the id set by `SetRequestIdLayer`.
#[derive(Clone, Copy)]
struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let request_id =
            request.headers().get(&REQUEST_ID).and_then(|value| value.to_str().ok()).unwrap_or("-");
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id
        )
    }
}

#[derive(Clone, Copy)]
struct Recorder;

impl<B> OnResponse<B> for Recorder {
    fn on_response(self, response: &Response<B>, latency: Duration, _span: &Span) {
        metrics::record_http(response.status().as_u16(), latency);
    }
}

fn cors_layer(cors: &CorsSettings) -> CorsLayer {
    let origins: Vec<HeaderValue> =
        cors.origins.iter().filter_map(|origin| origin.parse().ok()).collect();

    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::HEAD, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT, ORIGIN, REQUEST_ID])
        .expose_headers([REQUEST_ID])
        .max_age(Duration::from_secs(3600));

    // Credentials cannot be combined with a wildcard origin.
    if origins.is_empty() {
        layer.allow_origin(Any)
    } else {
        layer.allow_credentials(true).allow_origin(AllowOrigin::list(origins))
    }
}
