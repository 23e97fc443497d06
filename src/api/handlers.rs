use std::collections::BTreeMap;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::core::metrics;
use crate::core::redis::RedisHealth;
use crate::core::state::AppState;
use crate::schemas::{HealthResponse, RootResponse};

pub(crate) async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let api = state.settings().api();
    Json(RootResponse {
        message: api.project_name.clone(),
        version: api.version.clone(),
        exam_info_url: "/exam/info".to_string(),
        exams_loaded: state.catalog().len(),
    })
}

/// Ordered so the worst component decides the overall status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Status {
    Healthy,
    Degraded,
    Unhealthy,
}

impl Status {
    fn as_str(self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        }
    }
}

/// Redis is optional: a missing connection is reported but stays healthy,
/// a failing one degrades. A failing record store is fatal.
pub(crate) async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let redis = match state.redis().health().await {
        RedisHealth::Healthy => (Status::Healthy, "healthy".to_string()),
        RedisHealth::Disconnected => (Status::Healthy, "disconnected".to_string()),
        RedisHealth::Unhealthy(error) => (Status::Degraded, format!("unhealthy: {error}")),
    };
    let database = match state.records().ping().await {
        Ok(()) => (Status::Healthy, "healthy".to_string()),
        Err(err) => (Status::Unhealthy, format!("unhealthy: {err}")),
    };

    let status = redis.0.max(database.0);
    let components = BTreeMap::from([("redis", redis.1), ("database", database.1)]);

    Json(HealthResponse { service: "examtrack", status: status.as_str(), components })
}

pub(crate) async fn metrics(State(state): State<AppState>) -> Response {
    if !state.settings().telemetry().prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    let Some(body) = metrics::render() else {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    };
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body).into_response()
}
