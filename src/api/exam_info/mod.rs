mod handlers;

use axum::{routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new().route("/info", post(handlers::exam_info))
}
