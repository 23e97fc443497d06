use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::validation::{
    validate_answers, validate_exam_id, validate_student_id_number, validate_tab_switch_timestamps,
};
use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::format_primitive;
use crate::schemas::exam_record::{
    ExamInfoRequest, LoadResponse, SaveResponse, ACTION_LOAD, ACTION_SAVE,
};
use crate::services::exam_progress;
use crate::services::record_merge::{MergeOutcome, RecordKey, SaveCommand, StudentIdentity};

/// `POST /exam/info`: dispatches on `action`.
pub(in crate::api::exam_info) async fn exam_info(
    State(state): State<AppState>,
    payload: Result<Json<ExamInfoRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            metrics::record_exam_info("unknown", "invalid");
            return Err(ApiError::BadRequest(rejection.body_text()));
        }
    };

    let action = match payload.action.trim() {
        ACTION_LOAD => ACTION_LOAD,
        ACTION_SAVE => ACTION_SAVE,
        _ => "unknown",
    };
    let result = match action {
        ACTION_LOAD => load(&state, payload).await.map(IntoResponse::into_response),
        ACTION_SAVE => save(&state, payload).await.map(IntoResponse::into_response),
        _ => Err(ApiError::BadRequest("Invalid action.".to_string())),
    };

    metrics::record_exam_info(action, outcome_label(&result));
    result
}

async fn load(
    state: &AppState,
    payload: ExamInfoRequest,
) -> Result<Json<LoadResponse>, ApiError> {
    let key = record_key(&payload)?;

    match exam_progress::load(state, &key).await? {
        Some(record) => Ok(Json(LoadResponse { success: true, data: record.into() })),
        None => Err(ApiError::NotFound("No saved progress for this exam yet.".to_string())),
    }
}

async fn save(
    state: &AppState,
    payload: ExamInfoRequest,
) -> Result<Json<SaveResponse>, ApiError> {
    let key = record_key(&payload)?;
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let answers = payload.answers.unwrap_or_default();
    validate_answers(&answers)?;
    let tab_switch_timestamps = payload.tab_switch_timestamps.unwrap_or_default();
    validate_tab_switch_timestamps(&tab_switch_timestamps)?;

    let per_minute = state.settings().exam().save_rate_limit_per_minute;
    if !state.redis().allow_save(&key.exam_id, &key.student_id_number, per_minute).await {
        return Err(ApiError::TooManyRequests(
            "Too many saves in a short time. Please wait a moment and try again.",
        ));
    }

    let command = SaveCommand {
        key,
        identity: StudentIdentity {
            first_name: non_blank(payload.first_name),
            last_name: non_blank(payload.last_name),
            email: non_blank(payload.email),
            section: non_blank(payload.section),
            exam_code: non_blank(payload.exam_code),
        },
        page_number: payload.page_number,
        answers,
        tab_switch_delta: payload.tab_switch_count.unwrap_or(0),
        tab_switch_timestamps,
        completed: payload.completed.unwrap_or(false),
    };

    let outcome = exam_progress::save(state, &command).await?;
    let message = match outcome {
        MergeOutcome::Replayed(_) => "Progress already saved.",
        MergeOutcome::Inserted(_) | MergeOutcome::Updated(_) => "Progress saved.",
    };

    Ok(Json(SaveResponse {
        success: true,
        message: message.to_string(),
        updated_at: format_primitive(outcome.record().updated_at),
    }))
}

fn record_key(payload: &ExamInfoRequest) -> Result<RecordKey, ApiError> {
    let exam_id = validate_exam_id(payload.exam_id.as_deref())?;
    let student_id_number = validate_student_id_number(payload.student_id_number.as_deref())?;
    Ok(RecordKey::new(exam_id, student_id_number))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

fn outcome_label(result: &Result<Response, ApiError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(ApiError::BadRequest(_)) => "invalid",
        Err(ApiError::NotFound(_)) => "not_found",
        Err(ApiError::Conflict(_)) => "conflict",
        Err(ApiError::TooManyRequests(_)) => "rate_limited",
        Err(ApiError::ServiceUnavailable(_)) => "unavailable",
        Err(ApiError::Internal(_)) => "error",
    }
}
