use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::ExamRecord;

pub(crate) const ACTION_LOAD: &str = "load";
pub(crate) const ACTION_SAVE: &str = "save";

/// Body of `POST /exam/info`. `action` stays a plain string so an unknown
/// value can be answered with "Invalid action." instead of a parse error.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamInfoRequest {
    #[serde(default)]
    pub(crate) action: String,
    #[serde(default, rename = "examID")]
    pub(crate) exam_id: Option<String>,
    #[serde(default, rename = "studentIDNumber")]
    pub(crate) student_id_number: Option<String>,
    #[serde(default)]
    #[validate(range(min = 1, message = "pageNumber must be at least 1"))]
    pub(crate) page_number: Option<i32>,
    #[serde(default)]
    pub(crate) answers: Option<Map<String, Value>>,
    #[serde(default)]
    #[validate(range(min = 0, message = "tabSwitchCount must be non-negative"))]
    pub(crate) tab_switch_count: Option<i64>,
    #[serde(default)]
    #[validate(length(max = 1000, message = "too many tabSwitchTimestamps"))]
    pub(crate) tab_switch_timestamps: Option<Vec<String>>,
    #[serde(default)]
    pub(crate) completed: Option<bool>,
    #[serde(default)]
    #[validate(length(max = 100, message = "firstName is too long"))]
    pub(crate) first_name: Option<String>,
    #[serde(default)]
    #[validate(length(max = 100, message = "lastName is too long"))]
    pub(crate) last_name: Option<String>,
    #[serde(default)]
    #[validate(email(message = "email is not a valid address"))]
    pub(crate) email: Option<String>,
    #[serde(default)]
    #[validate(length(max = 64, message = "section is too long"))]
    pub(crate) section: Option<String>,
    #[serde(default)]
    #[validate(length(max = 64, message = "examCode is too long"))]
    pub(crate) exam_code: Option<String>,
}

/// Student-facing view of a record. Scores and the replay fingerprint stay
/// server-side.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ExamRecordView {
    #[serde(rename = "examID")]
    pub(crate) exam_id: String,
    #[serde(rename = "studentIDNumber")]
    pub(crate) student_id_number: String,
    pub(crate) first_name: Option<String>,
    pub(crate) last_name: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) section: Option<String>,
    pub(crate) exam_code: Option<String>,
    pub(crate) answers: Map<String, Value>,
    pub(crate) page_number: i32,
    pub(crate) tab_switch_count: i64,
    pub(crate) tab_switch_timestamps: Vec<String>,
    pub(crate) completed: bool,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl From<ExamRecord> for ExamRecordView {
    fn from(record: ExamRecord) -> Self {
        let completed = record.is_completed();
        Self {
            exam_id: record.exam_id,
            student_id_number: record.student_id_number,
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email,
            section: record.section,
            exam_code: record.exam_code,
            answers: record.answers.0,
            page_number: record.page_number,
            tab_switch_count: record.tab_switch_count,
            tab_switch_timestamps: record.tab_switch_timestamps.0,
            completed,
            created_at: format_primitive(record.created_at),
            updated_at: format_primitive(record.updated_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct LoadResponse {
    pub(crate) success: bool,
    pub(crate) data: ExamRecordView,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SaveResponse {
    pub(crate) success: bool,
    pub(crate) message: String,
    pub(crate) updated_at: String,
}
