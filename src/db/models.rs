use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::services::scoring::PartScore;

/// One student's progress through one exam. Keyed by `(exam_id, student_id_number)`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct ExamRecord {
    pub(crate) exam_id: String,
    pub(crate) student_id_number: String,
    pub(crate) first_name: Option<String>,
    pub(crate) last_name: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) section: Option<String>,
    pub(crate) exam_code: Option<String>,
    pub(crate) answers: Json<Map<String, Value>>,
    pub(crate) scores: Json<BTreeMap<u32, PartScore>>,
    pub(crate) page_number: i32,
    pub(crate) tab_switch_count: i64,
    pub(crate) tab_switch_timestamps: Json<Vec<String>>,
    pub(crate) completed: bool,
    pub(crate) last_save_fingerprint: Option<String>,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl ExamRecord {
    /// `true` once the record is completed or its answers carry `completed: true`.
    pub(crate) fn is_completed(&self) -> bool {
        self.completed || answers_mark_completed(&self.answers)
    }
}

pub(crate) fn answers_mark_completed(answers: &Map<String, Value>) -> bool {
    matches!(answers.get("completed"), Some(Value::Bool(true)))
}
