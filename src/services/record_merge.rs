//! Additive merge of a save request into an exam record.
//!
//! `apply` is pure: the store hands it the current row (if any) under a per-key
//! lock and writes back whatever it returns.

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use sqlx::types::Json;
use time::PrimitiveDateTime;

use crate::db::models::{answers_mark_completed, ExamRecord};
use crate::services::exam_catalog::ExamCatalog;

/// Identity captured on the first save. Later values are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct StudentIdentity {
    pub(crate) first_name: Option<String>,
    pub(crate) last_name: Option<String>,
    pub(crate) email: Option<String>,
    pub(crate) section: Option<String>,
    pub(crate) exam_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct RecordKey {
    pub(crate) exam_id: String,
    pub(crate) student_id_number: String,
}

impl RecordKey {
    pub(crate) fn new(exam_id: impl Into<String>, student_id_number: impl Into<String>) -> Self {
        Self { exam_id: exam_id.into(), student_id_number: student_id_number.into() }
    }
}

/// A validated save request.
#[derive(Debug, Clone)]
pub(crate) struct SaveCommand {
    pub(crate) key: RecordKey,
    pub(crate) identity: StudentIdentity,
    pub(crate) page_number: Option<i32>,
    pub(crate) answers: Map<String, Value>,
    /// Tab switches observed since the last acknowledged save. Never negative.
    pub(crate) tab_switch_delta: i64,
    pub(crate) tab_switch_timestamps: Vec<String>,
    pub(crate) completed: bool,
}

impl SaveCommand {
    /// SHA-256 over the mutating part of the payload. Identity is excluded
    /// because it cannot change an existing record.
    pub(crate) fn fingerprint(&self) -> String {
        let canonical = json!({
            "pageNumber": self.page_number,
            "answers": self.answers,
            "tabSwitchDelta": self.tab_switch_delta,
            "tabSwitchTimestamps": self.tab_switch_timestamps,
            "completed": self.completed,
        });
        hex::encode(Sha256::digest(canonical.to_string().as_bytes()))
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct MergePolicy {
    pub(crate) enforce_completed_lock: bool,
}

impl Default for MergePolicy {
    fn default() -> Self {
        Self { enforce_completed_lock: true }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum MergeOutcome {
    Inserted(ExamRecord),
    Updated(ExamRecord),
    /// Same payload as the last applied save; nothing to write.
    Replayed(ExamRecord),
}

impl MergeOutcome {
    pub(crate) fn record(&self) -> &ExamRecord {
        match self {
            Self::Inserted(record) | Self::Updated(record) | Self::Replayed(record) => record,
        }
    }

    pub(crate) fn into_record(self) -> ExamRecord {
        match self {
            Self::Inserted(record) | Self::Updated(record) | Self::Replayed(record) => record,
        }
    }

    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::Inserted(_) => "inserted",
            Self::Updated(_) => "updated",
            Self::Replayed(_) => "replayed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub(crate) enum MergeRejection {
    #[error("This exam has already been submitted and can no longer be changed.")]
    Completed,
}

pub(crate) fn apply(
    existing: Option<ExamRecord>,
    command: &SaveCommand,
    policy: &MergePolicy,
    catalog: &ExamCatalog,
    now: PrimitiveDateTime,
) -> Result<MergeOutcome, MergeRejection> {
    let fingerprint = command.fingerprint();

    let Some(mut record) = existing else {
        return Ok(MergeOutcome::Inserted(insert(command, catalog, fingerprint, now)));
    };

    if record.last_save_fingerprint.as_deref() == Some(fingerprint.as_str()) {
        return Ok(MergeOutcome::Replayed(record));
    }

    if policy.enforce_completed_lock && record.is_completed() {
        return Err(MergeRejection::Completed);
    }

    for (key, value) in &command.answers {
        record.answers.0.insert(key.clone(), value.clone());
    }
    if let Some(page_number) = command.page_number {
        record.page_number = page_number;
    }
    record.tab_switch_count = record.tab_switch_count.saturating_add(command.tab_switch_delta);
    record.tab_switch_timestamps.0.extend(command.tab_switch_timestamps.iter().cloned());
    record.completed =
        record.completed || command.completed || answers_mark_completed(&record.answers);
    record.scores = Json(catalog.score(&record.exam_id, &record.answers));
    record.last_save_fingerprint = Some(fingerprint);
    record.updated_at = now;

    Ok(MergeOutcome::Updated(record))
}

fn insert(
    command: &SaveCommand,
    catalog: &ExamCatalog,
    fingerprint: String,
    now: PrimitiveDateTime,
) -> ExamRecord {
    let identity = command.identity.clone();
    let answers = command.answers.clone();
    let completed = command.completed || answers_mark_completed(&answers);

    ExamRecord {
        exam_id: command.key.exam_id.clone(),
        student_id_number: command.key.student_id_number.clone(),
        first_name: identity.first_name,
        last_name: identity.last_name,
        email: identity.email,
        section: identity.section,
        exam_code: identity.exam_code,
        scores: Json(catalog.score(&command.key.exam_id, &answers)),
        answers: Json(answers),
        page_number: command.page_number.unwrap_or(0),
        tab_switch_count: command.tab_switch_delta,
        tab_switch_timestamps: Json(command.tab_switch_timestamps.clone()),
        completed,
        last_save_fingerprint: Some(fingerprint),
        created_at: now,
        updated_at: now,
    }
}
