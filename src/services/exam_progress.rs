use crate::core::metrics;
use crate::core::state::AppState;
use crate::core::time::primitive_now_utc;
use crate::db::models::ExamRecord;
use crate::repositories::exam_records::StoreError;
use crate::services::record_merge::{self, MergeOutcome, MergePolicy, RecordKey, SaveCommand};

pub(crate) async fn load(
    state: &AppState,
    key: &RecordKey,
) -> Result<Option<ExamRecord>, StoreError> {
    state.records().find(key).await
}

/// Merges `command` into the stored record under the per-key lock and
/// rescores it against the exam's answer key.
pub(crate) async fn save(
    state: &AppState,
    command: &SaveCommand,
) -> Result<MergeOutcome, StoreError> {
    let policy =
        MergePolicy { enforce_completed_lock: state.settings().exam().enforce_completed_lock };
    let catalog = state.catalog();

    let merge = |existing: Option<ExamRecord>| {
        record_merge::apply(existing, command, &policy, catalog, primitive_now_utc())
    };
    let outcome = state.records().save_with(&command.key, &merge).await?;

    if !matches!(outcome, MergeOutcome::Replayed(_)) {
        metrics::record_tab_switches(
            &command.key.exam_id,
            u64::try_from(command.tab_switch_delta).unwrap_or(0),
        );
    }

    let record = outcome.record();
    tracing::info!(
        exam_id = %record.exam_id,
        student_id_number = %record.student_id_number,
        outcome = outcome.label(),
        page_number = record.page_number,
        tab_switch_count = record.tab_switch_count,
        completed = record.completed,
        "Exam record saved"
    );

    Ok(outcome)
}
