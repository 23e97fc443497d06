use async_trait::async_trait;
use sqlx::PgPool;

use crate::db::models::ExamRecord;
use crate::services::record_merge::{MergeOutcome, MergeRejection, RecordKey};

pub(crate) const COLUMNS: &str = "\
    exam_id, student_id_number, first_name, last_name, email, section, exam_code, \
    answers, scores, page_number, tab_switch_count, tab_switch_timestamps, completed, \
    last_save_fingerprint, created_at, updated_at";

#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("exam record store is unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),
    #[error(transparent)]
    Rejected(#[from] MergeRejection),
    #[error("exam record query failed: {0}")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::WorkerCrashed => Self::Unavailable(err),
            other => Self::Database(other),
        }
    }
}

/// Merge step run against the locked row. Returning `Replayed` skips the write.
pub(crate) type MergeFn<'a> =
    dyn Fn(Option<ExamRecord>) -> Result<MergeOutcome, MergeRejection> + Send + Sync + 'a;

#[async_trait]
pub(crate) trait ExamRecordStore: Send + Sync {
    async fn find(&self, key: &RecordKey) -> Result<Option<ExamRecord>, StoreError>;

    /// Reads the current record, applies `merge` and upserts the result as one
    /// atomic step per key.
    async fn save_with(
        &self,
        key: &RecordKey,
        merge: &MergeFn<'_>,
    ) -> Result<MergeOutcome, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub(crate) struct PgExamRecordStore {
    pool: PgPool,
}

impl PgExamRecordStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExamRecordStore for PgExamRecordStore {
    async fn find(&self, key: &RecordKey) -> Result<Option<ExamRecord>, StoreError> {
        Ok(find(&self.pool, key).await?)
    }

    async fn save_with(
        &self,
        key: &RecordKey,
        merge: &MergeFn<'_>,
    ) -> Result<MergeOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent first saves, which have no row to lock yet.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(lock_key(key))
            .execute(&mut *tx)
            .await?;

        let existing = sqlx::query_as::<_, ExamRecord>(&format!(
            "SELECT {COLUMNS}
             FROM exam_records
             WHERE exam_id = $1 AND student_id_number = $2
             FOR UPDATE"
        ))
        .bind(&key.exam_id)
        .bind(&key.student_id_number)
        .fetch_optional(&mut *tx)
        .await?;

        let outcome = merge(existing)?;
        if !matches!(outcome, MergeOutcome::Replayed(_)) {
            upsert(&mut *tx, outcome.record()).await?;
        }

        tx.commit().await?;
        Ok(outcome)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

pub(crate) async fn find(
    executor: impl sqlx::PgExecutor<'_>,
    key: &RecordKey,
) -> Result<Option<ExamRecord>, sqlx::Error> {
    sqlx::query_as::<_, ExamRecord>(&format!(
        "SELECT {COLUMNS} FROM exam_records WHERE exam_id = $1 AND student_id_number = $2"
    ))
    .bind(&key.exam_id)
    .bind(&key.student_id_number)
    .fetch_optional(executor)
    .await
}

/// Identity columns and `created_at` are only written by the INSERT branch.
pub(crate) async fn upsert(
    executor: impl sqlx::PgExecutor<'_>,
    record: &ExamRecord,
) -> Result<(), sqlx::Error> {
    sqlx::query(&format!(
        "INSERT INTO exam_records ({COLUMNS})
         VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
         ON CONFLICT (exam_id, student_id_number) DO UPDATE
         SET answers = EXCLUDED.answers,
             scores = EXCLUDED.scores,
             page_number = EXCLUDED.page_number,
             tab_switch_count = EXCLUDED.tab_switch_count,
             tab_switch_timestamps = EXCLUDED.tab_switch_timestamps,
             completed = exam_records.completed OR EXCLUDED.completed,
             last_save_fingerprint = EXCLUDED.last_save_fingerprint,
             updated_at = EXCLUDED.updated_at"
    ))
    .bind(&record.exam_id)
    .bind(&record.student_id_number)
    .bind(&record.first_name)
    .bind(&record.last_name)
    .bind(&record.email)
    .bind(&record.section)
    .bind(&record.exam_code)
    .bind(&record.answers)
    .bind(&record.scores)
    .bind(record.page_number)
    .bind(record.tab_switch_count)
    .bind(&record.tab_switch_timestamps)
    .bind(record.completed)
    .bind(&record.last_save_fingerprint)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(executor)
    .await?;
    Ok(())
}

fn lock_key(key: &RecordKey) -> String {
    format!("exam_records:{}:{}", key.exam_id, key.student_id_number)
}
