use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Local copy of in-progress answers for one exam. Used for crash and reload
/// recovery only; the server record wins whenever it is reachable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CachedProgress {
    pub student_id_number: String,
    pub answers: Map<String, Value>,
    #[serde(default)]
    pub page_number: Option<i32>,
    /// Bumped on every local edit.
    #[serde(default)]
    pub revision: u64,
    /// Highest revision the server has acknowledged.
    #[serde(default)]
    pub synced_revision: u64,
    /// RFC 3339 time of the last acknowledged save.
    #[serde(default)]
    pub last_saved_at: Option<String>,
}

impl CachedProgress {
    pub fn has_unsynced_edits(&self) -> bool {
        self.revision > self.synced_revision
    }
}

/// Durable per-exam cache: one JSON file per exam under `dir`.
#[derive(Debug, Clone)]
pub struct AnswerCache {
    dir: PathBuf,
}

impl AnswerCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Missing or unreadable entries read as `None`.
    pub async fn read(&self, exam_id: &str) -> Option<CachedProgress> {
        let path = self.path_for(exam_id);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to read answer cache");
                return None;
            }
        };

        match serde_json::from_slice(&raw) {
            Ok(progress) => Some(progress),
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Discarding corrupt cache");
                None
            }
        }
    }

    /// Writes through a temp file and a rename so a crash never leaves a torn entry.
    pub async fn write(&self, exam_id: &str, progress: &CachedProgress) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let bytes = serde_json::to_vec(progress)?;
        let tmp = self.dir.join(format!(".{}.tmp", Uuid::new_v4().simple()));
        let written = match tokio::fs::write(&tmp, bytes).await {
            Ok(()) => tokio::fs::rename(&tmp, self.path_for(exam_id)).await,
            Err(err) => Err(err),
        };
        if written.is_err() {
            if let Err(err) = tokio::fs::remove_file(&tmp).await {
                tracing::debug!(path = %tmp.display(), error = %err, "Temp cache file not removed");
            }
        }
        written
    }

    pub async fn clear(&self, exam_id: &str) -> std::io::Result<()> {
        match tokio::fs::remove_file(self.path_for(exam_id)).await {
            Err(err) if err.kind() != std::io::ErrorKind::NotFound => Err(err),
            _ => Ok(()),
        }
    }

    fn path_for(&self, exam_id: &str) -> PathBuf {
        let name: String = exam_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("exam-{name}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_cache() -> AnswerCache {
        AnswerCache::new(std::env::temp_dir().join(format!("examtrack-cache-{}", Uuid::new_v4())))
    }

    fn progress() -> CachedProgress {
        CachedProgress {
            student_id_number: "12345678".to_string(),
            answers: json!({"p1q1": "B"}).as_object().cloned().unwrap(),
            page_number: Some(1),
            revision: 3,
            synced_revision: 2,
            last_saved_at: Some("2025-05-14T08:00:00Z".to_string()),
        }
    }

    #[tokio::test]
    async fn write_then_read_returns_latest_entry() {
        let cache = temp_cache();
        assert!(cache.read("dsalgo1-finals").await.is_none());

        cache.write("dsalgo1-finals", &progress()).await.expect("write");
        let mut newer = progress();
        newer.revision = 4;
        cache.write("dsalgo1-finals", &newer).await.expect("write");

        let read = cache.read("dsalgo1-finals").await.expect("cached");
        assert_eq!(read, newer);
        assert!(read.has_unsynced_edits());
        assert!(cache.read("other-exam").await.is_none());
    }

    #[tokio::test]
    async fn corrupt_entry_reads_as_missing() {
        let cache = temp_cache();
        tokio::fs::create_dir_all(&cache.dir).await.unwrap();
        tokio::fs::write(cache.path_for("dsalgo1-finals"), b"{not json").await.unwrap();

        assert!(cache.read("dsalgo1-finals").await.is_none());
    }

    #[tokio::test]
    async fn clear_is_idempotent() {
        let cache = temp_cache();
        cache.write("dsalgo1-finals", &progress()).await.expect("write");

        cache.clear("dsalgo1-finals").await.expect("clear");
        cache.clear("dsalgo1-finals").await.expect("clear again");
        assert!(cache.read("dsalgo1-finals").await.is_none());
    }

    #[tokio::test]
    async fn failed_write_leaves_no_temp_file() {
        let cache = temp_cache();
        let target = cache.path_for("dsalgo1-finals");
        tokio::fs::create_dir_all(target.join("occupied")).await.unwrap();

        assert!(cache.write("dsalgo1-finals", &progress()).await.is_err());

        let mut entries = tokio::fs::read_dir(&cache.dir).await.unwrap();
        while let Some(entry) = entries.next_entry().await.unwrap() {
            let name = entry.file_name().to_string_lossy().into_owned();
            assert!(!name.ends_with(".tmp"), "leftover {name}");
        }
    }

    #[test]
    fn exam_ids_cannot_escape_the_cache_dir() {
        let cache = AnswerCache::new("/tmp/cache");
        assert_eq!(cache.path_for("../x"), PathBuf::from("/tmp/cache/exam-___x.json"));
    }
}
