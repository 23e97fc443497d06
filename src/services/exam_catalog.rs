use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use anyhow::{anyhow, Context};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::services::scoring::{self, PartKey, PartScore};

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ExamDefinition {
    pub(crate) exam_id: String,
    #[serde(default)]
    pub(crate) title: String,
    pub(crate) parts: Vec<PartKey>,
}

#[derive(Debug, Deserialize)]
struct RawCatalog {
    exams: Vec<ExamDefinition>,
}

/// Answer keys for every known exam, keyed by `examID`.
#[derive(Debug, Clone, Default)]
pub(crate) struct ExamCatalog {
    exams: HashMap<String, ExamDefinition>,
}

impl ExamCatalog {
    pub(crate) async fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.is_file() {
            tracing::warn!(
                path = %path.display(),
                "exam catalog not found; saves will be stored without scores"
            );
            return Ok(Self::default());
        }

        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read exam catalog: {}", path.display()))?;
        let catalog = Self::from_json(&raw)
            .with_context(|| format!("exam catalog has invalid format: {}", path.display()))?;

        for exam in catalog.exams.values() {
            tracing::info!(
                exam_id = %exam.exam_id,
                title = %exam.title,
                parts = exam.parts.len(),
                "exam answer key loaded"
            );
        }

        Ok(catalog)
    }

    pub(crate) fn from_json(raw: &str) -> anyhow::Result<Self> {
        let parsed: RawCatalog = serde_json::from_str(raw)?;
        Self::from_definitions(parsed.exams)
    }

    pub(crate) fn from_definitions(definitions: Vec<ExamDefinition>) -> anyhow::Result<Self> {
        let mut exams = HashMap::with_capacity(definitions.len());

        for mut exam in definitions {
            let exam_id = exam.exam_id.trim().to_string();
            if exam_id.is_empty() {
                return Err(anyhow!("exam_id is empty in catalog"));
            }

            let mut seen = BTreeSet::new();
            for part in &exam.parts {
                if !seen.insert(part.part) {
                    return Err(anyhow!("exam '{exam_id}' defines part {} twice", part.part));
                }
                if part.answers.is_empty() {
                    return Err(anyhow!(
                        "exam '{exam_id}' part {} ({}) has an empty answer key",
                        part.part,
                        part.title
                    ));
                }
                if part.scale_divisor.is_some_and(|divisor| divisor <= 0.0) {
                    return Err(anyhow!(
                        "exam '{exam_id}' part {} has a non-positive scale_divisor",
                        part.part
                    ));
                }
            }
            exam.parts.sort_by_key(|part| part.part);

            exam.exam_id = exam_id.clone();
            if exams.insert(exam_id.clone(), exam).is_some() {
                return Err(anyhow!("exam '{exam_id}' is defined twice"));
            }
        }

        Ok(Self { exams })
    }

    pub(crate) fn get(&self, exam_id: &str) -> Option<&ExamDefinition> {
        self.exams.get(exam_id)
    }

    pub(crate) fn len(&self) -> usize {
        self.exams.len()
    }

    /// Scores every part of `exam_id`. Unknown exams score as an empty map.
    pub(crate) fn score(
        &self,
        exam_id: &str,
        answers: &Map<String, Value>,
    ) -> BTreeMap<u32, PartScore> {
        self.get(exam_id)
            .map(|exam| scoring::score_parts(&exam.parts, answers))
            .unwrap_or_default()
    }
}
