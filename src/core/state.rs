use std::sync::Arc;

use crate::core::{config::Settings, redis::RedisHandle};
use crate::repositories::exam_records::ExamRecordStore;
use crate::services::exam_catalog::ExamCatalog;

#[derive(Clone)]
pub(crate) struct AppState {
    inner: Arc<InnerState>,
}

struct InnerState {
    settings: Settings,
    records: Arc<dyn ExamRecordStore>,
    redis: RedisHandle,
    catalog: ExamCatalog,
}

impl AppState {
    pub(crate) fn new(
        settings: Settings,
        records: Arc<dyn ExamRecordStore>,
        redis: RedisHandle,
        catalog: ExamCatalog,
    ) -> Self {
        Self { inner: Arc::new(InnerState { settings, records, redis, catalog }) }
    }

    pub(crate) fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    pub(crate) fn records(&self) -> &dyn ExamRecordStore {
        self.inner.records.as_ref()
    }

    pub(crate) fn redis(&self) -> &RedisHandle {
        &self.inner.redis
    }

    pub(crate) fn catalog(&self) -> &ExamCatalog {
        &self.inner.catalog
    }
}
