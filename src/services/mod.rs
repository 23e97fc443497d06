pub(crate) mod exam_catalog;
pub(crate) mod exam_progress;
pub(crate) mod record_merge;
pub(crate) mod scoring;
