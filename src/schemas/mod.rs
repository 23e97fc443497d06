use std::collections::BTreeMap;

use serde::Serialize;

pub(crate) mod exam_record;

#[derive(Debug, Serialize)]
pub(crate) struct HealthResponse {
    pub(crate) service: &'static str,
    pub(crate) status: &'static str,
    pub(crate) components: BTreeMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct RootResponse {
    pub(crate) message: String,
    pub(crate) version: String,
    pub(crate) exam_info_url: String,
    pub(crate) exams_loaded: usize,
}
