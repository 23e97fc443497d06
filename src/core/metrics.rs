use std::sync::OnceLock;
use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::core::config::Settings;

static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

/// Installs the Prometheus recorder once. Without it the `metrics` macros are no-ops.
pub(crate) fn init(settings: &Settings) -> anyhow::Result<()> {
    if settings.telemetry().prometheus_enabled && RECORDER.get().is_none() {
        let handle = PrometheusBuilder::new().install_recorder()?;
        RECORDER.get_or_init(|| handle);
    }
    Ok(())
}

pub(crate) fn render() -> Option<String> {
    RECORDER.get().map(PrometheusHandle::render)
}

pub(crate) fn record_http(status: u16, latency: Duration) {
    let status = status.to_string();
    metrics::counter!("http_requests_total", "status" => status.clone()).increment(1);
    metrics::histogram!("http_request_duration_seconds", "status" => status)
        .record(latency.as_secs_f64());
}

pub(crate) fn record_exam_info(action: &'static str, outcome: &'static str) {
    metrics::counter!("exam_info_requests_total", "action" => action, "outcome" => outcome)
        .increment(1);
}

pub(crate) fn record_tab_switches(exam_id: &str, delta: u64) {
    if delta > 0 {
        metrics::counter!("exam_record_tab_switches_total", "exam_id" => exam_id.to_string())
            .increment(delta);
    }
}
