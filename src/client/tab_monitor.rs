use time::OffsetDateTime;

use crate::client::session::BrowserSession;
use crate::core::time::format_offset;

pub const TAB_SWITCH_ALERT: &str =
    "Leaving the exam page is recorded. Please stay on this tab until you submit this part.";

/// Persisted form of a monitor. `synced_count` and `synced_timestamps` mark how
/// much of the log the server has already acknowledged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TabMonitorSnapshot {
    count: i64,
    timestamps: Vec<String>,
    synced_count: i64,
    synced_timestamps: usize,
}

/// Tab switches not yet acknowledged by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabSwitchDelta {
    pub count: i64,
    pub timestamps: Vec<String>,
}

impl TabSwitchDelta {
    pub fn is_empty(&self) -> bool {
        self.count == 0 && self.timestamps.is_empty()
    }
}

#[derive(Debug)]
pub struct TabMonitor {
    exam_id: String,
    session: BrowserSession,
    state: TabMonitorSnapshot,
    navigating_away: bool,
}

impl TabMonitor {
    /// Picks up the counters left by an earlier page of the same exam.
    pub fn restore(session: BrowserSession, exam_id: &str) -> Self {
        let state = session.monitor_snapshot(exam_id).unwrap_or_default();
        Self { exam_id: exam_id.to_string(), session, state, navigating_away: false }
    }

    /// Records a visibility loss and returns the alert to show, unless the
    /// page is leaving on purpose.
    pub fn on_visibility_lost(&mut self, now: OffsetDateTime) -> Option<&'static str> {
        if self.navigating_away {
            return None;
        }

        self.state.count += 1;
        self.state.timestamps.push(format_offset(now));
        self.persist();
        tracing::debug!(exam_id = %self.exam_id, count = self.state.count, "Tab switch recorded");
        Some(TAB_SWITCH_ALERT)
    }

    pub fn mark_navigating_away(&mut self) {
        self.navigating_away = true;
    }

    pub fn clear_navigating_away(&mut self) {
        self.navigating_away = false;
    }

    pub fn is_navigating_away(&self) -> bool {
        self.navigating_away
    }

    pub fn count(&self) -> i64 {
        self.state.count
    }

    pub fn timestamps(&self) -> &[String] {
        &self.state.timestamps
    }

    pub fn pending(&self) -> TabSwitchDelta {
        TabSwitchDelta {
            count: self.state.count - self.state.synced_count,
            timestamps: self.state.timestamps[self.state.synced_timestamps..].to_vec(),
        }
    }

    /// Advances the watermark by what a successful save carried. Events recorded
    /// while that save was in flight stay pending.
    pub fn acknowledge(&mut self, delta: &TabSwitchDelta) {
        self.state.synced_count = (self.state.synced_count + delta.count).min(self.state.count);
        self.state.synced_timestamps = (self.state.synced_timestamps + delta.timestamps.len())
            .min(self.state.timestamps.len());
        self.persist();
    }

    /// Starts a fresh count for the next part.
    pub fn reset(&mut self) {
        self.state = TabMonitorSnapshot::default();
        self.persist();
    }

    fn persist(&self) {
        self.session.store_monitor(&self.exam_id, self.state.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn monitor() -> (BrowserSession, TabMonitor) {
        let session = BrowserSession::new();
        let monitor = TabMonitor::restore(session.clone(), "dsalgo1-finals");
        (session, monitor)
    }

    #[test]
    fn visibility_loss_counts_and_alerts() {
        let (_, mut monitor) = monitor();

        let alert = monitor.on_visibility_lost(datetime!(2025-05-14 08:01:00 UTC));
        assert_eq!(alert, Some(TAB_SWITCH_ALERT));
        monitor.on_visibility_lost(datetime!(2025-05-14 08:02:30 UTC));

        assert_eq!(monitor.count(), 2);
        assert_eq!(monitor.timestamps(), ["2025-05-14T08:01:00Z", "2025-05-14T08:02:30Z"]);
    }

    #[test]
    fn intentional_navigation_is_not_counted() {
        let (_, mut monitor) = monitor();
        monitor.mark_navigating_away();

        assert_eq!(monitor.on_visibility_lost(datetime!(2025-05-14 08:01:00 UTC)), None);
        assert_eq!(monitor.count(), 0);

        monitor.clear_navigating_away();
        assert!(monitor.on_visibility_lost(datetime!(2025-05-14 08:01:00 UTC)).is_some());
        assert_eq!(monitor.count(), 1);
    }

    #[test]
    fn pending_shrinks_only_by_acknowledged_delta() {
        let (_, mut monitor) = monitor();
        monitor.on_visibility_lost(datetime!(2025-05-14 08:01:00 UTC));
        let in_flight = monitor.pending();
        assert_eq!(in_flight.count, 1);

        monitor.on_visibility_lost(datetime!(2025-05-14 08:03:00 UTC));
        monitor.acknowledge(&in_flight);

        let remaining = monitor.pending();
        assert_eq!(remaining.count, 1);
        assert_eq!(remaining.timestamps, vec!["2025-05-14T08:03:00Z".to_string()]);

        monitor.acknowledge(&remaining);
        assert!(monitor.pending().is_empty());
        assert_eq!(monitor.count(), 2);
    }

    #[test]
    fn state_survives_page_reload_in_same_session() {
        let (session, mut monitor) = monitor();
        monitor.on_visibility_lost(datetime!(2025-05-14 08:01:00 UTC));
        drop(monitor);

        let reloaded = TabMonitor::restore(session.clone(), "dsalgo1-finals");
        assert_eq!(reloaded.count(), 1);
        assert_eq!(reloaded.pending().count, 1);

        let other_exam = TabMonitor::restore(session, "other-exam");
        assert_eq!(other_exam.count(), 0);
    }

    #[test]
    fn reset_clears_count_and_log() {
        let (session, mut monitor) = monitor();
        monitor.on_visibility_lost(datetime!(2025-05-14 08:01:00 UTC));
        monitor.reset();

        assert_eq!(monitor.count(), 0);
        assert!(monitor.timestamps().is_empty());
        assert_eq!(TabMonitor::restore(session, "dsalgo1-finals").count(), 0);
    }
}
