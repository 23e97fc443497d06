use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::client::tab_monitor::TabMonitorSnapshot;

/// Student details entered on the registration page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionIdentity {
    pub student_id_number: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub section: Option<String>,
    pub exam_code: Option<String>,
}

impl SessionIdentity {
    pub fn new(student_id_number: impl Into<String>) -> Self {
        Self { student_id_number: student_id_number.into(), ..Self::default() }
    }
}

/// State that survives page loads within one browser session but not a
/// restart: the student identity and the tab-switch monitor of each exam.
#[derive(Debug, Clone, Default)]
pub struct BrowserSession {
    inner: Arc<Mutex<SessionState>>,
}

#[derive(Debug, Default)]
struct SessionState {
    identity: Option<SessionIdentity>,
    monitors: HashMap<String, TabMonitorSnapshot>,
}

impl BrowserSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sign_in(&self, identity: SessionIdentity) {
        self.lock().identity = Some(identity);
    }

    pub fn sign_out(&self) {
        let mut state = self.lock();
        state.identity = None;
        state.monitors.clear();
    }

    pub fn identity(&self) -> Option<SessionIdentity> {
        self.lock().identity.clone()
    }

    pub(crate) fn monitor_snapshot(&self, exam_id: &str) -> Option<TabMonitorSnapshot> {
        self.lock().monitors.get(exam_id).cloned()
    }

    pub(crate) fn store_monitor(&self, exam_id: &str, snapshot: TabMonitorSnapshot) {
        self.lock().monitors.insert(exam_id.to_string(), snapshot);
    }

    // A panic while holding the lock must not take exam pages down with it.
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("Browser session state was poisoned; continuing with last value");
            poisoned.into_inner()
        })
    }
}
