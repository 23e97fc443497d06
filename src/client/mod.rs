//! Student-side half of the exam protocol: the registration identity, the
//! tab-switch monitor, background saves, the local answer cache and the
//! per-part page controller that ties them together.

pub(crate) mod api;
mod autosave;
mod cache;
mod controller;
mod session;
mod tab_monitor;

use std::path::PathBuf;
use std::time::Duration;

use crate::core::config::Settings;

pub use api::{ClientError, ExamInfoApi, HttpExamInfoClient, RecordView, SaveAck, SavePayload};
pub use autosave::{AutosaveScheduler, SaveFuture, SaveTask};
pub use cache::{AnswerCache, CachedProgress};
pub use controller::{ExamClient, ExamPage, Notice, PageError, PageState, SubmitError};
pub use session::{BrowserSession, SessionIdentity};
pub use tab_monitor::{TabMonitor, TabSwitchDelta, TAB_SWITCH_ALERT};

/// Where the client talks to and how it paces background saves.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub cache_dir: PathBuf,
    pub timeout: Duration,
    pub debounce: Duration,
    pub autosave_interval: Duration,
}

impl ClientConfig {
    /// Reads the same environment as the service (`.env` included).
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let settings = Settings::load()?;
        Ok(Self::from_settings(&settings))
    }

    pub(crate) fn from_settings(settings: &Settings) -> Self {
        let client = settings.client();
        let autosave = settings.autosave();
        Self {
            base_url: client.base_url.clone(),
            cache_dir: client.cache_dir.clone(),
            timeout: client.timeout,
            debounce: autosave.debounce,
            autosave_interval: autosave.interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{env_lock, set_test_env};

    #[tokio::test]
    async fn config_follows_environment() {
        let _guard = env_lock().await;
        set_test_env();
        std::env::set_var("AUTOSAVE_DEBOUNCE_MS", "800");
        std::env::set_var("EXAM_CLIENT_BASE_URL", "http://exam.local:9000");

        let config = ClientConfig::from_env().expect("config");
        assert_eq!(config.debounce, Duration::from_millis(800));
        assert_eq!(config.autosave_interval, Duration::from_secs(30));
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert_eq!(config.base_url, "http://exam.local:9000");

        set_test_env();
    }
}
