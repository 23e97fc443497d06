use std::sync::{Arc, OnceLock};

use redis::aio::ConnectionManager;
use redis::{cmd, Client, RedisError, Script};
use tokio::sync::RwLock;

const SAVE_WINDOW_SECONDS: i64 = 60;

// Increments the window counter and arms its expiry on the first hit.
const SAVE_WINDOW_LUA: &str = r#"
local saves = redis.call("INCR", KEYS[1])
if saves == 1 then
    redis.call("EXPIRE", KEYS[1], ARGV[1])
end
return saves
"#;

fn save_window_script() -> &'static Script {
    static SCRIPT: OnceLock<Script> = OnceLock::new();
    SCRIPT.get_or_init(|| Script::new(SAVE_WINDOW_LUA))
}

/// Optional Redis connection. The exam endpoint runs without it: while
/// disconnected every save is allowed and health reports `Disconnected`.
#[derive(Clone)]
pub(crate) struct RedisHandle {
    url: String,
    manager: Arc<RwLock<Option<ConnectionManager>>>,
}

#[derive(Debug, Clone)]
pub(crate) enum RedisHealth {
    Healthy,
    Disconnected,
    Unhealthy(String),
}

impl RedisHandle {
    pub(crate) fn new(url: String) -> Self {
        Self { url, manager: Arc::default() }
    }

    pub(crate) async fn connect(&self) -> Result<(), RedisError> {
        let manager = ConnectionManager::new(Client::open(self.url.as_str())?).await?;
        *self.manager.write().await = Some(manager);
        Ok(())
    }

    pub(crate) async fn disconnect(&self) {
        *self.manager.write().await = None;
    }

    async fn connection(&self) -> Option<ConnectionManager> {
        self.manager.read().await.clone()
    }

    pub(crate) async fn health(&self) -> RedisHealth {
        let Some(mut conn) = self.connection().await else {
            return RedisHealth::Disconnected;
        };

        cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_or_else(|err| RedisHealth::Unhealthy(err.to_string()), |_| RedisHealth::Healthy)
    }

    /// Saves counted for the record in the current one-minute window,
    /// including this one. `None` while disconnected.
    async fn count_save(&self, key: &str) -> Result<Option<u64>, RedisError> {
        let Some(mut conn) = self.connection().await else {
            return Ok(None);
        };

        let saves: u64 = save_window_script()
            .key(key)
            .arg(SAVE_WINDOW_SECONDS)
            .invoke_async(&mut conn)
            .await?;
        Ok(Some(saves))
    }

    /// Per-record save budget. Redis failures are logged and let the save through.
    pub(crate) async fn allow_save(
        &self,
        exam_id: &str,
        student_id_number: &str,
        per_minute: u64,
    ) -> bool {
        match self.count_save(&save_rate_key(exam_id, student_id_number)).await {
            Ok(Some(saves)) => saves <= per_minute,
            Ok(None) => true,
            Err(err) => {
                tracing::warn!(error = %err, exam_id, "Save budget check failed; allowing save");
                true
            }
        }
    }
}

pub(crate) fn save_rate_key(exam_id: &str, student_id_number: &str) -> String {
    format!("exam-save:{exam_id}:{student_id_number}")
}
