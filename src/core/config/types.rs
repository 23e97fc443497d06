use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Process configuration, read once from the environment by `Settings::load`.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(super) server: ServerSettings,
    pub(super) runtime: RuntimeSettings,
    pub(super) api: ApiSettings,
    pub(super) cors: CorsSettings,
    pub(super) database: DatabaseSettings,
    pub(super) redis: RedisSettings,
    pub(super) exam: ExamSettings,
    pub(super) autosave: AutosaveSettings,
    pub(super) client: ClientSettings,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct ServerSettings {
    pub(crate) host: String,
    pub(crate) port: u16,
}

impl ServerSettings {
    pub(crate) fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) environment: Environment,
    pub(crate) strict_config: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct ApiSettings {
    pub(crate) project_name: String,
    pub(crate) version: String,
}

#[derive(Debug, Clone)]
pub(crate) struct CorsSettings {
    /// Empty means any origin.
    pub(crate) origins: Vec<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct DatabaseSettings {
    pub(crate) url: String,
    pub(crate) max_connections: u32,
    /// `DATABASE_URL` or a non-empty `POSTGRES_PASSWORD` was given.
    pub(super) credentials_supplied: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct RedisSettings {
    pub(crate) url: String,
}

#[derive(Debug, Clone)]
pub(crate) struct ExamSettings {
    pub(crate) catalog_path: PathBuf,
    pub(crate) save_rate_limit_per_minute: u64,
    /// Reject saves to a record that is already marked completed.
    pub(crate) enforce_completed_lock: bool,
}

/// Timings the exam client uses for background saves.
#[derive(Debug, Clone)]
pub(crate) struct AutosaveSettings {
    pub(crate) debounce: Duration,
    pub(crate) interval: Duration,
}

#[derive(Debug, Clone)]
pub(crate) struct ClientSettings {
    pub(crate) base_url: String,
    pub(crate) cache_dir: PathBuf,
    pub(crate) timeout: Duration,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
    pub(crate) prometheus_enabled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Environment {
    Development,
    Staging,
    Production,
    Test,
}

impl Environment {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
            Self::Test => "test",
        }
    }

    pub(super) fn is_production(self) -> bool {
        self == Self::Production
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid cors origins: {0}")]
    InvalidCors(String),
    #[error("missing required secret for {0}")]
    MissingSecret(&'static str),
    #[error("exam catalog not found at {0}")]
    MissingCatalog(String),
}
