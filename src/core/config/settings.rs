use std::path::PathBuf;
use std::time::Duration;

use super::parsing::{cors_origins, environment, flag, number, positive, var, var_or};
use super::types::{
    ApiSettings, AutosaveSettings, ClientSettings, ConfigError, CorsSettings, DatabaseSettings,
    ExamSettings, RedisSettings, RuntimeSettings, ServerSettings, Settings, TelemetrySettings,
};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let environment = environment(var("EXAMTRACK_ENV").or_else(|| var("ENVIRONMENT")));
        let strict_config = flag("EXAMTRACK_STRICT_CONFIG", false) || environment.is_production();

        let settings = Self {
            server: ServerSettings {
                host: var_or("EXAMTRACK_HOST", "0.0.0.0"),
                port: positive("EXAMTRACK_PORT", 8000)?,
            },
            runtime: RuntimeSettings { environment, strict_config },
            api: ApiSettings {
                project_name: var_or("PROJECT_NAME", "examtrack"),
                version: var_or("VERSION", env!("CARGO_PKG_VERSION")),
            },
            cors: CorsSettings { origins: cors_origins(var("BACKEND_CORS_ORIGINS"))? },
            database: database_section()?,
            redis: redis_section()?,
            exam: ExamSettings {
                catalog_path: PathBuf::from(var_or("EXAM_CATALOG_PATH", "exams/catalog.json")),
                save_rate_limit_per_minute: positive("SAVE_RATE_LIMIT_PER_MINUTE", 120)?,
                enforce_completed_lock: flag("ENFORCE_COMPLETED_LOCK", true),
            },
            autosave: AutosaveSettings {
                debounce: Duration::from_millis(positive("AUTOSAVE_DEBOUNCE_MS", 1500)?),
                interval: Duration::from_secs(positive("AUTOSAVE_INTERVAL_SECONDS", 30)?),
            },
            client: ClientSettings {
                base_url: var_or("EXAM_CLIENT_BASE_URL", "http://localhost:8000"),
                cache_dir: PathBuf::from(var_or("EXAM_CLIENT_CACHE_DIR", ".examtrack-cache")),
                timeout: Duration::from_secs(positive("EXAM_CLIENT_TIMEOUT_SECONDS", 10)?),
            },
            telemetry: TelemetrySettings {
                log_level: var_or("EXAMTRACK_LOG_LEVEL", "info"),
                json: flag("EXAMTRACK_LOG_JSON", false),
                prometheus_enabled: flag("PROMETHEUS_ENABLED", false),
            },
        };

        if settings.runtime.strict_config {
            settings.check_strict()?;
        }
        Ok(settings)
    }

    pub(crate) fn server(&self) -> &ServerSettings {
        &self.server
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub(crate) fn api(&self) -> &ApiSettings {
        &self.api
    }

    pub(crate) fn cors(&self) -> &CorsSettings {
        &self.cors
    }

    pub(crate) fn database(&self) -> &DatabaseSettings {
        &self.database
    }

    pub(crate) fn redis(&self) -> &RedisSettings {
        &self.redis
    }

    pub(crate) fn exam(&self) -> &ExamSettings {
        &self.exam
    }

    pub(crate) fn autosave(&self) -> &AutosaveSettings {
        &self.autosave
    }

    pub(crate) fn client(&self) -> &ClientSettings {
        &self.client
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }

    // Production refuses to start on a passwordless database or a missing
    // answer-key catalog.
    fn check_strict(&self) -> Result<(), ConfigError> {
        if !self.database.credentials_supplied {
            return Err(ConfigError::MissingSecret("POSTGRES_PASSWORD"));
        }
        if !self.exam.catalog_path.is_file() {
            return Err(ConfigError::MissingCatalog(self.exam.catalog_path.display().to_string()));
        }
        Ok(())
    }
}

fn database_section() -> Result<DatabaseSettings, ConfigError> {
    let max_connections = positive("DATABASE_MAX_CONNECTIONS", 20)?;
    if let Some(url) = var("DATABASE_URL") {
        return Ok(DatabaseSettings { url, max_connections, credentials_supplied: true });
    }

    let password = var("POSTGRES_PASSWORD").unwrap_or_default();
    let url = format!(
        "postgresql://{user}:{password}@{host}:{port}/{db}",
        user = var_or("POSTGRES_USER", "examtrack"),
        host = var_or("POSTGRES_SERVER", "localhost"),
        port = number::<u16>("POSTGRES_PORT", 5432)?,
        db = var_or("POSTGRES_DB", "examtrack"),
    );
    Ok(DatabaseSettings { url, max_connections, credentials_supplied: !password.is_empty() })
}

fn redis_section() -> Result<RedisSettings, ConfigError> {
    let host = var_or("REDIS_HOST", "localhost");
    let port = number::<u16>("REDIS_PORT", 6379)?;
    let db = number::<u16>("REDIS_DB", 0)?;
    let auth = var("REDIS_PASSWORD").map(|password| format!(":{password}@")).unwrap_or_default();

    Ok(RedisSettings { url: format!("redis://{auth}{host}:{port}/{db}") })
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::core::config::{ConfigError, Environment, Settings};
    use crate::test_support;

    #[tokio::test]
    async fn defaults_load_in_development() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::remove_var("EXAMTRACK_ENV");

        let settings = Settings::load().expect("settings");
        assert_eq!(settings.runtime().environment, Environment::Development);
        assert_eq!(settings.autosave().debounce, Duration::from_millis(1500));
        assert_eq!(settings.autosave().interval, Duration::from_secs(30));
        assert!(settings.exam().enforce_completed_lock);
        assert_eq!(settings.server().addr(), "0.0.0.0:8000");
        assert_eq!(settings.redis().url, "redis://127.0.0.1:6379/1");
    }

    #[tokio::test]
    async fn database_url_is_assembled_from_parts() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::remove_var("DATABASE_URL");
        std::env::set_var("POSTGRES_PASSWORD", "s3cret");
        std::env::set_var("POSTGRES_SERVER", "db.internal");

        let settings = Settings::load().expect("settings");
        std::env::remove_var("POSTGRES_PASSWORD");
        std::env::remove_var("POSTGRES_SERVER");
        assert!(settings.database().url.starts_with("postgresql://"));
        assert!(settings.database().url.ends_with(":s3cret@db.internal:5432/examtrack"));
    }

    #[tokio::test]
    async fn zero_debounce_is_rejected() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("AUTOSAVE_DEBOUNCE_MS", "0");

        let err = Settings::load().unwrap_err();
        std::env::remove_var("AUTOSAVE_DEBOUNCE_MS");
        assert!(matches!(err, ConfigError::InvalidValue { field: "AUTOSAVE_DEBOUNCE_MS", .. }));
    }

    #[tokio::test]
    async fn strict_mode_requires_database_secret() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::remove_var("DATABASE_URL");
        std::env::remove_var("POSTGRES_PASSWORD");
        std::env::set_var("EXAMTRACK_STRICT_CONFIG", "1");

        let err = Settings::load().unwrap_err();
        std::env::set_var("EXAMTRACK_STRICT_CONFIG", "0");
        assert!(matches!(err, ConfigError::MissingSecret("POSTGRES_PASSWORD")));
    }

    #[tokio::test]
    async fn strict_mode_requires_catalog_file() {
        let _guard = test_support::env_lock().await;
        test_support::set_test_env();
        std::env::set_var("EXAMTRACK_STRICT_CONFIG", "1");
        std::env::set_var("EXAM_CATALOG_PATH", "does/not/exist.json");

        let err = Settings::load().unwrap_err();
        std::env::set_var("EXAMTRACK_STRICT_CONFIG", "0");
        std::env::remove_var("EXAM_CATALOG_PATH");
        assert!(matches!(err, ConfigError::MissingCatalog(_)));
    }
}
