use std::env;
use std::str::FromStr;

use super::types::{ConfigError, Environment};

const DEV_ORIGINS: &[&str] = &["http://localhost:3000", "http://localhost:5173"];

/// Trimmed value of `key`. Blank counts as unset.
pub(super) fn var(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

pub(super) fn var_or(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|| default.to_string())
}

pub(super) fn flag(key: &str, default: bool) -> bool {
    var(key).map_or(default, |value| truthy(&value))
}

pub(super) fn number<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match var(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue { field: key, value: raw }),
    }
}

/// Like `number`, but zero is rejected.
pub(super) fn positive<T>(key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + Default + PartialEq,
{
    let value = number(key, default)?;
    if value == T::default() {
        return Err(ConfigError::InvalidValue { field: key, value: "0".to_string() });
    }
    Ok(value)
}

pub(super) fn truthy(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

pub(super) fn environment(value: Option<String>) -> Environment {
    match value.map(|raw| raw.to_ascii_lowercase()).as_deref() {
        Some("production" | "prod") => Environment::Production,
        Some("staging") => Environment::Staging,
        Some("test" | "testing") => Environment::Test,
        _ => Environment::Development,
    }
}

/// Accepts a JSON array or a comma-separated list. Unset or empty falls back
/// to the local dev-server origins.
pub(super) fn cors_origins(value: Option<String>) -> Result<Vec<String>, ConfigError> {
    let origins: Vec<String> = match value {
        None => Vec::new(),
        Some(raw) if raw.starts_with('[') => {
            serde_json::from_str(&raw).map_err(|_| ConfigError::InvalidCors(raw.clone()))?
        }
        Some(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(String::from)
            .collect(),
    };

    if origins.is_empty() {
        return Ok(DEV_ORIGINS.iter().map(|origin| origin.to_string()).collect());
    }
    Ok(origins)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::env_lock;

    #[test]
    fn cors_origins_accepts_json_and_csv() {
        let json = cors_origins(Some("[\"http://a\",\"http://b\"]".to_string())).expect("json");
        let csv = cors_origins(Some("http://a, ,http://b".to_string())).expect("csv");

        assert_eq!(json, vec!["http://a".to_string(), "http://b".to_string()]);
        assert_eq!(csv, json);
        assert_eq!(cors_origins(None).expect("default").len(), DEV_ORIGINS.len());
    }

    #[test]
    fn cors_origins_rejects_broken_json() {
        let err = cors_origins(Some("[\"http://a\"".to_string())).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidCors(_)));
    }

    #[test]
    fn truthy_spellings() {
        for value in ["1", "True", " yes ", "ON"] {
            assert!(truthy(value), "{value}");
        }
        for value in ["false", "0", "maybe"] {
            assert!(!truthy(value), "{value}");
        }
    }

    #[test]
    fn environment_aliases() {
        assert_eq!(environment(Some("prod".to_string())), Environment::Production);
        assert_eq!(environment(Some("Staging".to_string())), Environment::Staging);
        assert_eq!(environment(Some("testing".to_string())), Environment::Test);
        assert_eq!(environment(None), Environment::Development);
    }

    #[tokio::test]
    async fn numbers_report_the_offending_variable() {
        let _guard = env_lock().await;
        std::env::set_var("EXAMTRACK_PARSING_PROBE", "ten");
        let err = number::<u64>("EXAMTRACK_PARSING_PROBE", 1).unwrap_err();
        assert_eq!(err.to_string(), "invalid value for EXAMTRACK_PARSING_PROBE: ten");

        std::env::set_var("EXAMTRACK_PARSING_PROBE", "0");
        assert!(positive::<u64>("EXAMTRACK_PARSING_PROBE", 1).is_err());

        std::env::remove_var("EXAMTRACK_PARSING_PROBE");
        assert_eq!(positive::<u64>("EXAMTRACK_PARSING_PROBE", 7).expect("default"), 7);
    }
}
