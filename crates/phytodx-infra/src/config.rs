//! Application configuration loader for phytodx.
//!
//! Reads `config.toml` from the data directory (`~/.phytodx/` in production)
//! and deserializes it into [`AppConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::Path;
use std::time::Duration;

use phytodx_core::diagnosis::{ControllerSettings, Questionnaire};
use phytodx_core::soil::SoilSettings;
use phytodx_types::config::AppConfig;

/// Environment variable overriding `remote.base_url`.
pub const API_URL_ENV: &str = "PHYTODX_API_URL";

/// Minimum per-call timeout (safety floor).
const MIN_REQUEST_TIMEOUT_SECS: u64 = 1;

/// Load configuration from `{data_dir}/config.toml`, then apply environment
/// overrides.
///
/// - If the file does not exist, the defaults are used.
/// - If the file exists but fails to parse, logs a warning and uses the defaults.
pub async fn load_app_config(data_dir: &Path) -> AppConfig {
    let mut config = read_config_file(data_dir).await;
    if let Ok(url) = std::env::var(API_URL_ENV) {
        apply_api_url_override(&mut config, &url);
    }
    config
}

async fn read_config_file(data_dir: &Path) -> AppConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return AppConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return AppConfig::default();
        }
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            AppConfig::default()
        }
    }
}

fn apply_api_url_override(config: &mut AppConfig, url: &str) {
    let url = url.trim();
    if !url.is_empty() {
        tracing::debug!(base_url = url, "remote base URL overridden from environment");
        config.remote.base_url = url.to_string();
    }
}

/// Per-call timeout with the minimum floor applied.
pub fn resolve_request_timeout(config: &AppConfig) -> Duration {
    Duration::from_secs(config.remote.request_timeout_secs.max(MIN_REQUEST_TIMEOUT_SECS))
}

/// Diagnosis controller settings derived from the config.
///
/// An empty question override is ignored.
pub fn controller_settings(config: &AppConfig) -> ControllerSettings {
    let questionnaire = match &config.questionnaire.questions {
        Some(questions) if !questions.is_empty() => Questionnaire::new(questions.clone()),
        _ => Questionnaire::default(),
    };
    ControllerSettings {
        request_timeout: resolve_request_timeout(config),
        questionnaire,
    }
}

pub fn soil_settings(config: &AppConfig) -> SoilSettings {
    SoilSettings {
        request_timeout: resolve_request_timeout(config),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn read_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.remote.request_timeout_secs, 60);
        assert!(config.session.persist_to_disk);
    }

    #[tokio::test]
    async fn read_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[remote]
base_url = "https://dx.example.org/api"
request_timeout_secs = 20

[questionnaire]
questions = ["Where?", "Since when?"]
"#,
        )
        .await
        .unwrap();

        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.remote.base_url, "https://dx.example.org/api");

        let settings = controller_settings(&config);
        assert_eq!(settings.request_timeout, Duration::from_secs(20));
        assert_eq!(settings.questionnaire.len(), 2);
    }

    #[tokio::test]
    async fn read_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = read_config_file(tmp.path()).await;
        assert_eq!(config.remote.base_url, "http://localhost:8000/api");
    }

    #[test]
    fn api_url_override_ignores_blank_values() {
        let mut config = AppConfig::default();
        apply_api_url_override(&mut config, "   ");
        assert_eq!(config.remote.base_url, "http://localhost:8000/api");

        apply_api_url_override(&mut config, "https://staging.example.org/api ");
        assert_eq!(config.remote.base_url, "https://staging.example.org/api");
    }

    #[test]
    fn request_timeout_enforces_minimum() {
        let mut config = AppConfig::default();
        config.remote.request_timeout_secs = 0;
        assert_eq!(resolve_request_timeout(&config), Duration::from_secs(1));
        assert_eq!(soil_settings(&config).request_timeout, Duration::from_secs(1));
    }

    #[test]
    fn empty_question_override_keeps_defaults() {
        let mut config = AppConfig::default();
        config.questionnaire.questions = Some(Vec::new());
        assert_eq!(controller_settings(&config).questionnaire, Questionnaire::default());
    }
}
