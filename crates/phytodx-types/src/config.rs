//! Application configuration types for phytodx.
//!
//! `AppConfig` represents the `config.toml` in the data directory that
//! controls the remote service endpoint, per-call timeout, session
//! persistence, and the deep-analysis questionnaire.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.phytodx/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub questionnaire: QuestionnaireConfig,
}

/// Remote diagnosis service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Base URL all endpoint paths are joined onto.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Ceiling for every remote call; exceeding it is a retryable failure.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Name of the environment variable holding the bearer token.
    #[serde(default = "default_api_token_env")]
    pub api_token_env: String,
}

fn default_base_url() -> String {
    "http://localhost:8000/api".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_api_token_env() -> String {
    "PHYTODX_API_TOKEN".to_string()
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            api_token_env: default_api_token_env(),
        }
    }
}

/// Session snapshot settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Keep snapshots under `{data_dir}/sessions` so a CLI session can be
    /// resumed by a later invocation. When false, snapshots live in memory.
    #[serde(default = "default_persist_to_disk")]
    pub persist_to_disk: bool,
}

fn default_persist_to_disk() -> bool {
    true
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            persist_to_disk: default_persist_to_disk(),
        }
    }
}

/// Deep-analysis questionnaire override.
///
/// `None` keeps the built-in diagnostic questions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionnaireConfig {
    #[serde(default)]
    pub questions: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_app_config_default_values() {
        let config = AppConfig::default();
        assert_eq!(config.remote.request_timeout_secs, 60);
        assert_eq!(config.remote.api_token_env, "PHYTODX_API_TOKEN");
        assert!(config.session.persist_to_disk);
        assert!(config.questionnaire.questions.is_none());
    }

    #[test]
    fn test_app_config_deserialize_with_defaults() {
        let config: AppConfig = toml::from_str("").unwrap();
        assert_eq!(config.remote.base_url, "http://localhost:8000/api");
        assert!(config.session.persist_to_disk);
    }

    #[test]
    fn test_app_config_deserialize_with_values() {
        let toml_str = r#"
[remote]
base_url = "https://dx.example.org/api/v2"
request_timeout_secs = 15

[session]
persist_to_disk = false

[questionnaire]
questions = ["Where are the spots?", "How fast are they spreading?"]
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.remote.base_url, "https://dx.example.org/api/v2");
        assert_eq!(config.remote.request_timeout_secs, 15);
        assert_eq!(config.remote.api_token_env, "PHYTODX_API_TOKEN");
        assert!(!config.session.persist_to_disk);
        assert_eq!(config.questionnaire.questions.as_ref().map(Vec::len), Some(2));
    }
}
