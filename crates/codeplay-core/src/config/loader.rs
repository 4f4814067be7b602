//! Configuration loader for YAML files, URLs and environment overrides

use crate::config::types::PlaygroundConfig;
use crate::errors::ExecutionError;
use std::env;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Environment variables that override individual configuration fields.
pub const ENV_COMPILE_ENDPOINT: &str = "CODEPLAY_COMPILE_ENDPOINT";
pub const ENV_RUNTIME_HOME: &str = "CODEPLAY_RUNTIME_HOME";
pub const ENV_PYTHON_SCRIPT_URL: &str = "CODEPLAY_PYTHON_SCRIPT_URL";
pub const ENV_PYTHON_INDEX_URL: &str = "CODEPLAY_PYTHON_INDEX_URL";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from a file path or an http(s) URL.
    pub async fn from_source(source: &str) -> Result<PlaygroundConfig, ExecutionError> {
        if source.starts_with("http://") || source.starts_with("https://") {
            Self::from_url(source).await
        } else {
            Self::from_file(source).await
        }
    }

    /// Like [`ConfigLoader::from_source`], but a missing local file yields the defaults.
    pub async fn from_source_or_default(source: &str) -> Result<PlaygroundConfig, ExecutionError> {
        let is_url = source.starts_with("http://") || source.starts_with("https://");
        if !is_url && !Path::new(source).exists() {
            log::info!("No configuration at {}, using defaults", source);
            let mut config = PlaygroundConfig::default();
            Self::apply_env_overrides(&mut config);
            Self::validate(&config)?;
            return Ok(config);
        }
        Self::from_source(source).await
    }

    pub async fn from_url(url: &str) -> Result<PlaygroundConfig, ExecutionError> {
        let response = reqwest::get(url).await.map_err(|e| {
            ExecutionError::ConfigError(format!(
                "Failed to fetch configuration from URL {}: {}",
                url, e
            ))
        })?;

        if !response.status().is_success() {
            return Err(ExecutionError::ConfigError(format!(
                "Failed to fetch configuration: HTTP {} from URL {}",
                response.status(),
                url
            )));
        }

        let content = response.text().await.map_err(|e| {
            ExecutionError::ConfigError(format!(
                "Failed to read configuration response from URL {}: {}",
                url, e
            ))
        })?;

        Self::from_str(&content)
    }

    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<PlaygroundConfig, ExecutionError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|e| {
            ExecutionError::ConfigError(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_str(&content)
    }

    /// Parse YAML, apply environment overrides and validate.
    pub fn from_str(content: &str) -> Result<PlaygroundConfig, ExecutionError> {
        let mut config: PlaygroundConfig = if content.trim().is_empty() {
            PlaygroundConfig::default()
        } else {
            serde_yaml::from_str(content).map_err(|e| {
                ExecutionError::ConfigError(format!("Failed to parse YAML config: {}", e))
            })?
        };

        Self::apply_env_overrides(&mut config);
        Self::validate(&config)?;
        Ok(config)
    }

    fn apply_env_overrides(config: &mut PlaygroundConfig) {
        if let Ok(endpoint) = env::var(ENV_COMPILE_ENDPOINT) {
            config.cpp.compile_endpoint = endpoint;
        }
        if let Ok(home) = env::var(ENV_RUNTIME_HOME) {
            config.python.runtime.runtime_home = Some(PathBuf::from(home));
        }
        if let Ok(url) = env::var(ENV_PYTHON_SCRIPT_URL) {
            config.python.runtime.script_url = url;
        }
        if let Ok(url) = env::var(ENV_PYTHON_INDEX_URL) {
            config.python.runtime.index_url = url;
        }
    }

    pub fn validate(config: &PlaygroundConfig) -> Result<(), ExecutionError> {
        let runtime = &config.python.runtime;
        if runtime.script_timeout_ms == 0 || runtime.init_timeout_ms == 0 {
            return Err(ExecutionError::ConfigError(
                "python.runtime timeouts must be greater than zero".to_string(),
            ));
        }
        if !is_http_url(&runtime.script_url) {
            return Err(ExecutionError::ConfigError(format!(
                "python.runtime.script_url must be an http(s) URL, got '{}'",
                runtime.script_url
            )));
        }
        if let Some(digest) = &runtime.script_sha256 {
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ExecutionError::ConfigError(
                    "python.runtime.script_sha256 must be 64 hex characters".to_string(),
                ));
            }
        }
        if !is_http_url(&config.cpp.compile_endpoint) {
            return Err(ExecutionError::ConfigError(format!(
                "cpp.compile_endpoint must be an http(s) URL, got '{}'",
                config.cpp.compile_endpoint
            )));
        }
        if config.cpp.request_timeout_ms == 0 || config.compile_service.run_timeout_ms == 0 {
            return Err(ExecutionError::ConfigError(
                "request and run timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = ConfigLoader::from_str("").unwrap();
        assert_eq!(config.python.runtime.script_timeout_ms, 15_000);
        assert_eq!(config.python.runtime.init_timeout_ms, 20_000);
        assert!(config.python.runtime.full_std_lib);
        assert!(config.compile_service.enabled);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let yaml = r#"
python:
  runtime:
    init_timeout_ms: 500
    full_std_lib: false
cpp:
  request_timeout_ms: 1200
"#;
        let config = ConfigLoader::from_str(yaml).unwrap();
        assert_eq!(config.python.runtime.init_timeout_ms, 500);
        assert_eq!(config.python.runtime.script_timeout_ms, 15_000);
        assert!(!config.python.runtime.full_std_lib);
        assert_eq!(config.cpp.request_timeout_ms, 1200);
        assert!(config.cpp.compile_endpoint.ends_with("/api/compile"));
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let yaml = "python:\n  runtime:\n    script_timeout_ms: 0\n";
        let err = ConfigLoader::from_str(yaml).unwrap_err();
        assert!(matches!(err, ExecutionError::ConfigError(_)));
    }

    #[test]
    fn test_rejects_bad_digest() {
        let yaml = "python:\n  runtime:\n    script_sha256: nothex\n";
        assert!(ConfigLoader::from_str(yaml).is_err());
    }

    #[test]
    fn test_rejects_malformed_yaml() {
        let err = ConfigLoader::from_str("python: [unterminated").unwrap_err();
        assert!(err.to_string().contains("Failed to parse YAML config"));
    }

    #[tokio::test]
    async fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "javascript:\n  loop_iteration_limit: 1000").unwrap();
        let config = ConfigLoader::from_file(file.path()).await.unwrap();
        assert_eq!(config.javascript.loop_iteration_limit, Some(1000));
    }

    #[tokio::test]
    async fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("codeplay.yaml");
        let config = ConfigLoader::from_source_or_default(missing.to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.cpp.request_timeout_ms, 30_000);

        assert!(ConfigLoader::from_file(&missing).await.is_err());
    }
}
