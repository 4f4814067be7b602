//! Client for the remote compile-and-run service.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Backend;
use crate::config::CppConfig;
use crate::core_types::{BackendOutcome, ExecutionResult};
use crate::errors::ExecutionError;

/// Output reported for a successful program that printed nothing.
pub const COMPILED_NO_OUTPUT: &str = "Program compiled and ran successfully (no output).";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileRequest {
    pub language: String,
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct RemoteCompileBackend {
    endpoint: String,
    client: reqwest::Client,
}

impl RemoteCompileBackend {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ExecutionError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ExecutionError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            endpoint: endpoint.into(),
            client,
        })
    }

    pub fn from_config(config: &CppConfig) -> Result<Self, ExecutionError> {
        Self::new(config.compile_endpoint.clone(), config.request_timeout())
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn compile(&self, source: &str) -> Result<Option<CompileResponse>, ExecutionError> {
        let request = CompileRequest {
            language: "cpp".to_string(),
            code: source.to_string(),
        };
        let response = self.client.post(&self.endpoint).json(&request).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let status = response.status();
        let body = response.text().await?;
        serde_json::from_str(&body).map(Some).map_err(|e| {
            ExecutionError::CompileServiceError(format!(
                "unexpected HTTP {} response body: {}",
                status, e
            ))
        })
    }
}

#[async_trait]
impl Backend for RemoteCompileBackend {
    fn name(&self) -> &'static str {
        "cpp-remote-compile"
    }

    async fn attempt(&self, source: &str) -> BackendOutcome {
        match self.compile(source).await {
            Ok(Some(response)) if response.success => {
                let output = response
                    .output
                    .map(|o| o.trim_end_matches(['\n', '\r']).to_string())
                    .filter(|o| !o.is_empty())
                    .unwrap_or_else(|| COMPILED_NO_OUTPUT.to_string());
                BackendOutcome::Succeeded(ExecutionResult::success(output))
            }
            Ok(Some(response)) => {
                let message = response
                    .error
                    .or(response.output)
                    .map(|m| m.trim_end().to_string())
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| "compilation failed".to_string());
                BackendOutcome::Failed(ExecutionResult::error(message))
            }
            Ok(None) => BackendOutcome::Unavailable(format!(
                "compile service not deployed at {}",
                self.endpoint
            )),
            Err(e) => BackendOutcome::Unavailable(format!("compile service unusable: {}", e)),
        }
    }
}
