//! Error types for the execution pipeline
//!
//! Errors are grouped by the tier that raised them so the dispatcher can decide
//! whether a failure is a program error (final) or an infrastructure problem
//! (fall through to the next tier). None of these ever cross the dispatcher
//! boundary; they are folded into `ExecutionResult` or
//! `BackendOutcome::Unavailable` before `execute` returns.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Timed out after {seconds:.1}s while {stage}")]
    Timeout { stage: String, seconds: f64 },
    #[error("Runtime loader script failed: {0}")]
    ScriptLoadError(String),
    #[error("Runtime initialization failed: {0}")]
    RuntimeInitError(String),
    #[error("Runtime bridge error: {0}")]
    BridgeError(String),
    #[error("Program raised an error: {0}")]
    ProgramError(String),
    #[error("Installer error: {0}")]
    InstallerError(String),
    #[error("Compile service error: {0}")]
    CompileServiceError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl ExecutionError {
    pub fn timeout(stage: impl Into<String>, duration: std::time::Duration) -> Self {
        ExecutionError::Timeout {
            stage: stage.into(),
            seconds: duration.as_secs_f64(),
        }
    }
}

impl From<std::io::Error> for ExecutionError {
    fn from(err: std::io::Error) -> Self {
        ExecutionError::IoError(err.to_string())
    }
}

impl From<reqwest::Error> for ExecutionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ExecutionError::Timeout {
                stage: "waiting for an HTTP response".to_string(),
                seconds: 0.0,
            }
        } else {
            ExecutionError::NetworkError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExecutionError {
    fn from(err: serde_json::Error) -> Self {
        ExecutionError::BridgeError(format!("malformed JSON: {}", err))
    }
}

impl From<tokio::task::JoinError> for ExecutionError {
    fn from(err: tokio::task::JoinError) -> Self {
        ExecutionError::InternalError(format!("worker task failed: {}", err))
    }
}
