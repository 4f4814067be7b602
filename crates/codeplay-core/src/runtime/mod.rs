//! Dynamically loaded interpreter runtimes
//!
//! A runtime is acquired once per process through a [`RuntimeLoader`], which
//! asks a [`RuntimeProvider`] to fetch the loader (a network download) and then
//! to materialize a ready interpreter. The resulting [`RuntimeHandle`] is cached
//! for the rest of the process and shared by every Python run.

use async_trait::async_trait;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::capture::{run_with_captured_streams, CapturedStreams};
use crate::errors::ExecutionError;

pub mod bridge;
pub mod loader;
pub mod standalone;

pub use loader::{LoaderState, RuntimeLoader};
pub use standalone::StandalonePythonProvider;

/// Configuration handed to the loader entry point when materializing a runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    pub index_url: String,
    pub full_std_lib: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeInfo {
    pub version: String,
}

/// A live interpreter exposing the "run source text, return value" primitive.
#[async_trait]
pub trait InterpreterRuntime: Send + Sync {
    /// Run source text; returns the final expression value rendered as text,
    /// or `None` when the source does not end in a value.
    async fn run_python(&self, code: &str) -> Result<Option<String>, ExecutionError>;
}

/// Supplies the pieces the loader needs to bring a runtime up.
#[async_trait]
pub trait RuntimeProvider: Send + Sync {
    /// Whether the loader entry point is already present locally.
    fn loader_available(&self) -> bool;

    /// Fetch the loader from the network.
    async fn inject_loader(&self) -> Result<(), ExecutionError>;

    /// Turn the loader into a ready interpreter.
    async fn materialize(
        &self,
        options: &LoadOptions,
    ) -> Result<(Arc<dyn InterpreterRuntime>, RuntimeInfo), ExecutionError>;
}

/// Cached, ready-to-use interpreter.
///
/// Uses are serialized through an internal gate: stream redirection is global
/// interpreter state, so one run must restore it before the next begins.
#[derive(Clone)]
pub struct RuntimeHandle {
    runtime: Arc<dyn InterpreterRuntime>,
    info: RuntimeInfo,
    gate: Arc<Mutex<()>>,
    pending_restore: Arc<AtomicBool>,
}

impl RuntimeHandle {
    pub fn new(runtime: Arc<dyn InterpreterRuntime>, info: RuntimeInfo) -> Self {
        Self {
            runtime,
            info,
            gate: Arc::new(Mutex::new(())),
            pending_restore: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn info(&self) -> &RuntimeInfo {
        &self.info
    }

    /// Run `source` with stdout/stderr captured, holding the handle exclusively.
    pub async fn run_captured(&self, source: &str) -> Result<CapturedStreams, ExecutionError> {
        let _exclusive = self.gate.lock().await;
        run_with_captured_streams(self.runtime.as_ref(), &self.pending_restore, source).await
    }

    /// Run source directly, without capture.
    pub async fn run_python(&self, code: &str) -> Result<Option<String>, ExecutionError> {
        let _exclusive = self.gate.lock().await;
        self.runtime.run_python(code).await
    }
}

impl std::fmt::Debug for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuntimeHandle")
            .field("version", &self.info.version)
            .finish()
    }
}
