//! Execution backends and the dispatcher that chains them.
//!
//! Each language maps to an ordered chain of [`Backend`]s. A backend either
//! answers (`Succeeded` / `Failed`) or reports that its own infrastructure is
//! `Unavailable`, in which case the dispatcher moves on to the next tier.

use async_trait::async_trait;

use crate::core_types::BackendOutcome;

pub mod dispatcher;
pub mod javascript;
pub mod python;
pub mod remote_compile;

pub use dispatcher::{DispatcherBuilder, ExecutionDispatcher};
pub use javascript::JavaScriptBackend;
pub use python::PythonBackend;
pub use remote_compile::{CompileRequest, CompileResponse, RemoteCompileBackend};

/// Canned output for a run that finished without printing anything.
pub const NO_OUTPUT_MESSAGE: &str = "Code executed successfully";

#[async_trait]
pub trait Backend: Send + Sync {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Run `source` once. Must not return an error; infrastructure problems
    /// are reported as [`BackendOutcome::Unavailable`].
    async fn attempt(&self, source: &str) -> BackendOutcome;
}
