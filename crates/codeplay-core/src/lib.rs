//! Multi-backend code execution for interactive lessons.
//!
//! Source text arrives as an [`ExecutionRequest`] and leaves as an
//! [`ExecutionResult`]. In between, the [`ExecutionDispatcher`] picks a chain
//! of backends for the language and walks it until one of them answers:
//!
//! - **JavaScript**: evaluated in-process with console output captured
//! - **Python**: run on a lazily acquired interpreter runtime, falling back to
//!   a heuristic simulator when the runtime cannot be loaded
//! - **C++**: sent to a remote compile service, falling back to a heuristic
//!   simulator when the service is absent
//!
//! The dispatcher never fails. Program errors are reported as
//! `success: false` results; infrastructure problems drop to the next tier.

pub mod capture;
pub mod config;
pub mod core_types;
pub mod errors;
pub mod executors;
pub mod runtime;
pub mod session;
pub mod simulators;

pub use config::*;
pub use core_types::{BackendOutcome, ExecutionRequest, ExecutionResult, LanguageId, EMPTY_SOURCE_PROMPT};
pub use errors::ExecutionError;
pub use executors::{Backend, DispatcherBuilder, ExecutionDispatcher};
pub use runtime::{RuntimeHandle, RuntimeLoader, StandalonePythonProvider};
pub use session::{CodeSession, ExecutionObserver, RunReport};
pub use simulators::{CppSimulator, PythonSimulator, Simulator, SimulatorBackend};

#[cfg(test)]
pub mod test_utils;
