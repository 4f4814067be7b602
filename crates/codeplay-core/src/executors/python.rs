//! Python execution on the downloadable interpreter runtime.

use async_trait::async_trait;
use std::sync::Arc;

use super::{Backend, NO_OUTPUT_MESSAGE};
use crate::capture::CapturedStreams;
use crate::core_types::{BackendOutcome, ExecutionResult};
use crate::runtime::RuntimeLoader;

/// Runs Python on the dynamically loaded runtime.
///
/// Any problem reaching or talking to the runtime, including an exception
/// escaping the bridge, is reported as `Unavailable` so the simulator answers.
pub struct PythonBackend {
    loader: Arc<RuntimeLoader>,
}

impl PythonBackend {
    pub fn new(loader: Arc<RuntimeLoader>) -> Self {
        Self { loader }
    }
}

#[async_trait]
impl Backend for PythonBackend {
    fn name(&self) -> &'static str {
        "python-runtime"
    }

    async fn attempt(&self, source: &str) -> BackendOutcome {
        let handle = match self.loader.acquire().await {
            Ok(handle) => handle,
            Err(e) => return BackendOutcome::Unavailable(format!("Python runtime unavailable: {}", e)),
        };

        match handle.run_captured(source).await {
            Ok(streams) => classify(streams),
            Err(e) => BackendOutcome::Unavailable(format!("Python runtime bridge failed: {}", e)),
        }
    }
}

fn classify(streams: CapturedStreams) -> BackendOutcome {
    let stderr = streams.stderr.trim_end();
    if !stderr.is_empty() {
        return BackendOutcome::Failed(ExecutionResult::failure(format!("Error: {}", stderr)));
    }

    let stdout = streams.stdout.trim_end_matches(['\n', '\r']);
    if stdout.is_empty() {
        BackendOutcome::Succeeded(ExecutionResult::success(NO_OUTPUT_MESSAGE))
    } else {
        BackendOutcome::Succeeded(ExecutionResult::success(stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::LoadOptions;
    use crate::test_utils::{FakeProvider, ScriptedRuntime};
    use std::time::Duration;

    fn backend_with(runtime: ScriptedRuntime) -> (PythonBackend, Arc<ScriptedRuntime>) {
        let runtime = Arc::new(runtime);
        let provider = Arc::new(FakeProvider::with_loader().with_runtime(runtime.clone()));
        let loader = RuntimeLoader::new(
            provider,
            LoadOptions {
                index_url: "https://pypi.org/simple".to_string(),
                full_std_lib: true,
            },
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        (PythonBackend::new(Arc::new(loader)), runtime)
    }

    #[tokio::test]
    async fn test_stdout_becomes_output() {
        let (backend, _) = backend_with(ScriptedRuntime::new().with_stdout("print('hello')", "hello\n"));
        assert_eq!(
            backend.attempt("print('hello')").await,
            BackendOutcome::Succeeded(ExecutionResult::success("hello"))
        );
    }

    #[tokio::test]
    async fn test_silent_program() {
        let (backend, _) = backend_with(ScriptedRuntime::new());
        assert_eq!(
            backend.attempt("x = 1").await,
            BackendOutcome::Succeeded(ExecutionResult::success(NO_OUTPUT_MESSAGE))
        );
    }

    #[tokio::test]
    async fn test_stderr_marks_failure() {
        let (backend, _) = backend_with(
            ScriptedRuntime::new().with_stderr("warn()", "DeprecationWarning: old\n"),
        );
        assert_eq!(
            backend.attempt("warn()").await,
            BackendOutcome::Failed(ExecutionResult::failure("Error: DeprecationWarning: old"))
        );
    }

    #[tokio::test]
    async fn test_bridge_error_is_unavailable() {
        let (backend, runtime) =
            backend_with(ScriptedRuntime::new().with_error("1/0", "ZeroDivisionError"));
        let outcome = backend.attempt("1/0").await;
        assert!(matches!(outcome, BackendOutcome::Unavailable(_)));
        assert_eq!(runtime.program_calls(), vec!["1/0".to_string()]);
    }

    #[tokio::test]
    async fn test_load_failure_is_unavailable() {
        let provider = Arc::new(FakeProvider::missing_loader().failing_injections(1));
        let loader = RuntimeLoader::new(
            provider,
            LoadOptions {
                index_url: "https://pypi.org/simple".to_string(),
                full_std_lib: true,
            },
            Duration::from_secs(1),
            Duration::from_secs(1),
        );
        let backend = PythonBackend::new(Arc::new(loader));
        assert!(matches!(
            backend.attempt("print(1)").await,
            BackendOutcome::Unavailable(reason) if reason.contains("unavailable")
        ));
    }
}
