use async_trait::async_trait;
use axum::http::StatusCode;
use axum::routing::post;
use axum::Router;
use codeplay_core::capture::interpreter::READ_STDOUT;
use codeplay_core::executors::{JavaScriptBackend, PythonBackend, RemoteCompileBackend};
use codeplay_core::runtime::{InterpreterRuntime, LoadOptions, RuntimeInfo, RuntimeProvider};
use codeplay_core::{
    CppSimulator, ExecutionDispatcher, ExecutionError, ExecutionResult, LanguageId,
    PythonSimulator, RuntimeLoader, Simulator, SimulatorBackend, StandalonePythonProvider,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Prints "ran" for every program.
struct EchoRuntime;

#[async_trait]
impl InterpreterRuntime for EchoRuntime {
    async fn run_python(&self, code: &str) -> Result<Option<String>, ExecutionError> {
        if code == READ_STDOUT {
            Ok(Some("ran\n".to_string()))
        } else {
            Ok(None)
        }
    }
}

struct SlowProvider {
    inject_delay: Duration,
    injections: AtomicUsize,
}

impl SlowProvider {
    fn new(inject_delay: Duration) -> Self {
        Self {
            inject_delay,
            injections: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl RuntimeProvider for SlowProvider {
    fn loader_available(&self) -> bool {
        self.injections.load(Ordering::SeqCst) > 0
    }

    async fn inject_loader(&self) -> Result<(), ExecutionError> {
        tokio::time::sleep(self.inject_delay).await;
        self.injections.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn materialize(
        &self,
        _options: &LoadOptions,
    ) -> Result<(Arc<dyn InterpreterRuntime>, RuntimeInfo), ExecutionError> {
        let runtime: Arc<dyn InterpreterRuntime> = Arc::new(EchoRuntime);
        Ok((
            runtime,
            RuntimeInfo {
                version: "3.12.7".to_string(),
            },
        ))
    }
}

fn python_dispatcher(provider: Arc<SlowProvider>, script_timeout: Duration) -> ExecutionDispatcher {
    let loader = Arc::new(RuntimeLoader::new(
        provider,
        LoadOptions {
            index_url: "https://pypi.org/simple".to_string(),
            full_std_lib: true,
        },
        script_timeout,
        Duration::from_secs(1),
    ));
    ExecutionDispatcher::builder()
        .with_backend(LanguageId::Python, Arc::new(PythonBackend::new(loader.clone())))
        .with_backend(LanguageId::Python, Arc::new(SimulatorBackend::new(PythonSimulator)))
        .with_runtime_loader(loader)
        .build()
}

async fn start_not_found_service() -> (String, tokio::sync::oneshot::Sender<()>) {
    let app = Router::new().route("/api/compile", post(|| async { StatusCode::NOT_FOUND }));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                shutdown_rx.await.ok();
            })
            .await
            .unwrap();
    });
    (format!("http://{}/api/compile", addr), shutdown_tx)
}

#[tokio::test]
async fn javascript_scenarios() {
    init_logging();
    let dispatcher = ExecutionDispatcher::builder()
        .with_backend(LanguageId::JavaScript, Arc::new(JavaScriptBackend::new()))
        .build();

    assert_eq!(
        dispatcher.execute_source("javascript", "2 + 2").await,
        ExecutionResult::success("4")
    );
    assert_eq!(
        dispatcher
            .execute_source("js", "throw new Error('x')")
            .await,
        ExecutionResult::failure("Error: x")
    );
    assert_eq!(
        dispatcher
            .execute_source("javascript", "console.log(\"a\"); console.log(\"b\")")
            .await,
        ExecutionResult::success("a\nb")
    );
}

#[tokio::test]
async fn unsupported_language_is_reported() {
    let dispatcher = ExecutionDispatcher::builder().build();
    assert_eq!(
        dispatcher.execute_source("ruby", "puts 'hi'").await,
        ExecutionResult::failure("Language \"ruby\" not supported yet.")
    );
}

#[tokio::test]
async fn python_timeout_falls_back_to_simulator() {
    init_logging();
    let provider = Arc::new(SlowProvider::new(Duration::from_secs(5)));
    let dispatcher = python_dispatcher(provider, Duration::from_millis(50));

    let source = "print('hello')";
    let result = dispatcher.execute_source("python", source).await;

    assert_eq!(result, PythonSimulator.simulate(source));
    assert_eq!(result, ExecutionResult::success("hello"));
    assert_eq!(
        dispatcher.runtime_loader().map(|loader| loader.state_name()),
        Some("absent")
    );
}

#[tokio::test]
#[ignore = "requires python3"]
async fn python_exception_falls_back_to_simulator_with_system_python() {
    init_logging();
    let home = tempfile::tempdir().unwrap();
    let provider = Arc::new(
        StandalonePythonProvider::new(home.path().to_path_buf(), "http://127.0.0.1:9/python.tar.gz")
            .with_system_python(true),
    );
    let loader = Arc::new(RuntimeLoader::new(
        provider,
        LoadOptions {
            index_url: "https://pypi.org/simple".to_string(),
            full_std_lib: true,
        },
        Duration::from_secs(10),
        Duration::from_secs(10),
    ));
    let dispatcher = ExecutionDispatcher::builder()
        .with_backend(LanguageId::Python, Arc::new(PythonBackend::new(loader.clone())))
        .with_backend(LanguageId::Python, Arc::new(SimulatorBackend::new(PythonSimulator)))
        .with_runtime_loader(loader)
        .build();

    assert_eq!(
        dispatcher.execute_source("python", "print(sum(range(5)))").await,
        ExecutionResult::success("10")
    );

    let source = "print('before')\nraise ValueError('boom')";
    let result = dispatcher.execute_source("python", source).await;
    assert_eq!(result, PythonSimulator.simulate(source));
    assert_eq!(result, ExecutionResult::success("before"));

    let source = "name = input()\nprint('after')";
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        dispatcher.execute_source("python", source),
    )
    .await
    .unwrap();
    assert_eq!(result, PythonSimulator.simulate(source));

    assert_eq!(
        dispatcher.execute_source("python", "print('still', 'here')").await,
        ExecutionResult::success("still here")
    );
}

#[tokio::test]
async fn concurrent_python_runs_share_one_injection() {
    init_logging();
    let provider = Arc::new(SlowProvider::new(Duration::from_millis(100)));
    let dispatcher = python_dispatcher(provider.clone(), Duration::from_secs(2));

    let (first, second) = tokio::join!(
        dispatcher.execute_source("python", "print(1)"),
        dispatcher.execute_source("python", "print(2)"),
    );

    assert_eq!(first, ExecutionResult::success("ran"));
    assert_eq!(second, ExecutionResult::success("ran"));
    assert_eq!(provider.injections.load(Ordering::SeqCst), 1);

    dispatcher.execute_source("python", "print(3)").await;
    assert_eq!(provider.injections.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cpp_not_found_matches_simulator() {
    init_logging();
    let (endpoint, shutdown) = start_not_found_service().await;
    let dispatcher = ExecutionDispatcher::builder()
        .with_backend(
            LanguageId::Cpp,
            Arc::new(RemoteCompileBackend::new(endpoint, Duration::from_secs(5)).unwrap()),
        )
        .with_backend(LanguageId::Cpp, Arc::new(SimulatorBackend::new(CppSimulator)))
        .build();

    let source = "std::cout << \"hi\" << std::endl;";
    let result = dispatcher.execute_source("cpp", source).await;

    assert_eq!(result, CppSimulator.simulate(source));
    assert!(result.success);
    assert!(result.output.contains("hi"));
    assert!(result.output.contains("#include"));
    assert!(result.output.contains("main()"));

    let _ = shutdown.send(());
}
