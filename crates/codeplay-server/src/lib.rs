//! HTTP surface for the code playground.
//!
//! Exposes the dispatcher at `POST /api/execute` so a browser front end can
//! run lesson code, and hosts the compile-and-run service the C++ backend
//! talks to at `POST /api/compile`. When no compiler is available the compile
//! route answers 404, which the C++ backend reads as "not deployed" and falls
//! back to its simulator.

pub mod compile;
pub mod error;

pub use compile::CompileService;
pub use error::{Result, ServerError};

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Json as AxumJson, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use axum::{middleware, Router};
use codeplay_core::executors::{CompileRequest, CompileResponse};
use codeplay_core::{ExecutionDispatcher, ExecutionRequest, ExecutionResult, LanguageId};
use serde::Serialize;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

type ApiError = (StatusCode, Json<serde_json::Value>);

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub python_runtime: Option<&'static str>,
    pub compiler_available: bool,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub enable_cors: bool,
    /// CORS allowed origins (if None, allows any origin)
    pub cors_origins: Option<Vec<String>>,
    /// Maximum request body size in bytes
    pub max_body_size: usize,
    pub enable_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3001)),
            enable_cors: true,
            cors_origins: None,
            max_body_size: 256 * 1024,
            enable_logging: true,
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Parse and set the bind address from a string.
    pub fn with_bind_addr_str(mut self, addr: &str) -> Result<Self> {
        self.bind_addr = addr
            .parse()
            .map_err(|e| ServerError::config_error(format!("Invalid bind address: {}", e)))?;
        Ok(self)
    }

    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    pub fn with_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.cors_origins = Some(origins);
        self
    }

    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn with_logging(mut self, enable: bool) -> Self {
        self.enable_logging = enable;
        self
    }
}

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<ExecutionDispatcher>,
    pub compile_service: Arc<CompileService>,
}

async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        python_runtime: state
            .dispatcher
            .runtime_loader()
            .map(|loader| loader.state_name()),
        compiler_available: state.compile_service.is_available(),
    })
}

/// Runs the submitted code. Always 200 once the body parses; the outcome is in `success`.
async fn execute_handler(
    State(state): State<AppState>,
    payload: std::result::Result<AxumJson<ExecutionRequest>, JsonRejection>,
) -> std::result::Result<Json<ExecutionResult>, ApiError> {
    let AxumJson(request) = payload.map_err(|rejection| {
        log::warn!("Rejected execute request: {}", rejection.body_text());
        bad_request(rejection.body_text())
    })?;

    log::info!(
        "Executing {} bytes of '{}'",
        request.source_code.len(),
        request.language
    );
    Ok(Json(state.dispatcher.execute(&request).await))
}

async fn compile_handler(
    State(state): State<AppState>,
    payload: std::result::Result<AxumJson<CompileRequest>, JsonRejection>,
) -> std::result::Result<Json<CompileResponse>, ApiError> {
    if !state.compile_service.is_available() {
        return Err(api_error(&ServerError::CompilerUnavailable(
            "no C++ compiler configured".to_string(),
        )));
    }

    let AxumJson(request) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;

    if request.language.parse::<LanguageId>() != Ok(LanguageId::Cpp) {
        return Err(bad_request(format!(
            "The compile service only accepts C++, got '{}'",
            request.language
        )));
    }

    match state.compile_service.compile_and_run(&request.code).await {
        Ok(response) => Ok(Json(response)),
        Err(e) => {
            log::error!("Compile request failed: {}", e);
            Err(api_error(&e))
        }
    }
}

fn bad_request(details: impl Into<String>) -> ApiError {
    api_error(&ServerError::invalid_request(details))
}

fn api_error(error: &ServerError) -> ApiError {
    let status =
        StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (
        status,
        Json(json!({
            "error": error.error_type(),
            "details": error.to_string(),
            "timestamp": chrono::Utc::now()
        })),
    )
}

pub struct PlaygroundServer {
    state: AppState,
    config: ServerConfig,
}

impl PlaygroundServer {
    pub fn new(dispatcher: Arc<ExecutionDispatcher>, compile_service: CompileService) -> Self {
        Self::with_config(dispatcher, compile_service, ServerConfig::default())
    }

    pub fn with_config(
        dispatcher: Arc<ExecutionDispatcher>,
        compile_service: CompileService,
        config: ServerConfig,
    ) -> Self {
        Self {
            state: AppState {
                dispatcher,
                compile_service: Arc::new(compile_service),
            },
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn build_router(&self) -> Router {
        let mut router = Router::new()
            .route("/health", get(health_handler))
            .route("/api/execute", post(execute_handler))
            .route("/api/compile", post(compile_handler))
            .layer(DefaultBodyLimit::max(self.config.max_body_size))
            .with_state(self.state.clone());

        if self.config.enable_logging {
            router = router.layer(middleware::from_fn(
                |request: axum::http::Request<axum::body::Body>, next: axum::middleware::Next| async {
                    let request_id = uuid::Uuid::new_v4().to_string();
                    let method = request.method().clone();
                    let uri = request.uri().clone();

                    // Health probes are frequent; keep them out of the info log.
                    if uri.path() == "/health" {
                        log::debug!("Request {} {} {}", request_id, method, uri);
                    } else {
                        log::info!("Request {} {} {}", request_id, method, uri);
                    }

                    let start = std::time::Instant::now();
                    let response = next.run(request).await;
                    log::debug!(
                        "Response {} {} in {:?}",
                        request_id,
                        response.status(),
                        start.elapsed()
                    );
                    response
                },
            ));
        }

        router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            let cors_layer = match &self.config.cors_origins {
                Some(origins) => {
                    let origins: std::result::Result<Vec<_>, _> =
                        origins.iter().map(|s| s.parse()).collect();
                    match origins {
                        Ok(origins) => CorsLayer::new()
                            .allow_origin(origins)
                            .allow_methods(Any)
                            .allow_headers(Any),
                        Err(_) => {
                            log::warn!("Invalid CORS origin configured, allowing any origin");
                            CorsLayer::permissive()
                        }
                    }
                }
                None => CorsLayer::permissive(),
            };
            router = router.layer(cors_layer);
        }

        router
    }

    /// Serve until `shutdown_signal` resolves.
    pub async fn serve_with_shutdown<F>(self, shutdown_signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let router = self.build_router();
        let listener = TcpListener::bind(self.config.bind_addr)
            .await
            .map_err(|e| {
                ServerError::config_error(format!(
                    "Failed to bind to {}: {}",
                    self.config.bind_addr, e
                ))
            })?;

        log::info!("codeplay server listening on {}", self.config.bind_addr);
        log::info!("Execute endpoint: http://{}/api/execute", self.config.bind_addr);
        match self.state.compile_service.compiler() {
            Some(compiler) => log::info!(
                "Compile endpoint: http://{}/api/compile ({})",
                self.config.bind_addr,
                compiler.display()
            ),
            None => log::warn!("No C++ compiler available; /api/compile will answer 404"),
        }

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal)
            .await
            .map_err(|e| ServerError::internal(format!("Server error: {}", e)))?;

        log::info!("codeplay server shut down gracefully");
        Ok(())
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            log::info!("Received Ctrl+C, shutting down...");
        },
        _ = terminate => {
            log::info!("Received SIGTERM, shutting down...");
        },
    }
}
