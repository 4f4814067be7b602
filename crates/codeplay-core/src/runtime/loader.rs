//! Single-flight acquisition of the process-wide interpreter runtime.

use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{LoadOptions, RuntimeHandle, RuntimeProvider};
use crate::config::PythonRuntimeConfig;
use crate::errors::ExecutionError;

type PendingLoad = Shared<BoxFuture<'static, Result<RuntimeHandle, ExecutionError>>>;

/// Lifecycle of the cached runtime.
pub enum LoaderState {
    Absent,
    /// An acquisition is in flight; every caller awaits this same future.
    Loading(PendingLoad),
    Ready(RuntimeHandle),
}

impl LoaderState {
    pub fn name(&self) -> &'static str {
        match self {
            LoaderState::Absent => "absent",
            LoaderState::Loading(_) => "loading",
            LoaderState::Ready(_) => "ready",
        }
    }
}

/// Acquires the interpreter runtime at most once at a time and caches it.
///
/// A failed acquisition returns the loader to `Absent`, so a later request
/// may try again; a successful one is kept for the lifetime of the loader.
pub struct RuntimeLoader {
    provider: Arc<dyn RuntimeProvider>,
    options: LoadOptions,
    script_timeout: Duration,
    init_timeout: Duration,
    state: Mutex<LoaderState>,
}

impl RuntimeLoader {
    pub fn new(
        provider: Arc<dyn RuntimeProvider>,
        options: LoadOptions,
        script_timeout: Duration,
        init_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            options,
            script_timeout,
            init_timeout,
            state: Mutex::new(LoaderState::Absent),
        }
    }

    pub fn from_config(provider: Arc<dyn RuntimeProvider>, config: &PythonRuntimeConfig) -> Self {
        Self::new(
            provider,
            LoadOptions {
                index_url: config.index_url.clone(),
                full_std_lib: config.full_std_lib,
            },
            config.script_timeout(),
            config.init_timeout(),
        )
    }

    pub fn state_name(&self) -> &'static str {
        self.lock_state().name()
    }

    pub fn is_ready(&self) -> bool {
        matches!(&*self.lock_state(), LoaderState::Ready(_))
    }

    /// Return the cached runtime, joining or starting an acquisition if needed.
    pub async fn acquire(&self) -> Result<RuntimeHandle, ExecutionError> {
        let pending = {
            let mut state = self.lock_state();
            match &*state {
                LoaderState::Ready(handle) => return Ok(handle.clone()),
                LoaderState::Loading(pending) => {
                    log::debug!("Joining in-flight Python runtime acquisition");
                    pending.clone()
                }
                LoaderState::Absent => {
                    log::info!("Acquiring Python runtime");
                    let pending = acquire_runtime(
                        self.provider.clone(),
                        self.options.clone(),
                        self.script_timeout,
                        self.init_timeout,
                    )
                    .boxed()
                    .shared();
                    *state = LoaderState::Loading(pending.clone());
                    pending
                }
            }
        };

        let result = pending.clone().await;

        let mut state = self.lock_state();
        let settles_current = matches!(&*state, LoaderState::Loading(current) if current.ptr_eq(&pending));
        if settles_current {
            *state = match &result {
                Ok(handle) => LoaderState::Ready(handle.clone()),
                Err(e) => {
                    log::warn!("Python runtime acquisition failed: {}", e);
                    LoaderState::Absent
                }
            };
        }
        result
    }

    /// Warm the cache without running anything.
    pub async fn preload(&self) -> Result<(), ExecutionError> {
        self.acquire().await.map(|_| ())
    }

    fn lock_state(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn acquire_runtime(
    provider: Arc<dyn RuntimeProvider>,
    options: LoadOptions,
    script_timeout: Duration,
    init_timeout: Duration,
) -> Result<RuntimeHandle, ExecutionError> {
    if !provider.loader_available() {
        log::info!("Runtime loader not present, fetching it");
        first_settled("loading the runtime script", script_timeout, provider.inject_loader())
            .await?;
        if !provider.loader_available() {
            return Err(ExecutionError::ScriptLoadError(
                "loader entry point still missing after the script loaded".to_string(),
            ));
        }
    }

    let (runtime, info) = first_settled(
        "initializing the runtime",
        init_timeout,
        provider.materialize(&options),
    )
    .await?;

    log::info!("Python runtime {} ready", info.version);
    Ok(RuntimeHandle::new(runtime, info))
}

/// Race `task` against a timer; whichever settles first wins.
async fn first_settled<T>(
    stage: &str,
    limit: Duration,
    task: impl Future<Output = Result<T, ExecutionError>>,
) -> Result<T, ExecutionError> {
    tokio::select! {
        outcome = task => outcome,
        _ = tokio::time::sleep(limit) => {
            log::warn!("Timed out after {:?} while {}", limit, stage);
            Err(ExecutionError::timeout(stage, limit))
        }
    }
}
