//! The execution dispatcher: one entry point, one fallback chain per language.

use futures_util::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use super::{Backend, JavaScriptBackend, PythonBackend, RemoteCompileBackend};
use crate::config::PlaygroundConfig;
use crate::core_types::{
    BackendOutcome, ExecutionRequest, ExecutionResult, LanguageId, EMPTY_SOURCE_PROMPT,
};
use crate::errors::ExecutionError;
use crate::runtime::{RuntimeLoader, StandalonePythonProvider};
use crate::simulators::{CppSimulator, PythonSimulator, SimulatorBackend};

/// Routes each request through its language's backend chain.
///
/// `execute` never fails: program errors come back as `success: false`
/// results and infrastructure problems fall through to the next tier.
pub struct ExecutionDispatcher {
    chains: HashMap<LanguageId, Vec<Arc<dyn Backend>>>,
    runtime_loader: Option<Arc<RuntimeLoader>>,
}

impl ExecutionDispatcher {
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// The standard chains:
    /// JavaScript → in-process engine;
    /// Python → loaded runtime → simulator;
    /// C++ → remote compile service → simulator.
    pub fn from_config(config: &PlaygroundConfig) -> Result<Self, ExecutionError> {
        let provider = Arc::new(StandalonePythonProvider::from_config(&config.python.runtime)?);
        let loader = Arc::new(RuntimeLoader::from_config(provider, &config.python.runtime));

        Ok(Self::builder()
            .with_backend(
                LanguageId::JavaScript,
                Arc::new(JavaScriptBackend::from_config(&config.javascript)),
            )
            .with_backend(LanguageId::Python, Arc::new(PythonBackend::new(loader.clone())))
            .with_backend(
                LanguageId::Python,
                Arc::new(SimulatorBackend::new(PythonSimulator)),
            )
            .with_backend(
                LanguageId::Cpp,
                Arc::new(RemoteCompileBackend::from_config(&config.cpp)?),
            )
            .with_backend(LanguageId::Cpp, Arc::new(SimulatorBackend::new(CppSimulator)))
            .with_runtime_loader(loader)
            .build())
    }

    /// Direct evaluation for JavaScript, simulators for Python and C++.
    pub fn simulation_only(config: &PlaygroundConfig) -> Self {
        Self::builder()
            .with_backend(
                LanguageId::JavaScript,
                Arc::new(JavaScriptBackend::from_config(&config.javascript)),
            )
            .with_backend(
                LanguageId::Python,
                Arc::new(SimulatorBackend::new(PythonSimulator)),
            )
            .with_backend(LanguageId::Cpp, Arc::new(SimulatorBackend::new(CppSimulator)))
            .build()
    }

    pub fn runtime_loader(&self) -> Option<&Arc<RuntimeLoader>> {
        self.runtime_loader.as_ref()
    }

    pub fn chain_names(&self, language: LanguageId) -> Vec<&'static str> {
        self.chains
            .get(&language)
            .map(|chain| chain.iter().map(|backend| backend.name()).collect())
            .unwrap_or_default()
    }

    pub async fn execute(&self, request: &ExecutionRequest) -> ExecutionResult {
        if request.is_blank() {
            return ExecutionResult::failure(EMPTY_SOURCE_PROMPT);
        }

        let language = match request.language_id() {
            Ok(language) => language,
            Err(_) => {
                log::info!("Rejected unsupported language '{}'", request.language);
                return ExecutionResult::unsupported_language(&request.language);
            }
        };

        self.run_chain(language, &request.source_code).await
    }

    pub async fn execute_source(&self, language: &str, source_code: &str) -> ExecutionResult {
        self.execute(&ExecutionRequest::new(language, source_code)).await
    }

    async fn run_chain(&self, language: LanguageId, source: &str) -> ExecutionResult {
        let chain = self.chains.get(&language).map(Vec::as_slice).unwrap_or_default();

        for backend in chain {
            let attempt = AssertUnwindSafe(backend.attempt(source)).catch_unwind().await;
            match attempt {
                Ok(BackendOutcome::Succeeded(result)) | Ok(BackendOutcome::Failed(result)) => {
                    log::debug!(
                        "{} answered {} request (success: {})",
                        backend.name(),
                        language,
                        result.success
                    );
                    return result;
                }
                Ok(BackendOutcome::Unavailable(reason)) => {
                    log::warn!("{} unavailable, trying next tier: {}", backend.name(), reason);
                }
                Err(_) => {
                    log::error!("{} panicked, trying next tier", backend.name());
                }
            }
        }

        ExecutionResult::error(format!(
            "no execution backend available for {}",
            language
        ))
    }
}

#[derive(Default)]
pub struct DispatcherBuilder {
    chains: HashMap<LanguageId, Vec<Arc<dyn Backend>>>,
    runtime_loader: Option<Arc<RuntimeLoader>>,
}

impl DispatcherBuilder {
    /// Append a tier to `language`'s chain.
    pub fn with_backend(mut self, language: LanguageId, backend: Arc<dyn Backend>) -> Self {
        self.chains.entry(language).or_default().push(backend);
        self
    }

    /// Replace `language`'s chain.
    pub fn with_chain(mut self, language: LanguageId, chain: Vec<Arc<dyn Backend>>) -> Self {
        self.chains.insert(language, chain);
        self
    }

    pub fn with_runtime_loader(mut self, loader: Arc<RuntimeLoader>) -> Self {
        self.runtime_loader = Some(loader);
        self
    }

    pub fn build(self) -> ExecutionDispatcher {
        ExecutionDispatcher {
            chains: self.chains,
            runtime_loader: self.runtime_loader,
        }
    }
}
