//! Fakes shared by the unit tests.

mod mock_http_server;

pub use mock_http_server::MockHttpServer;

use async_trait::async_trait;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::capture::interpreter::{READ_STDERR, READ_STDOUT, REDIRECT_STREAMS, RESTORE_STREAMS};
use crate::errors::ExecutionError;
use crate::runtime::{InterpreterRuntime, LoadOptions, RuntimeInfo, RuntimeProvider};

#[derive(Clone)]
enum Scripted {
    Stdout(String),
    Stderr(String),
    Value(String),
    Error(String),
}

#[derive(Default)]
struct ScriptState {
    calls: Vec<String>,
    stdout: String,
    stderr: String,
    redirected: bool,
}

/// An interpreter that answers from a table and emulates stream redirection.
#[derive(Default)]
pub struct ScriptedRuntime {
    scripts: HashMap<String, Scripted>,
    state: Mutex<ScriptState>,
}

impl ScriptedRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stdout(mut self, code: &str, text: &str) -> Self {
        self.scripts
            .insert(code.to_string(), Scripted::Stdout(text.to_string()));
        self
    }

    pub fn with_stderr(mut self, code: &str, text: &str) -> Self {
        self.scripts
            .insert(code.to_string(), Scripted::Stderr(text.to_string()));
        self
    }

    pub fn with_value(mut self, code: &str, value: &str) -> Self {
        self.scripts
            .insert(code.to_string(), Scripted::Value(value.to_string()));
        self
    }

    pub fn with_error(mut self, code: &str, message: &str) -> Self {
        self.scripts
            .insert(code.to_string(), Scripted::Error(message.to_string()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Calls that were user code rather than capture plumbing.
    pub fn program_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| ![REDIRECT_STREAMS, READ_STDOUT, READ_STDERR, RESTORE_STREAMS].contains(&c.as_str()))
            .collect()
    }
}

#[async_trait]
impl InterpreterRuntime for ScriptedRuntime {
    async fn run_python(&self, code: &str) -> Result<Option<String>, ExecutionError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(code.to_string());

        match code {
            REDIRECT_STREAMS => {
                state.stdout.clear();
                state.stderr.clear();
                state.redirected = true;
                return Ok(None);
            }
            READ_STDOUT => return Ok(Some(state.stdout.clone())),
            READ_STDERR => return Ok(Some(state.stderr.clone())),
            RESTORE_STREAMS => {
                state.redirected = false;
                return Ok(None);
            }
            _ => {}
        }

        match self.scripts.get(code).cloned() {
            Some(Scripted::Stdout(text)) => {
                if state.redirected {
                    state.stdout.push_str(&text);
                }
                Ok(None)
            }
            Some(Scripted::Stderr(text)) => {
                if state.redirected {
                    state.stderr.push_str(&text);
                }
                Ok(None)
            }
            Some(Scripted::Value(value)) => Ok(Some(value)),
            Some(Scripted::Error(message)) => Err(ExecutionError::ProgramError(message)),
            None => Ok(None),
        }
    }
}

/// A provider that counts how often each acquisition stage runs.
pub struct FakeProvider {
    loader_present: AtomicBool,
    inject_delay: Duration,
    materialize_delay: Duration,
    failing_injections: AtomicUsize,
    injection_installs: bool,
    runtime: Arc<ScriptedRuntime>,
    injections: AtomicUsize,
    materializations: AtomicUsize,
}

impl FakeProvider {
    fn build(loader_present: bool) -> Self {
        Self {
            loader_present: AtomicBool::new(loader_present),
            inject_delay: Duration::ZERO,
            materialize_delay: Duration::ZERO,
            failing_injections: AtomicUsize::new(0),
            injection_installs: true,
            runtime: Arc::new(ScriptedRuntime::new()),
            injections: AtomicUsize::new(0),
            materializations: AtomicUsize::new(0),
        }
    }

    pub fn with_loader() -> Self {
        Self::build(true)
    }

    pub fn missing_loader() -> Self {
        Self::build(false)
    }

    pub fn with_inject_delay(mut self, delay: Duration) -> Self {
        self.inject_delay = delay;
        self
    }

    pub fn with_materialize_delay(mut self, delay: Duration) -> Self {
        self.materialize_delay = delay;
        self
    }

    /// The first `count` injections fail with a script load error.
    pub fn failing_injections(self, count: usize) -> Self {
        self.failing_injections.store(count, Ordering::SeqCst);
        self
    }

    /// Injection succeeds but never makes the loader appear.
    pub fn injection_without_effect(mut self) -> Self {
        self.injection_installs = false;
        self
    }

    pub fn with_runtime(mut self, runtime: Arc<ScriptedRuntime>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn inject_count(&self) -> usize {
        self.injections.load(Ordering::SeqCst)
    }

    pub fn materialize_count(&self) -> usize {
        self.materializations.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuntimeProvider for FakeProvider {
    fn loader_available(&self) -> bool {
        self.loader_present.load(Ordering::SeqCst)
    }

    async fn inject_loader(&self) -> Result<(), ExecutionError> {
        self.injections.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.inject_delay).await;

        let remaining = self.failing_injections.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failing_injections.store(remaining - 1, Ordering::SeqCst);
            return Err(ExecutionError::ScriptLoadError("script onerror fired".to_string()));
        }
        if self.injection_installs {
            self.loader_present.store(true, Ordering::SeqCst);
        }
        Ok(())
    }

    async fn materialize(
        &self,
        _options: &LoadOptions,
    ) -> Result<(Arc<dyn InterpreterRuntime>, RuntimeInfo), ExecutionError> {
        self.materializations.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.materialize_delay).await;
        let runtime: Arc<dyn InterpreterRuntime> = self.runtime.clone();
        Ok((
            runtime,
            RuntimeInfo {
                version: "3.12.7".to_string(),
            },
        ))
    }
}

/// A gzipped tarball laid out like a standalone CPython build.
pub fn runtime_archive() -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    let script = b"#!/bin/sh\nexit 0\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(script.len() as u64);
    header.set_mode(0o755);
    builder
        .append_data(&mut header, "python/bin/python3", &script[..])
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap()
}
