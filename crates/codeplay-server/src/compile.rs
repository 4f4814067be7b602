//! Compile-and-run service behind `POST /api/compile`.
//!
//! The service writes the submitted source into a scratch directory, builds it
//! with the host C++ compiler and runs the binary under a wall-clock limit.
//! There is no other isolation: only deploy it where the submitted code is
//! trusted as much as the host.

use codeplay_core::executors::CompileResponse;
use codeplay_core::CompileServiceConfig;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

use crate::error::{Result, ServerError};

/// Compilers tried in order when none is configured.
pub const COMPILER_CANDIDATES: [&str; 3] = ["g++", "clang++", "c++"];

/// Upper bound on a single compiler invocation.
const COMPILE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct CompileService {
    compiler: Option<PathBuf>,
    flags: Vec<String>,
    run_timeout: Duration,
}

impl CompileService {
    /// Resolve the compiler named in the configuration, or the first candidate on `PATH`.
    pub fn from_config(config: &CompileServiceConfig) -> Self {
        let compiler = if !config.enabled {
            log::info!("Compile service disabled by configuration");
            None
        } else {
            match &config.compiler {
                Some(name) => match which::which(name) {
                    Ok(path) => Some(path),
                    Err(e) => {
                        log::warn!("Configured compiler '{}' not found: {}", name, e);
                        None
                    }
                },
                None => COMPILER_CANDIDATES
                    .iter()
                    .find_map(|candidate| which::which(candidate).ok()),
            }
        };

        if let Some(path) = &compiler {
            log::info!("Compile service using {}", path.display());
        }

        Self {
            compiler,
            flags: config.flags.clone(),
            run_timeout: config.run_timeout(),
        }
    }

    /// A service that answers every request as not configured.
    pub fn disabled() -> Self {
        Self {
            compiler: None,
            flags: Vec::new(),
            run_timeout: Duration::from_secs(10),
        }
    }

    pub fn compiler(&self) -> Option<&Path> {
        self.compiler.as_deref()
    }

    pub fn is_available(&self) -> bool {
        self.compiler.is_some()
    }

    pub async fn compile_and_run(&self, code: &str) -> Result<CompileResponse> {
        let compiler = self.compiler.as_ref().ok_or_else(|| {
            ServerError::CompilerUnavailable("no C++ compiler configured".to_string())
        })?;

        let workdir = tempfile::tempdir()?;
        let source = workdir.path().join("main.cpp");
        let binary = workdir.path().join("main");
        tokio::fs::write(&source, code).await?;

        let mut build = Command::new(compiler);
        build
            .args(&self.flags)
            .arg(&source)
            .arg("-o")
            .arg(&binary)
            .current_dir(workdir.path());

        let compiled = match run_with_limit(build, COMPILE_TIMEOUT).await? {
            Some(output) => output,
            None => {
                return Ok(failed(
                    None,
                    format!("Compilation timed out after {}s", COMPILE_TIMEOUT.as_secs()),
                ))
            }
        };

        if !compiled.status.success() {
            let scratch_prefix = format!(
                "{}{}",
                workdir.path().display(),
                std::path::MAIN_SEPARATOR
            );
            let diagnostics = String::from_utf8_lossy(&compiled.stderr)
                .replace(&scratch_prefix, "")
                .trim()
                .to_string();
            log::debug!("Compilation failed: {}", diagnostics);
            return Ok(failed(None, format!("Compilation failed:\n{}", diagnostics)));
        }

        let mut run = Command::new(&binary);
        run.current_dir(workdir.path());

        let ran = match run_with_limit(run, self.run_timeout).await? {
            Some(output) => output,
            None => {
                return Ok(failed(
                    None,
                    format!(
                        "Program timed out after {}s and was terminated",
                        self.run_timeout.as_secs_f32()
                    ),
                ))
            }
        };

        let stdout = String::from_utf8_lossy(&ran.stdout).to_string();
        let stderr = String::from_utf8_lossy(&ran.stderr).trim().to_string();

        if ran.status.success() {
            Ok(CompileResponse {
                success: true,
                output: Some(stdout),
                error: None,
            })
        } else {
            let reason = if stderr.is_empty() {
                format!("Program exited with {}", ran.status)
            } else {
                stderr
            };
            Ok(failed(Some(stdout).filter(|s| !s.is_empty()), reason))
        }
    }
}

fn failed(output: Option<String>, error: String) -> CompileResponse {
    CompileResponse {
        success: false,
        output,
        error: Some(error),
    }
}

/// Run to completion, or kill the child and return `None` once `limit` elapses.
async fn run_with_limit(mut command: Command, limit: Duration) -> Result<Option<Output>> {
    let child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    match tokio::time::timeout(limit, child.wait_with_output()).await {
        Ok(output) => Ok(Some(output?)),
        Err(_) => Ok(None),
    }
}
