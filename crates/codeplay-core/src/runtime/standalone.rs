//! Standalone CPython provider.
//!
//! The "loader" is a relocatable CPython build unpacked under the runtime home
//! (`<home>/python/bin/python3`). When it is missing it is downloaded from the
//! configured archive URL; a `python3` on `PATH` may stand in for it.

use async_trait::async_trait;
use flate2::read::GzDecoder;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tar::Archive;
use which::which;

use super::bridge::PythonProcessRuntime;
use super::{InterpreterRuntime, LoadOptions, RuntimeInfo, RuntimeProvider};
use crate::config::PythonRuntimeConfig;
use crate::errors::ExecutionError;

#[derive(Clone)]
pub struct StandalonePythonProvider {
    home: PathBuf,
    script_url: String,
    script_sha256: Option<String>,
    use_system_python: bool,
    client: reqwest::Client,
}

impl StandalonePythonProvider {
    pub fn new(home: PathBuf, script_url: impl Into<String>) -> Self {
        Self {
            home,
            script_url: script_url.into(),
            script_sha256: None,
            use_system_python: false,
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &PythonRuntimeConfig) -> Result<Self, ExecutionError> {
        Ok(Self::new(config.resolved_home()?, config.script_url.clone())
            .with_expected_sha256(config.script_sha256.clone())
            .with_system_python(config.use_system_python))
    }

    pub fn with_expected_sha256(mut self, sha256: Option<String>) -> Self {
        self.script_sha256 = sha256.map(|s| s.to_lowercase());
        self
    }

    pub fn with_system_python(mut self, enabled: bool) -> Self {
        self.use_system_python = enabled;
        self
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn bundled_interpreter(&self) -> PathBuf {
        if cfg!(windows) {
            self.home.join("python").join("python.exe")
        } else {
            self.home.join("python").join("bin").join("python3")
        }
    }

    pub fn is_installed(&self) -> bool {
        self.bundled_interpreter().exists()
    }

    /// The interpreter that would be used, preferring the bundled one.
    pub fn interpreter_path(&self) -> Option<PathBuf> {
        let bundled = self.bundled_interpreter();
        if bundled.exists() {
            return Some(bundled);
        }
        if self.use_system_python {
            return which("python3").ok();
        }
        None
    }

    /// Download and unpack the bundled interpreter, replacing any previous one.
    pub async fn install(&self) -> Result<PathBuf, ExecutionError> {
        log::info!("Downloading Python runtime from {}", self.script_url);
        let response = self
            .client
            .get(&self.script_url)
            .header("User-Agent", "codeplay")
            .send()
            .await
            .map_err(|e| {
                ExecutionError::ScriptLoadError(format!("Failed to download runtime: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(ExecutionError::ScriptLoadError(format!(
                "Failed to download runtime: HTTP {} from {}",
                response.status(),
                self.script_url
            )));
        }

        let bytes = response.bytes().await.map_err(|e| {
            ExecutionError::ScriptLoadError(format!("Failed to read runtime archive: {}", e))
        })?;

        if let Some(expected) = &self.script_sha256 {
            let actual = format!("{:x}", Sha256::digest(&bytes));
            if &actual != expected {
                return Err(ExecutionError::ScriptLoadError(format!(
                    "Runtime archive checksum mismatch: expected {}, got {}",
                    expected, actual
                )));
            }
        }

        let home = self.home.clone();
        tokio::task::spawn_blocking(move || unpack_runtime(&bytes, &home)).await??;

        let interpreter = self.bundled_interpreter();
        log::info!("Python runtime installed at {}", interpreter.display());
        Ok(interpreter)
    }
}

/// Unpack into a staging directory, then move `python/` into place.
fn unpack_runtime(bytes: &[u8], home: &Path) -> Result<(), ExecutionError> {
    let staging = home.join(format!(".staging-{}", std::process::id()));
    if staging.exists() {
        fs::remove_dir_all(&staging)?;
    }
    fs::create_dir_all(&staging)?;

    let mut archive = Archive::new(GzDecoder::new(Cursor::new(bytes)));
    archive.unpack(&staging).map_err(|e| {
        ExecutionError::InstallerError(format!("Failed to extract runtime archive: {}", e))
    })?;

    let extracted = staging.join("python");
    if !extracted.is_dir() {
        let _ = fs::remove_dir_all(&staging);
        return Err(ExecutionError::InstallerError(
            "Runtime archive has no top-level python/ directory".to_string(),
        ));
    }

    let target = home.join("python");
    if target.exists() {
        fs::remove_dir_all(&target)?;
    }
    fs::rename(&extracted, &target)?;
    let _ = fs::remove_dir_all(&staging);
    Ok(())
}

#[async_trait]
impl RuntimeProvider for StandalonePythonProvider {
    fn loader_available(&self) -> bool {
        self.interpreter_path().is_some()
    }

    async fn inject_loader(&self) -> Result<(), ExecutionError> {
        self.install().await.map(|_| ())
    }

    async fn materialize(
        &self,
        options: &LoadOptions,
    ) -> Result<(Arc<dyn InterpreterRuntime>, RuntimeInfo), ExecutionError> {
        let interpreter = self.interpreter_path().ok_or_else(|| {
            ExecutionError::RuntimeInitError("No Python interpreter available".to_string())
        })?;
        let (runtime, info) = PythonProcessRuntime::spawn(&interpreter, options).await?;
        Ok((Arc::new(runtime), info))
    }
}
