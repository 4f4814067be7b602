//! Configuration type definitions for the playground
//!
//! Every section is optional in YAML; a missing section or field falls back to
//! the defaults below, so an empty document is a valid configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ExecutionError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaygroundConfig {
    #[serde(default)]
    pub javascript: JavaScriptConfig,
    #[serde(default)]
    pub python: PythonConfig,
    #[serde(default)]
    pub cpp: CppConfig,
    #[serde(default)]
    pub compile_service: CompileServiceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JavaScriptConfig {
    /// Abort evaluation after this many loop iterations. Unlimited when unset.
    #[serde(default)]
    pub loop_iteration_limit: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PythonConfig {
    #[serde(default)]
    pub runtime: PythonRuntimeConfig,
}

/// Where and how the Python interpreter runtime is acquired.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PythonRuntimeConfig {
    /// Archive fetched when no interpreter is available locally.
    #[serde(default = "default_script_url")]
    pub script_url: String,
    /// Expected SHA-256 of the archive, hex encoded.
    #[serde(default)]
    pub script_sha256: Option<String>,
    /// Package index handed to the interpreter.
    #[serde(default = "default_index_url")]
    pub index_url: String,
    #[serde(default = "default_true")]
    pub full_std_lib: bool,
    #[serde(default = "default_script_timeout_ms")]
    pub script_timeout_ms: u64,
    #[serde(default = "default_init_timeout_ms")]
    pub init_timeout_ms: u64,
    /// Directory holding downloaded runtimes. Defaults to `~/.codeplay`.
    #[serde(default)]
    pub runtime_home: Option<PathBuf>,
    /// Accept a `python3` already on `PATH` instead of downloading one.
    #[serde(default = "default_true")]
    pub use_system_python: bool,
}

impl Default for PythonRuntimeConfig {
    fn default() -> Self {
        Self {
            script_url: default_script_url(),
            script_sha256: None,
            index_url: default_index_url(),
            full_std_lib: true,
            script_timeout_ms: default_script_timeout_ms(),
            init_timeout_ms: default_init_timeout_ms(),
            runtime_home: None,
            use_system_python: true,
        }
    }
}

impl PythonRuntimeConfig {
    pub fn script_timeout(&self) -> Duration {
        Duration::from_millis(self.script_timeout_ms)
    }

    pub fn init_timeout(&self) -> Duration {
        Duration::from_millis(self.init_timeout_ms)
    }

    pub fn resolved_home(&self) -> Result<PathBuf, ExecutionError> {
        if let Some(home) = &self.runtime_home {
            return Ok(home.clone());
        }
        dirs::home_dir()
            .map(|home| home.join(".codeplay"))
            .ok_or_else(|| {
                ExecutionError::ConfigError("Could not determine home directory.".to_string())
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CppConfig {
    #[serde(default = "default_compile_endpoint")]
    pub compile_endpoint: String,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for CppConfig {
    fn default() -> Self {
        Self {
            compile_endpoint: default_compile_endpoint(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl CppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

/// Settings for the server-side compile service behind `/api/compile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileServiceConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Compiler executable. Searched on `PATH` when unset.
    #[serde(default)]
    pub compiler: Option<String>,
    #[serde(default = "default_compiler_flags")]
    pub flags: Vec<String>,
    #[serde(default = "default_run_timeout_ms")]
    pub run_timeout_ms: u64,
}

impl Default for CompileServiceConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            compiler: None,
            flags: default_compiler_flags(),
            run_timeout_ms: default_run_timeout_ms(),
        }
    }
}

impl CompileServiceConfig {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_script_timeout_ms() -> u64 {
    15_000
}

fn default_init_timeout_ms() -> u64 {
    20_000
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_run_timeout_ms() -> u64 {
    10_000
}

fn default_index_url() -> String {
    "https://pypi.org/simple".to_string()
}

fn default_compile_endpoint() -> String {
    "http://127.0.0.1:3001/api/compile".to_string()
}

fn default_compiler_flags() -> Vec<String> {
    vec!["-std=c++17".to_string(), "-O0".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Standalone CPython build matching the host platform.
pub fn default_script_url() -> String {
    let arch = match std::env::consts::ARCH {
        "aarch64" => "aarch64",
        _ => "x86_64",
    };
    let target = match std::env::consts::OS {
        "macos" => format!("{}-apple-darwin", arch),
        _ => format!("{}-unknown-linux-gnu", arch),
    };
    format!(
        "https://github.com/astral-sh/python-build-standalone/releases/download/20241016/cpython-3.12.7+20241016-{}-install_only.tar.gz",
        target
    )
}
