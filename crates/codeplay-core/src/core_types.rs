//! Request, result and outcome types shared by every execution tier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Message returned by the dispatcher when asked to run blank source.
pub const EMPTY_SOURCE_PROMPT: &str = "Please write some code before running.";

/// The closed set of languages the playground can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageId {
    JavaScript,
    Python,
    Cpp,
}

impl LanguageId {
    pub const ALL: [LanguageId; 3] = [LanguageId::JavaScript, LanguageId::Python, LanguageId::Cpp];

    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageId::JavaScript => "javascript",
            LanguageId::Python => "python",
            LanguageId::Cpp => "cpp",
        }
    }

    /// Guess the language from a file extension (without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "js" | "mjs" | "cjs" => Some(LanguageId::JavaScript),
            "py" => Some(LanguageId::Python),
            "cpp" | "cc" | "cxx" | "c++" | "hpp" => Some(LanguageId::Cpp),
            _ => None,
        }
    }
}

impl fmt::Display for LanguageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LanguageId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "javascript" | "js" | "node" | "nodejs" => Ok(LanguageId::JavaScript),
            "python" | "py" | "python3" => Ok(LanguageId::Python),
            "cpp" | "c++" | "cxx" | "cc" => Ok(LanguageId::Cpp),
            _ => Err(format!("Language \"{}\" not supported yet.", s)),
        }
    }
}

/// A single "run my code" request as it arrives from the presentation layer.
///
/// The language tag is kept verbatim so an unsupported value can be echoed
/// back to the user exactly as it was given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub language: String,
    #[serde(rename = "code", alias = "sourceCode")]
    pub source_code: String,
}

impl ExecutionRequest {
    pub fn new(language: impl Into<String>, source_code: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            source_code: source_code.into(),
        }
    }

    pub fn language_id(&self) -> Result<LanguageId, String> {
        self.language.parse()
    }

    pub fn is_blank(&self) -> bool {
        self.source_code.trim().is_empty()
    }
}

/// Normalized answer handed back to the caller. `output` is always text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub output: String,
}

impl ExecutionResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
        }
    }

    /// A failure whose output carries the conventional `Error: ` prefix.
    pub fn error(message: impl AsRef<str>) -> Self {
        let message = message.as_ref();
        if message.starts_with("Error:") {
            Self::failure(message)
        } else {
            Self::failure(format!("Error: {}", message))
        }
    }

    pub fn unsupported_language(tag: &str) -> Self {
        Self::failure(format!("Language \"{}\" not supported yet.", tag))
    }
}

/// Result of one backend attempt inside a fallback chain.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendOutcome {
    /// The backend produced an answer (which may itself report `success: false`).
    Succeeded(ExecutionResult),
    /// The backend's own infrastructure could not be used; try the next tier.
    Unavailable(String),
    /// The backend ran and the program failed.
    Failed(ExecutionResult),
}

impl BackendOutcome {
    /// Whether this outcome ends the fallback chain.
    pub fn is_final(&self) -> bool {
        !matches!(self, BackendOutcome::Unavailable(_))
    }

    pub fn into_result(self) -> Option<ExecutionResult> {
        match self {
            BackendOutcome::Succeeded(result) | BackendOutcome::Failed(result) => Some(result),
            BackendOutcome::Unavailable(_) => None,
        }
    }
}
