//! Editing session for one code block, as driven by a presentation layer.

use std::sync::Arc;

use crate::core_types::{ExecutionRequest, ExecutionResult, EMPTY_SOURCE_PROMPT};
use crate::executors::ExecutionDispatcher;

/// Callbacks fired after edits and runs. Both default to no-ops.
pub trait ExecutionObserver: Send + Sync {
    fn on_code_change(&self, _code: &str) {}

    fn on_code_run(&self, _source_code: &str, _output: &str, _success: bool) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub result: ExecutionResult,
    /// `None` when the session has no expected output.
    pub matches_expected: Option<bool>,
}

pub struct CodeSession {
    dispatcher: Arc<ExecutionDispatcher>,
    language: String,
    initial_code: String,
    code: String,
    expected_output: Option<String>,
    last_success: bool,
    observers: Vec<Arc<dyn ExecutionObserver>>,
}

impl CodeSession {
    pub fn new(
        dispatcher: Arc<ExecutionDispatcher>,
        language: impl Into<String>,
        initial_code: impl Into<String>,
    ) -> Self {
        let initial_code = initial_code.into();
        Self {
            dispatcher,
            language: language.into(),
            code: initial_code.clone(),
            initial_code,
            expected_output: None,
            last_success: false,
            observers: Vec::new(),
        }
    }

    pub fn with_expected_output(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn last_success(&self) -> bool {
        self.last_success
    }

    pub fn set_code(&mut self, code: impl Into<String>) {
        self.code = code.into();
        for observer in &self.observers {
            observer.on_code_change(&self.code);
        }
    }

    /// Put the initial code back; counts as an edit.
    pub fn reset(&mut self) {
        let initial = self.initial_code.clone();
        self.set_code(initial);
    }

    pub async fn run(&mut self) -> RunReport {
        let result = if self.code.trim().is_empty() {
            ExecutionResult {
                success: self.last_success,
                output: EMPTY_SOURCE_PROMPT.to_string(),
            }
        } else {
            let request = ExecutionRequest::new(self.language.clone(), self.code.clone());
            let result = self.dispatcher.execute(&request).await;
            self.last_success = result.success;
            result
        };

        for observer in &self.observers {
            observer.on_code_run(&self.code, &result.output, result.success);
        }

        let matches_expected = self
            .expected_output
            .as_deref()
            .map(|expected| outputs_match(expected, &result.output));
        RunReport {
            result,
            matches_expected,
        }
    }
}

/// Compare outputs ignoring line-ending style and trailing whitespace.
pub fn outputs_match(expected: &str, actual: &str) -> bool {
    normalize_output(expected) == normalize_output(actual)
}

fn normalize_output(text: &str) -> String {
    text.replace("\r\n", "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}
