//! C++ heuristic simulator.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{
    lessons, outside_quotes, quoted_literal, split_top_level, unescape, Flow, Line, Rule, RuleTable,
    Simulator,
};
use crate::core_types::{ExecutionResult, LanguageId};

pub const CPP_SIMULATION_NOTICE: &str =
    "Simulation completed: the program was analyzed but produced no recognizable output.";
pub const MISSING_INCLUDE_WARNING: &str =
    "Warning: no #include directives found (did you forget #include <iostream>?)";
pub const MISSING_MAIN_WARNING: &str =
    "Warning: no main() function found; the program has no entry point.";
pub const SIMULATED_PLACEHOLDER: &str = "[simulated output]";

static INCLUDE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#\s*include\b").unwrap());
static MAIN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bmain\s*\(").unwrap());
static STREAM_OUTPUT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bcout\s*<<").unwrap());
static PRINTF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\bprintf\s*\(\s*"((?:[^"\\]|\\.)*)""#).unwrap());
static INTEGER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+$").unwrap());

#[derive(Debug, Default)]
pub struct CppState {
    pub has_include: bool,
    pub has_main: bool,
    pub output: String,
}

const RULES: &[Rule<CppState>] = &[
    Rule {
        name: "blank-or-comment",
        matches: |line, _| line.is_blank() || line.trimmed.starts_with("//"),
        apply: |_, _| Flow::Stop,
    },
    Rule {
        name: "include",
        matches: |line, _| INCLUDE.is_match(line.trimmed),
        apply: |_, state| {
            state.has_include = true;
            Flow::Stop
        },
    },
    Rule {
        name: "main",
        matches: |line, _| MAIN.is_match(line.trimmed),
        apply: |_, state| {
            state.has_main = true;
            Flow::Continue
        },
    },
    Rule {
        name: "stream-output",
        matches: |line, _| stream_starts(line.trimmed).next().is_some(),
        apply: record_stream_output,
    },
    Rule {
        name: "printf",
        matches: |line, _| PRINTF.is_match(line.trimmed),
        apply: |line, state| {
            if let Some(caps) = PRINTF.captures(line.trimmed) {
                state.output.push_str(&unescape(&caps[1]));
            }
            Flow::Stop
        },
    },
];

static TABLE: RuleTable<CppState> = RuleTable::new(RULES);

#[derive(Debug, Clone, Copy, Default)]
pub struct CppSimulator;

impl CppSimulator {
    pub fn analyze(&self, source: &str) -> CppState {
        let mut state = CppState::default();
        TABLE.walk(&join_continuations(source), &mut state);
        state
    }
}

impl Simulator for CppSimulator {
    fn language(&self) -> LanguageId {
        LanguageId::Cpp
    }

    fn simulate(&self, source: &str) -> ExecutionResult {
        let state = self.analyze(source);

        let mut warnings = Vec::new();
        if !state.has_include {
            warnings.push(MISSING_INCLUDE_WARNING);
        }
        if !state.has_main {
            warnings.push(MISSING_MAIN_WARNING);
        }

        let body = state.output.trim_end_matches('\n');
        let body = if body.is_empty() { CPP_SIMULATION_NOTICE } else { body };

        if warnings.is_empty() {
            ExecutionResult::success(body)
        } else {
            ExecutionResult::success(format!("{}\n\n{}", warnings.join("\n"), body))
        }
    }
}

/// Fold lines that begin with `<<` into the line above, so a chained stream
/// statement split across lines is seen whole.
fn join_continuations(source: &str) -> String {
    let mut joined = String::with_capacity(source.len());
    for line in source.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("<<") && !joined.is_empty() {
            if joined.ends_with('\n') {
                joined.pop();
            }
            joined.push(' ');
            joined.push_str(trimmed);
        } else {
            joined.push_str(line);
        }
        joined.push('\n');
    }
    joined
}

/// End offsets of each `cout <<` in `text` that is not inside a literal.
fn stream_starts(text: &str) -> impl Iterator<Item = usize> + '_ {
    STREAM_OUTPUT
        .find_iter(text)
        .filter(move |found| outside_quotes(text, found.start()))
        .map(|found| found.end())
}

fn record_stream_output(line: &Line<'_>, state: &mut CppState) -> Flow {
    for start in stream_starts(line.trimmed) {
        let tail = &line.trimmed[start..];
        let statement = split_top_level(tail, ";")
            .into_iter()
            .next()
            .unwrap_or_default();

        for fragment in split_top_level(statement, "<<") {
            let fragment = fragment.trim();
            if !fragment.is_empty() {
                state.output.push_str(&render_fragment(fragment));
            }
        }
    }
    Flow::Stop
}

fn render_fragment(fragment: &str) -> String {
    match fragment {
        "endl" | "std::endl" => return "\n".to_string(),
        _ => {}
    }
    if let Some(literal) = quoted_literal(fragment) {
        return unescape(literal);
    }
    if INTEGER.is_match(fragment) {
        return fragment.to_string();
    }
    lessons::cpp_expression(fragment)
        .map(str::to_string)
        .unwrap_or_else(|| SIMULATED_PLACEHOLDER.to_string())
}
