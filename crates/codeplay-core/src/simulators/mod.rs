//! Heuristic simulators, the always-available last tier.
//!
//! A simulator walks the source line by line through an ordered table of
//! rules. Each rule is a `(matches, apply)` pair over the line and a small
//! per-run state; the first rule that matches decides what happens to the
//! line, unless it asks the walk to [`Flow::Continue`] to later rules.
//! Simulators are pure functions of the source text.

use async_trait::async_trait;

use crate::core_types::{BackendOutcome, ExecutionResult, LanguageId};
use crate::executors::Backend;

pub mod cpp;
pub mod lessons;
pub mod python;

pub use cpp::CppSimulator;
pub use python::PythonSimulator;

/// One source line as seen by the rules.
#[derive(Debug, Clone, Copy)]
pub struct Line<'a> {
    pub raw: &'a str,
    pub trimmed: &'a str,
    pub indented: bool,
    /// 1-based.
    pub number: usize,
}

impl<'a> Line<'a> {
    pub fn new(raw: &'a str, number: usize) -> Self {
        Self {
            raw,
            trimmed: raw.trim(),
            indented: raw.starts_with(|c: char| c == ' ' || c == '\t'),
            number,
        }
    }

    pub fn is_blank(&self) -> bool {
        self.trimmed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// The line is handled.
    Stop,
    /// Keep offering the line to the remaining rules.
    Continue,
}

pub struct Rule<S: 'static> {
    pub name: &'static str,
    pub matches: fn(&Line<'_>, &S) -> bool,
    pub apply: fn(&Line<'_>, &mut S) -> Flow,
}

pub struct RuleTable<S: 'static> {
    rules: &'static [Rule<S>],
}

impl<S: 'static> RuleTable<S> {
    pub const fn new(rules: &'static [Rule<S>]) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|rule| rule.name).collect()
    }

    pub fn walk(&self, source: &str, state: &mut S) {
        for (index, raw) in source.lines().enumerate() {
            let line = Line::new(raw, index + 1);
            for rule in self.rules {
                if !(rule.matches)(&line, state) {
                    continue;
                }
                log::debug!("line {}: rule '{}'", line.number, rule.name);
                if (rule.apply)(&line, state) == Flow::Stop {
                    break;
                }
            }
        }
    }
}

pub trait Simulator: Send + Sync {
    fn language(&self) -> LanguageId;

    /// Fabricate a plausible result for `source`. Never fails.
    fn simulate(&self, source: &str) -> ExecutionResult;
}

/// Adapts a [`Simulator`] to the backend chain. Always final.
pub struct SimulatorBackend<S> {
    simulator: S,
}

impl<S: Simulator> SimulatorBackend<S> {
    pub fn new(simulator: S) -> Self {
        Self { simulator }
    }
}

#[async_trait]
impl<S: Simulator> Backend for SimulatorBackend<S> {
    fn name(&self) -> &'static str {
        match self.simulator.language() {
            LanguageId::JavaScript => "javascript-simulator",
            LanguageId::Python => "python-simulator",
            LanguageId::Cpp => "cpp-simulator",
        }
    }

    async fn attempt(&self, source: &str) -> BackendOutcome {
        BackendOutcome::Succeeded(self.simulator.simulate(source))
    }
}

/// Split `text` on `separator` where it appears outside quotes and brackets.
pub fn split_top_level<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    let mut iter = text.char_indices();

    while let Some((i, c)) = iter.next() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            _ if depth == 0 && text[i..].starts_with(separator) => {
                parts.push(&text[start..i]);
                start = i + separator.len();
                for _ in 1..separator.chars().count() {
                    iter.next();
                }
            }
            _ => {}
        }
    }
    parts.push(&text[start..]);
    parts
}

/// The contents of a single- or double-quoted literal, if `text` is one.
///
/// `'x' + 'y'` is not one literal: an unescaped delimiter inside the body
/// means the text only starts and ends with quotes.
pub fn quoted_literal(text: &str) -> Option<&str> {
    let text = text.trim();
    let first = text.chars().next()?;
    if text.len() < 2 || !(first == '"' || first == '\'') || !text.ends_with(first) {
        return None;
    }

    let body = &text[1..text.len() - 1];
    let mut escaped = false;
    for c in body.chars() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == first {
            return None;
        }
    }
    // A trailing backslash escapes the closing quote.
    if escaped {
        None
    } else {
        Some(body)
    }
}

/// Whether byte offset `at` of `text` lies outside any string or char literal.
pub fn outside_quotes(text: &str, at: usize) -> bool {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in text.char_indices() {
        if i >= at {
            break;
        }
        match quote {
            Some(_) if escaped => escaped = false,
            Some(_) if c == '\\' => escaped = true,
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None if c == '"' || c == '\'' => quote = Some(c),
            None => {}
        }
    }
    quote.is_none()
}

/// Expand the common backslash escapes of a string literal.
pub fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => {}
            Some('0') => {}
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some('\'') => out.push('\''),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
