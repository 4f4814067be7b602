//! Python heuristic simulator.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::HashMap;

use super::{lessons, quoted_literal, split_top_level, unescape, Flow, Line, Rule, RuleTable, Simulator};
use crate::core_types::{ExecutionResult, LanguageId};

pub const PYTHON_SIMULATION_NOTICE: &str = "Python code analyzed in simulation mode. No output detected.\n\
(The Python runtime is not available here, so this result comes from static analysis.)";

static DEFINITION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:async\s+)?(def|class)\s+([A-Za-z_]\w*)").unwrap());
static CURATED_CALL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"^print\(\s*[A-Za-z_]\w*\.(run|invoke)\(\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)')\s*\)\s*\)\s*;?$"#)
        .unwrap()
});
static PRINT_CALL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^print\((.*)\)\s*;?\s*(?:#.*)?$").unwrap());
static ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([A-Za-z_]\w*)\s*=([^=].*)$").unwrap());
static CONSTRUCTOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[A-Za-z_]\w*\.)*([A-Za-z_]\w*)\(.*\)$").unwrap());
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+(?:\.\d+)?$").unwrap());
static FSTRING: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^[fF](?:"(.*)"|'(.*)')$"#).unwrap());
static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{([^{}]+)\}").unwrap());
static KEYWORD_ARG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_]\w*\s*=[^=]").unwrap());

/// Per-run state of the Python walk. Discarded after the run.
#[derive(Debug, Default)]
pub struct PythonState {
    pub variables: HashMap<String, String>,
    pub functions: Vec<String>,
    pub classes: Vec<String>,
    pub in_definition: bool,
    pub output: Vec<String>,
}

const RULES: &[Rule<PythonState>] = &[
    Rule {
        name: "leave-definition",
        matches: |line, state| state.in_definition && !line.indented && !line.is_blank(),
        apply: |_, state| {
            state.in_definition = false;
            Flow::Continue
        },
    },
    Rule {
        name: "definition-body",
        matches: |_, state| state.in_definition,
        apply: |_, _| Flow::Stop,
    },
    Rule {
        name: "blank-or-comment",
        matches: |line, _| line.is_blank() || line.trimmed.starts_with('#'),
        apply: |_, _| Flow::Stop,
    },
    Rule {
        name: "definition",
        matches: |line, _| DEFINITION.is_match(line.trimmed),
        apply: record_definition,
    },
    Rule {
        name: "curated-call",
        matches: |line, _| curated_response(line.trimmed).is_some(),
        apply: |line, state| {
            if let Some(response) = curated_response(line.trimmed) {
                state.output.push(response.to_string());
            }
            Flow::Stop
        },
    },
    Rule {
        name: "print",
        matches: |line, _| PRINT_CALL.is_match(line.trimmed),
        apply: record_print,
    },
    Rule {
        name: "assignment",
        matches: |line, _| ASSIGNMENT.is_match(line.trimmed),
        apply: record_assignment,
    },
];

static TABLE: RuleTable<PythonState> = RuleTable::new(RULES);

#[derive(Debug, Clone, Copy, Default)]
pub struct PythonSimulator;

impl PythonSimulator {
    /// Walk `source` and return the final state.
    pub fn analyze(&self, source: &str) -> PythonState {
        let mut state = PythonState::default();
        TABLE.walk(source, &mut state);
        state
    }
}

impl Simulator for PythonSimulator {
    fn language(&self) -> LanguageId {
        LanguageId::Python
    }

    fn simulate(&self, source: &str) -> ExecutionResult {
        let state = self.analyze(source);
        if state.output.is_empty() {
            ExecutionResult::success(PYTHON_SIMULATION_NOTICE)
        } else {
            ExecutionResult::success(state.output.join("\n"))
        }
    }
}

fn record_definition(line: &Line<'_>, state: &mut PythonState) -> Flow {
    if let Some(caps) = DEFINITION.captures(line.trimmed) {
        let name = caps[2].to_string();
        if &caps[1] == "class" {
            state.classes.push(name);
        } else {
            state.functions.push(name);
        }
        state.in_definition = true;
    }
    Flow::Stop
}

fn curated_response(trimmed: &str) -> Option<&'static str> {
    let caps = CURATED_CALL.captures(trimmed)?;
    let prompt = unescape(caps.get(2).or_else(|| caps.get(3))?.as_str());
    lessons::method_response(&caps[1], &prompt)
}

fn record_print(line: &Line<'_>, state: &mut PythonState) -> Flow {
    if let Some(caps) = PRINT_CALL.captures(line.trimmed) {
        let rendered = split_top_level(&caps[1], ",")
            .into_iter()
            .map(str::trim)
            .filter(|arg| !arg.is_empty() && !KEYWORD_ARG.is_match(arg))
            .map(|arg| resolve(arg, state))
            .collect::<Vec<_>>()
            .join(" ");
        state.output.push(rendered);
    }
    Flow::Stop
}

fn record_assignment(line: &Line<'_>, state: &mut PythonState) -> Flow {
    if let Some(caps) = ASSIGNMENT.captures(line.trimmed) {
        let name = caps[1].to_string();
        match guess_value(caps[2].trim(), state) {
            Some(value) => {
                state.variables.insert(name, value);
            }
            None => {
                state.variables.remove(&name);
            }
        }
    }
    Flow::Stop
}

/// Known expression, then recorded variable, then quoted literal.
fn lookup(expr: &str, state: &PythonState) -> Option<String> {
    let expr = expr.trim();
    if let Some(value) = lessons::python_expression(expr) {
        return Some(value.to_string());
    }
    if let Some(value) = state.variables.get(expr) {
        return Some(value.clone());
    }
    quoted_literal(expr).map(unescape)
}

fn resolve(expr: &str, state: &PythonState) -> String {
    if let Some(value) = lookup(expr, state) {
        return value;
    }
    if let Some(rendered) = render_fstring(expr, state) {
        return rendered;
    }
    format!("[{}]", expr)
}

fn render_fstring(expr: &str, state: &PythonState) -> Option<String> {
    let caps = FSTRING.captures(expr)?;
    let template = caps.get(1).or_else(|| caps.get(2))?.as_str();
    let rendered = PLACEHOLDER.replace_all(template, |span: &Captures<'_>| {
        let inner = span[1].trim();
        let key = match inner.split_once(':') {
            Some((head, _)) if !head.contains('[') => head.trim(),
            _ => inner,
        };
        let key = key.strip_suffix("!r").or_else(|| key.strip_suffix("!s")).unwrap_or(key);
        lookup(key, state).unwrap_or_else(|| format!("[{}]", inner))
    });
    Some(unescape(&rendered))
}

fn guess_value(value: &str, state: &PythonState) -> Option<String> {
    if let Some(literal) = quoted_literal(value) {
        return Some(unescape(literal));
    }
    if FSTRING.is_match(value) {
        return render_fstring(value, state);
    }
    if NUMBER.is_match(value) || matches!(value, "True" | "False" | "None") {
        return Some(value.to_string());
    }
    if let Some(caps) = CONSTRUCTOR.captures(value) {
        let callee = &caps[1];
        let is_class = state.classes.iter().any(|c| c == callee)
            || callee.starts_with(|c: char| c.is_ascii_uppercase());
        if is_class {
            return Some(format!("<{} object>", callee));
        }
    }
    lookup(value, state)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> String {
        PythonSimulator.simulate(source).output
    }

    #[test]
    fn test_print_literal() {
        assert_eq!(
            PythonSimulator.simulate("print('hello')"),
            ExecutionResult::success("hello")
        );
        assert_eq!(run(r#"print("a\tb")"#), "a\tb");
    }

    #[test]
    fn test_variables_and_multiple_arguments() {
        let source = "name = \"Ada\"\ntotal = 3\nprint(name)\nprint(\"total:\", total, sep=\"\")";
        assert_eq!(run(source), "Ada\ntotal: 3");
    }

    #[test]
    fn test_fstring_substitution() {
        let source = "name = 'Ada'\nage = 36\nprint(f\"{name} is {age} and {missing}\")";
        assert_eq!(run(source), "Ada is 36 and [missing]");
    }

    #[test]
    fn test_fstring_format_spec_and_known_expression() {
        let source = "price = 2.5\nprint(f'{price:.2f} / {2 + 2}')";
        assert_eq!(run(source), "2.5 / 4");
    }

    #[test]
    fn test_definitions_are_skipped() {
        let source = "def greet():\n    print('inside')\n\n    return 1\nprint('outside')";
        assert_eq!(run(source), "outside");
        let state = PythonSimulator.analyze(source);
        assert_eq!(state.functions, vec!["greet".to_string()]);
        assert!(!state.in_definition);
    }

    #[test]
    fn test_constructor_placeholder() {
        let source = "class Dog:\n    pass\nrex = Dog()\nclient = openai.OpenAI(api_key=key)\nprint(rex, client)";
        assert_eq!(run(source), "<Dog object> <OpenAI object>");
    }

    #[test]
    fn test_curated_method_call() {
        let source = "agent = Agent(model='gpt-4o')\nprint(agent.run(\"What is 2 + 2?\"))";
        assert_eq!(run(source), "2 + 2 equals 4.");
        let source = "print(agent.invoke('What\\'s the weather in Tokyo?'))";
        assert_eq!(
            run(source),
            "Calling tool get_weather(city='Tokyo')\nIt is 18°C and sunny in Tokyo."
        );
        let source = "print(agent.invoke(\"What's the weather in Tokyo?\"))";
        assert!(run(source).ends_with("sunny in Tokyo."));
    }

    #[test]
    fn test_string_expressions_are_not_taken_as_literals() {
        assert_eq!(run("print('x' + 'y')"), "['x' + 'y']");
        assert_eq!(run("print('a') ; print('b')"), "['a') ; print('b']");
        assert_eq!(run("s = 'x' + 'y'\nprint(s)"), "[s]");
        assert_eq!(run("print('it\\'s')"), "it's");
    }

    #[test]
    fn test_uncurated_call_is_bracketed() {
        assert_eq!(run("print(agent.run(\"Hi\"))"), "[agent.run(\"Hi\")]");
        assert_eq!(run("print(x * 3)"), "[x * 3]");
        assert_eq!(run("print(2 + 2)"), "4");
    }

    #[test]
    fn test_comments_and_reassignment() {
        let source = "# print('no')\nx = 'a'\nx = compute()\nprint(x)  # show it";
        assert_eq!(run(source), "[x]");
    }

    #[test]
    fn test_no_output_notice() {
        let result = PythonSimulator.simulate("x = 1\ny = x + 1");
        assert!(result.success);
        assert_eq!(result.output, PYTHON_SIMULATION_NOTICE);
    }

    #[test]
    fn test_simulation_is_deterministic() {
        let source = "a = 1\nb = 'two'\nprint(a, b)\nprint(f'{a}{b}')\nprint(agent.run('What is 2 + 2?'))";
        assert_eq!(PythonSimulator.simulate(source), PythonSimulator.simulate(source));
    }
}
