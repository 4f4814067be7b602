//! Curated answers for lesson snippets.
//!
//! These tables are lesson content, not logic: they make a handful of
//! teaching examples look fully interactive when no interpreter is reachable.
//! Add entries here when a lesson gains a new snippet.

/// Python expressions whose printed value is known ahead of time.
const PYTHON_EXPRESSIONS: &[(&str, &str)] = &[
    ("2 + 2", "4"),
    ("10 / 4", "2.5"),
    ("sum(range(10))", "45"),
    ("len(tools)", "3"),
    ("len(messages)", "2"),
    ("type(agent).__name__", "Agent"),
    ("response.content", "Hello! How can I help you today?"),
    ("response.tool_calls", "[]"),
    ("memory.summary()", "User asked about the weather in Tokyo."),
];

/// Canned replies for `print(x.<method>("<prompt>"))` in the agent lessons.
const METHOD_RESPONSES: &[(&str, &str, &str)] = &[
    (
        "run",
        "What is the capital of France?",
        "The capital of France is Paris.",
    ),
    ("run", "What is 2 + 2?", "2 + 2 equals 4."),
    (
        "run",
        "Summarize the benefits of unit testing.",
        "Unit tests catch regressions early, document expected behaviour and make refactoring safer.",
    ),
    (
        "invoke",
        "What's the weather in Tokyo?",
        "Calling tool get_weather(city='Tokyo')\nIt is 18°C and sunny in Tokyo.",
    ),
    (
        "invoke",
        "Search the docs for retries",
        "Calling tool search_docs(query='retries')\nFound 2 results: 'Retry policies', 'Backoff strategies'.",
    ),
];

/// C++ output expressions whose value is known ahead of time.
const CPP_EXPRESSIONS: &[(&str, &str)] = &[
    ("a + b", "15"),
    ("x * y", "50"),
    ("sum", "15"),
    ("sizeof(int)", "4"),
    ("v.size()", "5"),
    ("name.length()", "5"),
    ("name", "Alice"),
    ("max(a, b)", "10"),
    ("std::max(a, b)", "10"),
];

pub fn python_expression(expr: &str) -> Option<&'static str> {
    lookup(PYTHON_EXPRESSIONS, expr)
}

pub fn method_response(method: &str, prompt: &str) -> Option<&'static str> {
    METHOD_RESPONSES
        .iter()
        .find(|(m, p, _)| *m == method && *p == prompt)
        .map(|(_, _, response)| *response)
}

pub fn cpp_expression(expr: &str) -> Option<&'static str> {
    lookup(CPP_EXPRESSIONS, expr)
}

fn lookup(table: &[(&str, &'static str)], expr: &str) -> Option<&'static str> {
    let expr = expr.trim();
    table.iter().find(|(key, _)| *key == expr).map(|(_, value)| *value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups() {
        assert_eq!(python_expression(" 2 + 2 "), Some("4"));
        assert_eq!(python_expression("3 + 3"), None);
        assert_eq!(
            method_response("run", "What is 2 + 2?"),
            Some("2 + 2 equals 4.")
        );
        assert_eq!(method_response("invoke", "What is 2 + 2?"), None);
        assert_eq!(cpp_expression("sizeof(int)"), Some("4"));
    }
}
