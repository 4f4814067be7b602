//! Direct in-process JavaScript evaluation.
//!
//! Every run gets a fresh engine context on a blocking worker, with a
//! `console` object whose methods feed the thread-local console capture.

use async_trait::async_trait;
use boa_engine::{js_string, Context, JsError, JsResult, JsValue, NativeFunction, Source};

use super::{Backend, NO_OUTPUT_MESSAGE};
use crate::capture::console::{self, ConsoleCapture, ConsoleChannel};
use crate::config::JavaScriptConfig;
use crate::core_types::{BackendOutcome, ExecutionResult};

const CONSOLE_PRELUDE: &str = r#"(function () {
  const write = globalThis.__codeplay_write;
  const render = (value) => {
    if (typeof value === "string") return value;
    if (value !== null && typeof value === "object") {
      try {
        const json = JSON.stringify(value);
        if (json !== undefined) return json;
      } catch (e) {}
    }
    return String(value);
  };
  const channel = (name) => (...args) => write(name, args.map(render).join(" "));
  globalThis.console = {
    log: channel("log"),
    info: channel("log"),
    debug: channel("log"),
    warn: channel("error"),
    error: channel("error"),
  };
  delete globalThis.__codeplay_write;
})();"#;

pub struct JavaScriptBackend {
    loop_iteration_limit: Option<u64>,
}

impl JavaScriptBackend {
    pub fn new() -> Self {
        Self {
            loop_iteration_limit: None,
        }
    }

    pub fn from_config(config: &JavaScriptConfig) -> Self {
        Self {
            loop_iteration_limit: config.loop_iteration_limit,
        }
    }

    pub fn with_loop_iteration_limit(mut self, limit: u64) -> Self {
        self.loop_iteration_limit = Some(limit);
        self
    }
}

impl Default for JavaScriptBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Backend for JavaScriptBackend {
    fn name(&self) -> &'static str {
        "javascript-eval"
    }

    async fn attempt(&self, source: &str) -> BackendOutcome {
        let source = source.to_string();
        let limit = self.loop_iteration_limit;
        match tokio::task::spawn_blocking(move || evaluate(&source, limit)).await {
            Ok(result) if result.success => BackendOutcome::Succeeded(result),
            Ok(result) => BackendOutcome::Failed(result),
            Err(e) => {
                log::error!("JavaScript evaluation aborted: {}", e);
                BackendOutcome::Failed(ExecutionResult::error(format!(
                    "evaluation aborted: {}",
                    e
                )))
            }
        }
    }
}

/// Evaluate `source` synchronously with console output captured.
pub fn evaluate(source: &str, loop_iteration_limit: Option<u64>) -> ExecutionResult {
    let capture = ConsoleCapture::install();
    let mut context = Context::default();
    if let Some(limit) = loop_iteration_limit {
        context
            .runtime_limits_mut()
            .set_loop_iteration_limit(limit);
    }

    let evaluated = install_console(&mut context)
        .and_then(|_| context.eval(Source::from_bytes(source.as_bytes())));
    let _ = context.run_jobs();
    let lines = capture.finish();

    match evaluated {
        Ok(_) if !lines.is_empty() => ExecutionResult::success(console::join_lines(&lines)),
        Ok(value) if value.is_undefined() => ExecutionResult::success(NO_OUTPUT_MESSAGE),
        Ok(value) => ExecutionResult::success(stringify(&value, &mut context)),
        Err(err) => {
            ExecutionResult::failure(format!("Error: {}", error_message(&err, &mut context)))
        }
    }
}

fn install_console(context: &mut Context) -> JsResult<()> {
    context.register_global_builtin_callable(
        js_string!("__codeplay_write"),
        2,
        NativeFunction::from_fn_ptr(console_write),
    )?;
    context.eval(Source::from_bytes(CONSOLE_PRELUDE))?;
    Ok(())
}

fn console_write(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let channel = match args.first() {
        Some(name) if name.to_string(context)?.to_std_string_escaped() == "error" => {
            ConsoleChannel::Error
        }
        _ => ConsoleChannel::Log,
    };
    let text = match args.get(1) {
        Some(value) => value.to_string(context)?.to_std_string_escaped(),
        None => String::new(),
    };
    console::write(channel, text);
    Ok(JsValue::undefined())
}

fn stringify(value: &JsValue, context: &mut Context) -> String {
    match value.to_string(context) {
        Ok(text) => text.to_std_string_escaped(),
        Err(_) => value.display().to_string(),
    }
}

/// The `message` of a thrown value, as `e.message` would read in a catch block.
fn error_message(err: &JsError, context: &mut Context) -> String {
    if let Some(native) = err.as_native() {
        let text = native.to_string();
        return match text.split_once(": ") {
            Some((_, message)) => message.to_string(),
            None => text,
        };
    }

    match err.as_opaque() {
        Some(thrown) => {
            if let Some(object) = thrown.as_object() {
                if let Ok(message) = object.get(js_string!("message"), context) {
                    if !message.is_undefined() {
                        return stringify(&message, context);
                    }
                }
            }
            stringify(thrown, context)
        }
        None => err.to_string(),
    }
}
