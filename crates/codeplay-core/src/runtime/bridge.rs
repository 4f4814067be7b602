//! Line-oriented JSON bridge to a child Python interpreter.
//!
//! The child runs a small bootstrap that keeps a private duplicate of its
//! original stdout for the protocol and points fd 1 at the null device, so
//! nothing the user prints can corrupt the reply stream. Requests are read
//! from a private duplicate of fd 0 the same way, and fd 0 is pointed at the
//! null device so `input()` sees end of file instead of the request pipe.
//!
//! Every request carries an id that the reply echoes. A caller dropped while
//! waiting leaves its reply in the pipe; the next caller skips it by id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;

use super::{InterpreterRuntime, LoadOptions, RuntimeInfo};
use crate::errors::ExecutionError;

pub const BOOTSTRAP: &str = r#"import ast, json, os, sys, traceback

_requests = os.fdopen(os.dup(0), "r", encoding="utf-8")
_proto = os.fdopen(os.dup(1), "w", buffering=1, encoding="utf-8")
os.dup2(os.open(os.devnull, os.O_RDONLY), 0)
os.dup2(os.open(os.devnull, os.O_WRONLY), 1)
sys.stdin = open(os.devnull, "r")
_namespace = {"__name__": "__main__"}


def _run(code):
    tree = ast.parse(code, "<exec>", "exec")
    tail = None
    if tree.body and isinstance(tree.body[-1], ast.Expr):
        tail = ast.Expression(tree.body.pop().value)
    exec(compile(tree, "<exec>", "exec"), _namespace)
    if tail is None:
        return None
    return eval(compile(tail, "<exec>", "eval"), _namespace)


def _reply(payload):
    _proto.write(json.dumps(payload) + "\n")
    _proto.flush()


_reply({"ready": True, "version": sys.version.split()[0]})
while True:
    line = _requests.readline()
    if not line:
        break
    if not line.strip():
        continue
    try:
        request = json.loads(line)
    except ValueError:
        _reply({"id": None, "ok": False, "error": "malformed request"})
        continue
    try:
        value = _run(request["code"])
        if value is not None and not isinstance(value, str):
            value = repr(value)
        _reply({"id": request.get("id"), "ok": True, "value": value})
    except BaseException:
        _reply({"id": request.get("id"), "ok": False, "error": traceback.format_exc()})
"#;

#[derive(Serialize)]
struct BridgeRequest<'a> {
    id: u64,
    code: &'a str,
}

#[derive(Deserialize)]
struct BridgeReady {
    ready: bool,
    version: String,
}

#[derive(Deserialize)]
struct BridgeReply {
    #[serde(default)]
    id: Option<u64>,
    ok: bool,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

struct BridgeIo {
    stdin: ChildStdin,
    replies: Lines<BufReader<ChildStdout>>,
    next_id: u64,
    /// Set while a request line is being written; still set means the writer
    /// was dropped midway and the line needs terminating.
    partial_write: bool,
    // Held so the interpreter is killed when the runtime is dropped.
    _child: Child,
}

/// A live interpreter in a child process.
pub struct PythonProcessRuntime {
    io: Mutex<BridgeIo>,
}

impl PythonProcessRuntime {
    /// Start `interpreter` with the bootstrap and wait for its readiness line.
    pub async fn spawn(
        interpreter: &Path,
        options: &LoadOptions,
    ) -> Result<(Self, RuntimeInfo), ExecutionError> {
        let mut cmd = Command::new(interpreter);
        cmd.arg("-u");
        if !options.full_std_lib {
            cmd.arg("-S");
        }
        cmd.arg("-c")
            .arg(BOOTSTRAP)
            .env("PIP_INDEX_URL", &options.index_url)
            .env("PYTHONIOENCODING", "utf-8")
            .env("PYTHONDONTWRITEBYTECODE", "1")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        log::debug!("Starting interpreter {}", interpreter.display());
        let mut child = cmd.spawn().map_err(|e| {
            ExecutionError::RuntimeInitError(format!(
                "failed to start {}: {}",
                interpreter.display(),
                e
            ))
        })?;

        let stdin = child.stdin.take().ok_or_else(|| {
            ExecutionError::RuntimeInitError("interpreter stdin unavailable".to_string())
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            ExecutionError::RuntimeInitError("interpreter stdout unavailable".to_string())
        })?;
        let mut replies = BufReader::new(stdout).lines();

        let line = replies.next_line().await?.ok_or_else(|| {
            ExecutionError::RuntimeInitError(
                "interpreter exited before signalling readiness".to_string(),
            )
        })?;
        let ready: BridgeReady = serde_json::from_str(&line).map_err(|e| {
            ExecutionError::RuntimeInitError(format!("unexpected readiness line '{}': {}", line, e))
        })?;
        if !ready.ready {
            return Err(ExecutionError::RuntimeInitError(
                "interpreter reported it is not ready".to_string(),
            ));
        }

        let runtime = Self {
            io: Mutex::new(BridgeIo {
                stdin,
                replies,
                next_id: 0,
                partial_write: false,
                _child: child,
            }),
        };
        Ok((runtime, RuntimeInfo { version: ready.version }))
    }
}

#[async_trait]
impl InterpreterRuntime for PythonProcessRuntime {
    async fn run_python(&self, code: &str) -> Result<Option<String>, ExecutionError> {
        let mut io = self.io.lock().await;

        if io.partial_write {
            io.stdin.write_all(b"\n").await?;
            io.partial_write = false;
        }

        io.next_id += 1;
        let id = io.next_id;
        let mut request = serde_json::to_string(&BridgeRequest { id, code })?;
        request.push('\n');

        io.partial_write = true;
        io.stdin.write_all(request.as_bytes()).await?;
        io.stdin.flush().await?;
        io.partial_write = false;

        // Replies to requests whose caller went away are still in the pipe.
        let reply = loop {
            let line = io.replies.next_line().await?.ok_or_else(|| {
                ExecutionError::BridgeError("interpreter closed the reply stream".to_string())
            })?;
            let reply: BridgeReply = serde_json::from_str(&line)?;
            if reply.id == Some(id) {
                break reply;
            }
            log::debug!("Discarding stale bridge reply {:?} while waiting for {}", reply.id, id);
        };

        if reply.ok {
            Ok(reply.value)
        } else {
            Err(ExecutionError::ProgramError(
                reply.error.unwrap_or_else(|| "unknown interpreter error".to_string()),
            ))
        }
    }
}
