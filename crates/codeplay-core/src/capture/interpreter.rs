//! Standard stream capture for a live Python runtime.
//!
//! Redirection is done inside the interpreter by swapping `sys.stdout` and
//! `sys.stderr` for `io.StringIO` buffers. `__import__` is used instead of
//! plain imports so nothing is bound in the user's namespace.

use std::sync::atomic::{AtomicBool, Ordering};

use crate::errors::ExecutionError;
use crate::runtime::InterpreterRuntime;

pub const REDIRECT_STREAMS: &str = "__import__('sys').stdout = __import__('io').StringIO()\n\
__import__('sys').stderr = __import__('io').StringIO()";
pub const READ_STDOUT: &str = "__import__('sys').stdout.getvalue()";
pub const READ_STDERR: &str = "__import__('sys').stderr.getvalue()";
pub const RESTORE_STREAMS: &str = "__import__('sys').stdout = __import__('sys').__stdout__\n\
__import__('sys').stderr = __import__('sys').__stderr__";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedStreams {
    pub stdout: String,
    pub stderr: String,
}

/// An installed redirection of the interpreter's standard streams.
///
/// `pending_restore` is owned by the runtime handle. It stays set from the
/// moment streams are swapped until they are put back, so a run abandoned
/// midway (its future dropped) is repaired by the next capture.
pub struct StreamCapture<'a> {
    runtime: &'a dyn InterpreterRuntime,
    pending_restore: &'a AtomicBool,
}

impl<'a> StreamCapture<'a> {
    pub async fn install(
        runtime: &'a dyn InterpreterRuntime,
        pending_restore: &'a AtomicBool,
    ) -> Result<StreamCapture<'a>, ExecutionError> {
        if pending_restore.load(Ordering::SeqCst) {
            log::warn!("Previous run left interpreter streams redirected, restoring first");
            runtime.run_python(RESTORE_STREAMS).await?;
            pending_restore.store(false, Ordering::SeqCst);
        }

        pending_restore.store(true, Ordering::SeqCst);
        runtime.run_python(REDIRECT_STREAMS).await?;
        Ok(StreamCapture {
            runtime,
            pending_restore,
        })
    }

    /// Run `source` and read back both buffers.
    pub async fn run(&self, source: &str) -> Result<CapturedStreams, ExecutionError> {
        self.runtime.run_python(source).await?;
        let stdout = self.runtime.run_python(READ_STDOUT).await?.unwrap_or_default();
        let stderr = self.runtime.run_python(READ_STDERR).await?.unwrap_or_default();
        Ok(CapturedStreams { stdout, stderr })
    }

    pub async fn restore(self) -> Result<(), ExecutionError> {
        self.runtime.run_python(RESTORE_STREAMS).await?;
        self.pending_restore.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Redirect, run, read back, and restore regardless of how the run ended.
pub async fn run_with_captured_streams(
    runtime: &dyn InterpreterRuntime,
    pending_restore: &AtomicBool,
    source: &str,
) -> Result<CapturedStreams, ExecutionError> {
    let capture = StreamCapture::install(runtime, pending_restore).await?;
    let outcome = capture.run(source).await;
    let restored = capture.restore().await;

    let captured = outcome?;
    restored?;
    Ok(captured)
}
