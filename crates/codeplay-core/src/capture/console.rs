//! Console capture for the in-process JavaScript engine.
//!
//! The engine's `console` methods funnel into [`write`]. Outside a capture
//! scope lines go to the host log; inside one they are buffered. The scope is
//! thread-local because evaluation runs synchronously on a single worker
//! thread, and the guard is `!Send` so it is always released on that thread.

use std::cell::RefCell;
use std::marker::PhantomData;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleChannel {
    Log,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    pub channel: ConsoleChannel,
    pub text: String,
}

thread_local! {
    static ACTIVE_BUFFER: RefCell<Option<Vec<ConsoleLine>>> = const { RefCell::new(None) };
}

/// Route one console line to the active capture buffer, or to the log.
pub fn write(channel: ConsoleChannel, text: String) {
    let uncaptured = ACTIVE_BUFFER.with(|slot| match slot.borrow_mut().as_mut() {
        Some(buffer) => {
            buffer.push(ConsoleLine { channel, text });
            None
        }
        None => Some(text),
    });

    if let Some(text) = uncaptured {
        match channel {
            ConsoleChannel::Log => log::info!(target: "codeplay::console", "{}", text),
            ConsoleChannel::Error => log::warn!(target: "codeplay::console", "{}", text),
        }
    }
}

/// Scoped redirection of the console channels into memory.
///
/// Installing a capture stashes whatever buffer was active before; dropping
/// the guard puts it back, on the normal path and during unwinding alike.
pub struct ConsoleCapture {
    previous: Option<Vec<ConsoleLine>>,
    _not_send: PhantomData<*const ()>,
}

impl ConsoleCapture {
    pub fn install() -> Self {
        let previous = ACTIVE_BUFFER.with(|slot| slot.borrow_mut().replace(Vec::new()));
        Self {
            previous,
            _not_send: PhantomData,
        }
    }

    /// Lines captured so far, leaving the scope installed.
    pub fn lines(&self) -> Vec<ConsoleLine> {
        ACTIVE_BUFFER.with(|slot| slot.borrow().clone().unwrap_or_default())
    }

    /// Take the captured lines and release the scope.
    pub fn finish(self) -> Vec<ConsoleLine> {
        ACTIVE_BUFFER.with(|slot| {
            slot.borrow_mut()
                .as_mut()
                .map(std::mem::take)
                .unwrap_or_default()
        })
    }
}

impl Drop for ConsoleCapture {
    fn drop(&mut self) {
        let previous = self.previous.take();
        ACTIVE_BUFFER.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Whether a capture scope is currently installed on this thread.
pub fn is_capturing() -> bool {
    ACTIVE_BUFFER.with(|slot| slot.borrow().is_some())
}

pub fn join_lines(lines: &[ConsoleLine]) -> String {
    lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_collects_both_channels_in_order() {
        let capture = ConsoleCapture::install();
        write(ConsoleChannel::Log, "a".to_string());
        write(ConsoleChannel::Error, "b".to_string());
        let lines = capture.finish();
        assert_eq!(join_lines(&lines), "a\nb");
        assert_eq!(lines[1].channel, ConsoleChannel::Error);
        assert!(!is_capturing());
    }

    #[test]
    fn test_nested_capture_restores_outer_buffer() {
        let outer = ConsoleCapture::install();
        write(ConsoleChannel::Log, "outer-1".to_string());
        {
            let inner = ConsoleCapture::install();
            write(ConsoleChannel::Log, "inner".to_string());
            assert_eq!(join_lines(&inner.finish()), "inner");
        }
        write(ConsoleChannel::Log, "outer-2".to_string());
        assert_eq!(join_lines(&outer.finish()), "outer-1\nouter-2");
    }

    #[test]
    fn test_capture_released_on_panic() {
        let result = std::panic::catch_unwind(|| {
            let _capture = ConsoleCapture::install();
            write(ConsoleChannel::Log, "lost".to_string());
            panic!("evaluation blew up");
        });
        assert!(result.is_err());
        assert!(!is_capturing());
    }

    #[test]
    fn test_lines_peek_does_not_drain() {
        let capture = ConsoleCapture::install();
        write(ConsoleChannel::Log, "x".to_string());
        assert_eq!(capture.lines().len(), 1);
        assert_eq!(capture.finish().len(), 1);
    }
}
