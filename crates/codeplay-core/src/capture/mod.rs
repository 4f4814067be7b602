//! Output capture adapters.
//!
//! Both adapters follow the same discipline: swap the language's output
//! channels for in-memory buffers, run, read back, and always put the original
//! channels back before the next run can observe them.

pub mod console;
pub mod interpreter;

pub use console::{ConsoleCapture, ConsoleChannel, ConsoleLine};
pub use interpreter::{run_with_captured_streams, CapturedStreams, StreamCapture};
