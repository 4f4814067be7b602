//! Configuration system
//!
//! YAML configuration with per-field defaults, loadable from a file or URL and
//! overridable through `CODEPLAY_*` environment variables.

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::*;
