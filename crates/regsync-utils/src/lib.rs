//! # regsync Utilities
//!
//! Shared utilities for the regsync workspace.
//!
//! Currently this is the logging setup: `tracing-subscriber` configured from
//! the environment or from CLI flags, with optional file output through
//! `tracing-appender`.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{
    init_logging, init_logging_with_config, init_logging_with_level, LogFormat, LogLevel, LoggingConfig, LoggingError,
};
pub use tracing::{debug, error, info, trace, warn};
