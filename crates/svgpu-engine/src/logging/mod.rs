//! Logging utilities.
//!
//! The crate logs through the `log` facade; this module only installs the
//! `env_logger` backend for binaries and tests that want one.

mod init;

pub use init::{init_logging, LoggingConfig, DEFAULT_FILTER};
