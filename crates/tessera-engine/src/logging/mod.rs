//! Logging setup.
//!
//! The engine logs through the `log` facade only: compile failures at
//! `error`, unresolved uniforms at `warn`, shader loads at `info`, frame
//! statistics at `trace`. This module installs `env_logger` for binaries.

mod init;

pub use init::{init_logging, LoggingConfig};
