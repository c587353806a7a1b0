//! Common utilities shared by the CLI and the orchestration core

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{truncate_message, Error, ErrorKind, ErrorReport, Result};
