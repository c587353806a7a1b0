//! Process-backed generator and executor
//!
//! Both collaborators are external programs; these adapters only spawn them,
//! feed them input and translate their exit status.

mod executor;
mod generator;

pub use executor::CommandExecutor;
pub use generator::{strip_code_fences, CommandGenerator};
