// src/cli/handlers/mod.rs

// One handler per invocation mode.

pub mod bash_conf;
pub mod commons;
pub mod compgen;
pub mod init;
pub mod run;

use crate::core::dispatch::Phase;
use std::path::PathBuf;
use thiserror::Error;

/// Failures the binary reports with its own wording instead of the generic
/// `Error:` prefix.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CliError {
    #[error("whet: {phase} aborted for target '{target}'")]
    Aborted { phase: Phase, target: String },
    #[error("whet: refusing to overwrite existing script '{}'", .0.display())]
    ScriptExists(PathBuf),
}
