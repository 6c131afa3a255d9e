// src/cli/handlers/bash_conf.rs

use anyhow::Result;

/// The bash completion glue. Source it from `.bashrc`:
/// `eval "$(whet -generate-bash-conf)"`.
pub const BASH_COMPLETION: &str = include_str!("../../templates/completion.bash");

pub fn handle() -> Result<()> {
    print!("{}", BASH_COMPLETION);
    Ok(())
}

// MARK: --- UNIT TESTS ---
