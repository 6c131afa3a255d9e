// src/cli/handlers/init.rs

use super::CliError;
use crate::constants::{DEFAULT_SCRIPT_FILENAMES, INIT_SCRIPT_FILENAME};
use anyhow::{Context, Result};
use colored::Colorize;
use std::{env, fs, path::Path};

pub const INIT_TEMPLATE: &str = include_str!("../../templates/init.lua");

/// The main handler for `-init`: writes the starter script to the current directory.
pub fn handle() -> Result<()> {
    let cwd = env::current_dir().context("Failed to read the current directory")?;
    let path = create_script(&cwd)?;
    println!("Created {}", path.display().to_string().cyan());
    Ok(())
}

/// Refuses when any recognized script already exists in `dir`.
fn create_script(dir: &Path) -> Result<std::path::PathBuf> {
    if let Some(existing) = DEFAULT_SCRIPT_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.exists())
    {
        return Err(CliError::ScriptExists(existing).into());
    }
    let path = dir.join(INIT_SCRIPT_FILENAME);
    fs::write(&path, INIT_TEMPLATE)
        .with_context(|| format!("Failed to write '{}'", path.display()))?;
    log::debug!("Wrote starter script to '{}'", path.display());
    Ok(path)
}

// MARK: --- UNIT TESTS ---
