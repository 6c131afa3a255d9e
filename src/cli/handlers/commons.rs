// src/cli/handlers/commons.rs

use crate::{
    constants::DEFAULT_SCRIPT_FILENAMES,
    core::{discovery, registry::Registry},
    script::LuaRuntime,
    state::AppContext,
};
use anyhow::{Context, Result};
use mlua::Function;
use std::{env, fs, path::PathBuf};

/// Where the script comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptSource {
    /// Source passed with `-c`.
    Inline(String),
    File(PathBuf),
}

impl ScriptSource {
    /// `-c` wins, then `-f`, then the search for a default filename upwards
    /// from the working directory.
    pub fn resolve(file: Option<&str>, code: Option<&str>) -> Result<Self> {
        if let Some(code) = code {
            return Ok(Self::Inline(code.to_string()));
        }
        let cwd = env::current_dir().context("Failed to read the current directory")?;
        let path = discovery::resolve_script(file, &cwd, DEFAULT_SCRIPT_FILENAMES)?;
        Ok(Self::File(path))
    }
}

/// Loads the script, moving into its directory first so targets run
/// relative to it.
pub fn load_script(source: &ScriptSource, ctx: &AppContext) -> Result<(LuaRuntime, Registry<Function>)> {
    match source {
        ScriptSource::Inline(code) => LuaRuntime::load(code, "-c", ctx),
        ScriptSource::File(path) => {
            let code = fs::read_to_string(path)
                .with_context(|| format!("Failed to read script '{}'", path.display()))?;
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                env::set_current_dir(dir).with_context(|| {
                    format!("Failed to change directory to '{}'", dir.display())
                })?;
                log::debug!("Working directory is now '{}'", dunce::simplified(dir).display());
            }
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            LuaRuntime::load(&code, &name, ctx)
        }
    }
}

// MARK: --- UNIT TESTS ---
