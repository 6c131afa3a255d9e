// src/core/discovery.rs

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("No {} found in '{}' or any parent directory.", .names.join(" or "), .start.display())]
    NotFound { start: PathBuf, names: Vec<String> },
    #[error("Script file '{0}' does not exist.")]
    Missing(PathBuf),
    #[error("Failed to expand path '{template}': {reason}")]
    Expansion { template: String, reason: String },
}

/// Expands `~` and environment variables (`$VAR`, `${VAR}`) in a path.
pub fn expand_path(template: &str) -> Result<PathBuf, DiscoveryError> {
    let expanded = shellexpand::full(template).map_err(|e| DiscoveryError::Expansion {
        template: template.to_string(),
        reason: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// Searches `start` and then each parent directory for one of `filenames`.
///
/// Within one directory the earlier filename wins; the nearest directory
/// wins over any parent.
pub fn find_script(start: &Path, filenames: &[&str]) -> Result<PathBuf, DiscoveryError> {
    for dir in start.ancestors() {
        for name in filenames {
            let candidate = dir.join(name);
            log::trace!("Looking for script at '{}'", candidate.display());
            if candidate.is_file() {
                log::debug!("Found script '{}'", candidate.display());
                return Ok(candidate);
            }
        }
    }
    Err(DiscoveryError::NotFound {
        start: dunce::simplified(start).to_path_buf(),
        names: filenames.iter().map(|s| s.to_string()).collect(),
    })
}

/// The script to load: the explicit `-f` path when given, otherwise the
/// result of searching upwards from `cwd`.
pub fn resolve_script(
    explicit: Option<&str>,
    cwd: &Path,
    filenames: &[&str],
) -> Result<PathBuf, DiscoveryError> {
    match explicit {
        Some(template) => {
            let path = expand_path(template)?;
            let path = if path.is_absolute() { path } else { cwd.join(path) };
            if !path.is_file() {
                return Err(DiscoveryError::Missing(dunce::simplified(&path).to_path_buf()));
            }
            Ok(dunce::canonicalize(&path).unwrap_or(path))
        }
        None => find_script(cwd, filenames),
    }
}

// MARK: --- UNIT TESTS ---
