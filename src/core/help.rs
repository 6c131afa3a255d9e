// src/core/help.rs

use crate::constants::DEFAULT_TARGET_DISPLAY;
use crate::core::dispatch::ScriptRuntime;
use crate::core::registry::Registry;
use anyhow::Result;
use std::fmt::Write;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HelpError {
    #[error("Unknown target: {0}")]
    UnknownTarget(String),
}

/// Usage line, the runner's own options, then one line per target.
///
/// `options` is the pre-rendered option listing of the command line parser.
pub fn render_global_help<F>(registry: &Registry<F>, options: &str) -> String {
    let mut out = String::from("Usage: whet [OPTION] [<target>] [<args>]\n");
    let _ = write!(out, "\nOptions:\n{}", options);
    if !options.ends_with('\n') {
        out.push('\n');
    }

    out.push_str("\nTargets:\n");
    for (name, target) in registry.entries() {
        let shown = if name.is_empty() { DEFAULT_TARGET_DISPLAY } else { name };
        let _ = writeln!(out, "  {}: {}", shown, target.summary());
    }
    out
}

/// Synopsis, full help text, and flag/argument listings of one target.
pub fn render_target_help<R: ScriptRuntime>(
    registry: &Registry<R::Callable>,
    runtime: &R,
    name: &str,
) -> Result<String> {
    let target = registry
        .get(name)
        .ok_or_else(|| HelpError::UnknownTarget(name.to_string()))?;

    let mut short_usage = format!("{} [<args>]", name);
    let mut flag_usage = String::new();
    let mut arg_usage = String::new();
    if let Some(setup) = &target.flag_setup {
        let flag_set = runtime.build_flag_set(setup, name)?;
        short_usage = flag_set.short_usage();
        flag_usage = flag_set.flag_defaults();
        arg_usage = flag_set.arg_defaults();
    }

    let mut out = format!("Usage: whet {}\n", short_usage);
    let help = target.help.trim();
    if !help.is_empty() {
        let _ = writeln!(out, "\n{}", help);
    }
    if !flag_usage.is_empty() {
        let _ = write!(out, "\nFlags:\n{}", flag_usage);
    }
    if !arg_usage.is_empty() {
        let _ = write!(out, "\nArguments:\n{}", arg_usage);
    }
    Ok(out)
}

// MARK: --- UNIT TESTS ---
