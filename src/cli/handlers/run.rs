// src/cli/handlers/run.rs

use super::{
    CliError,
    commons::{self, ScriptSource},
};
use crate::{
    cli::{self, Cli},
    constants::HELP_TARGET,
    core::{
        dispatch::{DispatchOutcome, Dispatcher, ScriptRuntime},
        help,
        registry::Registry,
    },
    state::AppContext,
};
use anyhow::Result;

///
/// Main entry point for running a target.
/// Loads the script, dispatches the named target (or the default one) and
/// then keeps delivering watcher events until the run is cancelled.
///
pub fn handle(cli: &Cli, ctx: &AppContext) -> Result<()> {
    // 1. Find and load the script.
    let source = ScriptSource::resolve(cli.file.as_deref(), cli.code.as_deref())?;
    let (runtime, registry) = commons::load_script(&source, ctx)?;

    // 2. `help` is answered without running any hook.
    let (target, words) = cli.target_and_args();
    if target == Some(HELP_TARGET) && !registry.contains(HELP_TARGET) {
        print!("{}", render_help(&registry, &runtime, words.first().map(String::as_str))?);
        return Ok(());
    }

    // 3. Dispatch. Without a default target, global help runs between the hooks.
    let outcome = Dispatcher::new(&registry, &runtime).dispatch_with_help(target, words, || {
        print!("{}", render_help(&registry, &runtime, None)?);
        Ok(())
    })?;
    match outcome {
        DispatchOutcome::Done => {}
        DispatchOutcome::Usage(text) => eprint!("{}", text),
        DispatchOutcome::NoDefault => return Ok(()),
        DispatchOutcome::Aborted { phase, target } => {
            return Err(CliError::Aborted { phase, target }.into());
        }
    }

    // 4. Watchers started by the script keep the process alive.
    if runtime.has_watchers() {
        runtime.wait_for_watchers()?;
    }
    Ok(())
}

/// Global help, or the help of `target` when one is named.
fn render_help<R: ScriptRuntime>(
    registry: &Registry<R::Callable>,
    runtime: &R,
    target: Option<&str>,
) -> Result<String> {
    match target {
        Some(name) => help::render_target_help(registry, runtime, name),
        None => Ok(help::render_global_help(registry, &cli::render_options())),
    }
}

// MARK: --- UNIT TESTS ---
