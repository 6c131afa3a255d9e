// src/bin/whet.rs

use anyhow::Result;
use clap::Parser;
use colored::*;
use std::env;
use std::sync::Arc;
use whet::{
    cli::{self, Cli, Mode, handlers},
    core::config::Settings,
    state::AppContext,
    system::signals,
};

// --- Mode Definition and Registry ---

/// Binds an invocation mode to its handler.
struct ModeDefinition {
    mode: Mode,
    /// Whether the run should react to Ctrl+C by winding down watchers.
    handles_interrupts: bool,
    handler: fn(&Cli, &AppContext) -> Result<()>,
}

static MODE_REGISTRY: &[ModeDefinition] = &[
    ModeDefinition {
        mode: Mode::Init,
        handles_interrupts: false,
        handler: |_, _| handlers::init::handle(),
    },
    ModeDefinition {
        mode: Mode::BashConf,
        handles_interrupts: false,
        handler: |_, _| handlers::bash_conf::handle(),
    },
    ModeDefinition {
        mode: Mode::Compgen,
        handles_interrupts: false,
        handler: handlers::compgen::handle,
    },
    ModeDefinition {
        mode: Mode::Run,
        handles_interrupts: true,
        handler: handlers::run::handle,
    },
];

/// `RUST_LOG` is honoured; `-debug` forces debug output for this crate.
fn init_logging(debug: bool) {
    let mut builder = env_logger::Builder::from_default_env();
    if debug {
        builder.filter_module("whet", log::LevelFilter::Debug);
    }
    builder.init();
}

fn main() {
    let cli = Cli::parse_from(cli::normalize_args(env::args()));
    init_logging(cli.debug);

    if let Err(e) = run_cli(&cli) {
        // --- Centralized Error Handling ---
        // Aborts and refusals carry their own wording; script errors are
        // shown exactly as Lua reports them.
        if let Some(cli_err) = e.downcast_ref::<handlers::CliError>() {
            eprintln!("{}", cli_err);
        } else if let Some(lua_err) = e.downcast_ref::<mlua::Error>() {
            eprintln!("{}", lua_err);
        } else {
            eprintln!("{}: {:#}", "Error".red().bold(), e);
        }
        std::process::exit(1);
    }
}

fn run_cli(cli: &Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);
    let settings = Settings::load()?;
    let ctx = AppContext::new(settings);

    let Some(definition) = MODE_REGISTRY.iter().find(|d| d.mode == cli.mode()) else {
        return Ok(());
    };

    if definition.handles_interrupts {
        // The worker lives until the process exits.
        let _worker =
            signals::spawn_interrupt_worker(Arc::clone(&ctx.wait_gate), Arc::clone(&ctx.token))?;
    }
    (definition.handler)(cli, &ctx)
}
