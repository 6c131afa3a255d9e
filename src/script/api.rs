// src/script/api.rs

//! The global `whet` table: target annotations, shell helpers and plugins.

use super::{ScriptState, watch};
use crate::constants::RUNNER_TABLE;
use crate::core::registration::{declare_compgen, declare_flags, declare_help};
use crate::models::CompletionStrategy;
use crate::system::executor::{self, RunOptions};
use colored::{ColoredString, Colorize};
use mlua::{Function, Lua, Table, Value};
use std::rc::Rc;

const STATUS_TAG_WIDTH: usize = 6;

/// Builds the runner table. The script assigns `setup`, `teardown` and
/// `default` into it itself.
pub(crate) fn install(lua: &Lua, state: &Rc<ScriptState>) -> mlua::Result<Table> {
    let runner = lua.create_table()?;
    install_annotations(lua, &runner, state)?;
    install_shell_helpers(lua, &runner, state)?;

    let print_state = Rc::clone(state);
    runner.set(
        "printStatus",
        lua.create_function(move |_, (msg, status): (String, Value)| {
            let status = Status::from_value(&status);
            println!(
                "{}{}",
                pad_message(&msg, print_state.status_width),
                status.colored()
            );
            Ok(())
        })?,
    )?;

    let plugin = lua.create_table()?;
    let watch_state = Rc::clone(state);
    plugin.set(
        "watch",
        lua.create_function(move |_, opts: Table| watch::start(&watch_state, opts))?,
    )?;
    runner.set("plugin", plugin)?;

    Ok(runner)
}

/// The callable currently designated as the default target, if any.
fn current_default(lua: &Lua) -> mlua::Result<Option<Function>> {
    let runner: Table = lua.globals().get(RUNNER_TABLE)?;
    match runner.get::<Value>("default")? {
        Value::Function(f) => Ok(Some(f)),
        _ => Ok(None),
    }
}

fn install_annotations(lua: &Lua, runner: &Table, state: &Rc<ScriptState>) -> mlua::Result<()> {
    let help_state = Rc::clone(state);
    runner.set(
        "help",
        lua.create_function(move |lua, (callable, text): (Function, String)| {
            if text.is_empty() {
                return Err(mlua::Error::runtime(
                    "whet.help: the help text must not be empty",
                ));
            }
            let default = current_default(lua)?;
            help_state
                .with_registry(|registry| declare_help(registry, &callable, default.as_ref(), text))?
                .map_err(mlua::Error::external)
        })?,
    )?;

    let compgen_state = Rc::clone(state);
    runner.set(
        "compgen",
        lua.create_function(move |lua, (callable, spec): (Function, Value)| {
            let strategy = match spec {
                Value::String(words) => CompletionStrategy::Fixed(words.to_str()?.to_string()),
                Value::Function(f) => CompletionStrategy::Delegate(f),
                other => {
                    return Err(mlua::Error::runtime(format!(
                        "whet.compgen: expected a string or a function, got {}",
                        other.type_name()
                    )));
                }
            };
            let default = current_default(lua)?;
            compgen_state
                .with_registry(|registry| {
                    declare_compgen(registry, &callable, default.as_ref(), strategy)
                })?
                .map_err(mlua::Error::external)
        })?,
    )?;

    let flag_state = Rc::clone(state);
    runner.set(
        "flag",
        lua.create_function(move |lua, (callable, setup): (Function, Function)| {
            let default = current_default(lua)?;
            flag_state
                .with_registry(|registry| declare_flags(registry, &callable, default.as_ref(), setup))?
                .map_err(mlua::Error::external)
        })?,
    )?;
    Ok(())
}

fn install_shell_helpers(lua: &Lua, runner: &Table, state: &Rc<ScriptState>) -> mlua::Result<()> {
    let helpers = [
        ("sh", RunOptions::SH),
        ("_sh", RunOptions::SH_QUIET),
        ("exec", RunOptions::EXEC),
        ("_exec", RunOptions::EXEC_QUIET),
        ("system", RunOptions::SYSTEM),
    ];
    for (name, options) in helpers {
        let state = Rc::clone(state);
        runner.set(
            name,
            lua.create_function(move |_, command: String| {
                let shell = state.shell.borrow().clone();
                let output = executor::run_shell(&command, &shell, options).map_err(|e| {
                    mlua::Error::runtime(format!(
                        "whet: target [{}] failed: {}",
                        state.current_target.borrow(),
                        e
                    ))
                })?;
                Ok((output.code, output.stdout, output.stderr))
            })?,
        )?;
    }

    let shell_state = Rc::clone(state);
    runner.set(
        "shell",
        lua.create_function(move |_, name: Option<String>| {
            if let Some(name) = name {
                log::debug!("Shell set to '{}'", name);
                *shell_state.shell.borrow_mut() = name;
            }
            Ok(shell_state.shell.borrow().clone())
        })?,
    )?;
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Fail,
    Undefined,
}

impl Status {
    /// Booleans and exit codes map to ok/fail; anything else is undefined.
    fn from_value(value: &Value) -> Self {
        let ok = match value {
            Value::Boolean(b) => *b,
            Value::Integer(code) => *code == 0,
            Value::Number(code) => *code == 0.0,
            _ => return Self::Undefined,
        };
        if ok { Self::Ok } else { Self::Fail }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Ok => "[ ok ]",
            Self::Fail => "[fail]",
            Self::Undefined => "[udef]",
        }
    }

    fn colored(self) -> ColoredString {
        match self {
            Self::Ok => self.tag().green(),
            Self::Fail => self.tag().red().bold(),
            Self::Undefined => self.tag().yellow(),
        }
    }
}

/// Pads `msg` so that a status tag lands in the last columns of a `width`-wide line.
fn pad_message(msg: &str, width: usize) -> String {
    let room = width.saturating_sub(STATUS_TAG_WIDTH + 1);
    format!("{:<room$}", msg, room = room)
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_from_lua_values() {
        assert_eq!(Status::from_value(&Value::Boolean(true)), Status::Ok);
        assert_eq!(Status::from_value(&Value::Boolean(false)), Status::Fail);
        assert_eq!(Status::from_value(&Value::Integer(0)), Status::Ok);
        assert_eq!(Status::from_value(&Value::Integer(2)), Status::Fail);
        assert_eq!(Status::from_value(&Value::Nil), Status::Undefined);
        assert_eq!(Status::Undefined.tag(), "[udef]");
    }

    #[test]
    fn test_status_line_fills_the_width() {
        let line = format!("{}{}", pad_message("Building", 20), Status::Ok.tag());
        assert_eq!(line, "Building     [ ok ]");
        assert_eq!(line.len(), 19);
        // Longer messages are never truncated.
        assert_eq!(pad_message("a long message", 4), "a long message");
    }
}
