// src/script/mod.rs

//! The embedded Lua runtime.
//!
//! `LuaRuntime::load` executes a script once, then scans its commands table
//! and reconciles every annotation into a finished `Registry`. The runtime is
//! owned by the main thread for its whole life: watcher threads only send
//! events, and `wait_for_watchers` runs their callbacks here.

mod api;
mod flag_builder;
mod sh_module;
mod strings;
mod watch;

pub use flag_builder::FlagBuilder;

use crate::constants::{COMMANDS_TABLE, COMMANDS_TABLE_ALIAS, RUNNER_TABLE};
use crate::core::comments;
use crate::core::dispatch::ScriptRuntime;
use crate::core::flags::FlagSet;
use crate::core::registration::reconcile;
use crate::core::registry::Registry;
use crate::models::{CallOutcome, FlagValue, Hook, ParsedFlags, TargetArgs};
use crate::state::AppContext;
use crate::system::watcher::WatchHub;
use anyhow::{Context, Result};
use mlua::{Function, Lua, Table, Value, Variadic};
use std::cell::RefCell;
use std::fmt;
use std::io::Write;
use std::rc::Rc;

/// State shared by the Rust functions installed into the script.
pub(crate) struct ScriptState {
    /// `Some` while the script is loading; taken by reconciliation.
    registry: RefCell<Option<Registry<Function>>>,
    shell: RefCell<String>,
    /// The target being dispatched, for error messages.
    current_target: RefCell<String>,
    status_width: usize,
    hub: RefCell<WatchHub>,
    /// Watch callbacks, indexed like the hub's watchers.
    callbacks: RefCell<Vec<Function>>,
}

impl ScriptState {
    fn new(ctx: &AppContext) -> Self {
        Self {
            registry: RefCell::new(Some(Registry::new())),
            shell: RefCell::new(ctx.settings.shell.clone()),
            current_target: RefCell::new(String::new()),
            status_width: ctx.settings.status_width(),
            hub: RefCell::new(ctx.watch_hub()),
            callbacks: RefCell::new(Vec::new()),
        }
    }

    /// Runs `f` against the registry. Fails once the script has finished loading.
    fn with_registry<R>(&self, f: impl FnOnce(&mut Registry<Function>) -> R) -> mlua::Result<R> {
        let mut guard = self
            .registry
            .try_borrow_mut()
            .map_err(mlua::Error::external)?;
        match guard.as_mut() {
            Some(registry) => Ok(f(registry)),
            None => Err(mlua::Error::runtime(
                "targets can only be annotated while the script is loading",
            )),
        }
    }
}

pub struct LuaRuntime {
    lua: Lua,
    runner: Table,
    state: Rc<ScriptState>,
}

impl fmt::Debug for LuaRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LuaRuntime")
            .field("shell", &self.state.shell.borrow())
            .field("watchers", &self.state.callbacks.borrow().len())
            .finish_non_exhaustive()
    }
}

impl LuaRuntime {
    /// Executes `source` and returns the runtime with its reconciled registry.
    pub fn load(
        source: &str,
        chunk_name: &str,
        ctx: &AppContext,
    ) -> Result<(Self, Registry<Function>)> {
        let lua = Lua::new();
        let state = Rc::new(ScriptState::new(ctx));

        install_print(&lua)?;
        strings::install(&lua)?;
        sh_module::preload(&lua)?;
        let runner = api::install(&lua, &state)?;
        let commands = lua.create_table()?;
        let globals = lua.globals();
        globals.set(RUNNER_TABLE, runner.clone())?;
        globals.set(COMMANDS_TABLE, commands.clone())?;
        globals.set(COMMANDS_TABLE_ALIAS, commands.clone())?;

        log::debug!("Executing script '{}'", chunk_name);
        lua.load(source).set_name(chunk_name).exec()?;

        let default: Option<Function> = runner
            .get("default")
            .with_context(|| format!("'{}.default' must be a function", RUNNER_TABLE))?;

        log::debug!("Registering targets:");
        let mut targets = Vec::new();
        for pair in commands.pairs::<Value, Value>() {
            match pair? {
                (Value::String(name), Value::Function(f)) => {
                    targets.push((name.to_string_lossy().to_string(), f));
                }
                (key, _) => log::debug!("Ignoring non-function entry {:?}", key),
            }
        }

        let comments = comments::parse(source);
        let mut registry = state.registry.borrow_mut().take().unwrap_or_default();
        reconcile(&mut registry, targets, default.as_ref(), |f: &Function| {
            f.info()
                .line_defined
                .and_then(|line| comments::docstring(&comments, line))
        })?;
        log::debug!("Script defines {} target name(s)", registry.len());

        Ok((Self { lua, runner, state }, registry))
    }

    pub fn lua(&self) -> &Lua {
        &self.lua
    }

    /// Whether the script started any file watcher.
    pub fn has_watchers(&self) -> bool {
        self.state.hub.borrow().is_armed()
    }

    /// Delivers watcher events to their callbacks until cancellation.
    pub fn wait_for_watchers(&self) -> Result<()> {
        watch::run_callbacks(&self.state)
    }
}

impl ScriptRuntime for LuaRuntime {
    type Callable = Function;

    fn run_hook(&self, hook: Hook, target: &str) -> Result<CallOutcome> {
        if hook == Hook::Setup {
            *self.state.current_target.borrow_mut() = target.to_string();
        }
        let function: Option<Function> = self
            .runner
            .get(hook.key())
            .with_context(|| format!("'{}.{}' must be a function", RUNNER_TABLE, hook.key()))?;
        match function {
            Some(f) => Ok(outcome(&f.call::<Value>(target)?)),
            None => Ok(CallOutcome::Completed),
        }
    }

    fn call_target(&self, callable: &Function, args: TargetArgs) -> Result<CallOutcome> {
        let result = match args {
            TargetArgs::Positional(words) => callable.call::<Value>(Variadic::from_iter(words))?,
            TargetArgs::Flags(parsed) => callable.call::<Value>(self.flags_table(parsed)?)?,
        };
        Ok(outcome(&result))
    }

    fn build_flag_set(&self, setup: &Function, target: &str) -> Result<FlagSet<Function>> {
        let builder = self.lua.create_userdata(FlagBuilder::new(target))?;
        setup.call::<()>(builder.clone())?;
        let builder = builder.take::<FlagBuilder>()?;
        Ok(builder.into_flag_set())
    }

    fn complete(&self, callable: &Function, words: &[String], cursor: usize) -> Result<String> {
        let words = self.lua.create_sequence_from(words.iter().cloned())?;
        let cursor = i64::try_from(cursor).context("cursor out of range")?;
        let result = callable.call::<Value>((words, cursor))?;
        Ok(match result {
            Value::Nil => String::new(),
            other => tostring(&self.lua, other)?,
        })
    }
}

impl LuaRuntime {
    /// The single table a flag-aware target receives.
    fn flags_table(&self, parsed: ParsedFlags) -> mlua::Result<Table> {
        let table = self.lua.create_table()?;
        for (index, word) in parsed.positional.into_iter().enumerate() {
            table.raw_set(index + 1, word)?;
        }
        for (name, value) in parsed.values {
            table.set(name, flag_value(&self.lua, value)?)?;
        }
        Ok(table)
    }
}

/// Only an explicit `false` asks the runner to stop.
fn outcome(value: &Value) -> CallOutcome {
    match value {
        Value::Boolean(false) => CallOutcome::Aborted,
        _ => CallOutcome::Completed,
    }
}

fn flag_value(lua: &Lua, value: FlagValue) -> mlua::Result<Value> {
    Ok(match value {
        FlagValue::Str(s) => Value::String(lua.create_string(&s)?),
        FlagValue::Int(i) => Value::Integer(i),
        FlagValue::Number(n) => Value::Number(n),
        FlagValue::Bool(b) => Value::Boolean(b),
    })
}

/// Lua's own `tostring`, honouring `__tostring`.
fn tostring(lua: &Lua, value: Value) -> mlua::Result<String> {
    lua.globals().get::<Function>("tostring")?.call::<String>(value)
}

/// Replaces `print` so script output shares the runner's stdout buffer.
fn install_print(lua: &Lua) -> mlua::Result<()> {
    let tostring_fn: Function = lua.globals().get("tostring")?;
    let print = lua.create_function(move |_, args: Variadic<Value>| {
        let parts = args
            .into_iter()
            .map(|value| tostring_fn.call::<String>(value))
            .collect::<mlua::Result<Vec<_>>>()?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", parts.join("\t")).map_err(mlua::Error::external)?;
        stdout.flush().map_err(mlua::Error::external)
    })?;
    lua.globals().set("print", print)
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatch::{DispatchOutcome, Dispatcher, Phase};
    use crate::core::registry::RegistryError;

    fn load(source: &str) -> (LuaRuntime, Registry<Function>) {
        LuaRuntime::load(source, "test", &AppContext::default()).unwrap()
    }

    fn global_string(runtime: &LuaRuntime, name: &str) -> String {
        runtime.lua().globals().get::<String>(name).unwrap()
    }

    #[test]
    fn test_targets_and_default_are_registered() {
        let (_, registry) = load(
            r#"
            function target.build() end
            cmd.lint = function() end
            whet.default = target.build
            "#,
        );
        assert_eq!(registry.names(), vec!["", "build", "lint"]);
        assert_eq!(registry.get("").unwrap().id(), registry.get("build").unwrap().id());
    }

    #[test]
    fn test_annotations_and_docstrings_reconcile() {
        let (_, registry) = load(
            r#"
            local function deploy() end
            whet.help(deploy, "Ships it.\nMore details.")
            whet.compgen(deploy, "prod staging")
            target.deploy = deploy

            -- Runs the linters.
            function target.lint() end
            "#,
        );
        let deploy = registry.get("deploy").unwrap();
        assert_eq!(deploy.summary(), "Ships it.");
        assert_eq!(
            deploy.completion,
            crate::models::CompletionStrategy::Fixed("prod staging".to_string())
        );
        assert_eq!(registry.get("lint").unwrap().help, "Runs the linters.");
    }

    #[test]
    fn test_annotated_function_without_a_name_is_fatal() {
        let err = LuaRuntime::load(
            r#"
            function target.ok() end
            whet.help(function() end, "orphan")
            "#,
            "test",
            &AppContext::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RegistryError>(),
            Some(RegistryError::Unreconciled { valid }) if valid == &vec!["ok".to_string()]
        ));
    }

    #[test]
    fn test_flags_on_default_and_bad_compgen_are_script_errors() {
        let flags_on_default = LuaRuntime::load(
            r#"
            whet.default = function() end
            whet.flag(whet.default, function(flag) end)
            "#,
            "test",
            &AppContext::default(),
        );
        assert!(flags_on_default.is_err());

        let bad_compgen = LuaRuntime::load(
            "function target.a() end\nwhet.compgen(target.a, 42)",
            "test",
            &AppContext::default(),
        );
        assert!(bad_compgen.is_err());
    }

    #[test]
    fn test_dispatch_runs_hooks_around_the_target() {
        let (runtime, registry) = load(
            r#"
            trace = ""
            function whet.setup(name) trace = trace .. "setup:" .. name .. " " end
            function whet.teardown(name) trace = trace .. "teardown:" .. name end
            function target.foo(a, b) trace = trace .. a .. b .. " " end
            "#,
        );
        let words = vec!["x".to_string(), "y".to_string()];
        let outcome = Dispatcher::new(&registry, &runtime)
            .dispatch(Some("foo"), &words)
            .unwrap();
        assert_eq!(outcome, DispatchOutcome::Done);
        assert_eq!(global_string(&runtime, "trace"), "setup:foo xy teardown:foo");
    }

    #[test]
    fn test_false_return_aborts() {
        let (runtime, registry) = load(
            r#"
            function whet.setup() return false end
            function target.foo() ran = true end
            "#,
        );
        let outcome = Dispatcher::new(&registry, &runtime)
            .dispatch(Some("foo"), &[])
            .unwrap();
        assert!(matches!(
            outcome,
            DispatchOutcome::Aborted {
                phase: Phase::Setup,
                ..
            }
        ));
        assert_eq!(runtime.lua().globals().get::<Option<bool>>("ran").unwrap(), None);
    }

    #[test]
    fn test_flag_defaults_and_values_reach_the_target() {
        let (runtime, registry) = load(
            r#"
            function target.fooer(flags)
              seen = flags.name .. ":" .. tostring(flags.count) .. ":" .. tostring(flags[1])
            end
            whet.flag(target.fooer, function(flag)
              flag:string("name", "John Dow", "How to foo")
              flag:int("count", 2, "How often")
            end)
            "#,
        );
        Dispatcher::new(&registry, &runtime)
            .dispatch(Some("fooer"), &[])
            .unwrap();
        assert_eq!(global_string(&runtime, "seen"), "John Dow:2:nil");

        let words = vec!["-count=5".to_string(), "rest".to_string()];
        Dispatcher::new(&registry, &runtime)
            .dispatch(Some("fooer"), &words)
            .unwrap();
        assert_eq!(global_string(&runtime, "seen"), "John Dow:5:rest");
    }

    #[test]
    fn test_annotations_after_loading_are_rejected() {
        let (runtime, _registry) = load("function target.a() end");
        let result = runtime
            .lua()
            .load(r#"whet.help(target.a, "late")"#)
            .exec();
        assert!(result.is_err());
    }

    #[test]
    fn test_delegated_completion_result_is_verbatim() {
        let (runtime, registry) = load(
            r#"
            function target.fooer() end
            whet.compgen(target.fooer, function(words, cursor)
              return words[1] .. " " .. cursor
            end)
            "#,
        );
        let target = registry.get("fooer").unwrap();
        let crate::models::CompletionStrategy::Delegate(f) = &target.completion else {
            panic!("expected a delegated strategy");
        };
        let words = vec!["fooer".to_string(), "".to_string()];
        assert_eq!(runtime.complete(f, &words, 1).unwrap(), "fooer 1");
    }
}
