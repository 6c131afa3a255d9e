// src/script/sh_module.rs

//! `require("sh")`: run programs and chain them into pipelines.
//!
//! ```lua
//! local sh = require("sh")
//! sh.echo("a\nb"):grep("a"):print()
//! for line in sh("git", "status", "--short"):lines() do ... end
//! ```
//!
//! A command runs on first observation and keeps its result.

use crate::system::executor::{self, CommandOutput};
use mlua::{AnyUserData, Function, Lua, MetaMethod, UserData, UserDataMethods, Value, Variadic};
use std::cell::{Cell, RefCell};
use std::fs;
use std::rc::Rc;

pub(crate) const MODULE_NAME: &str = "sh";

/// Registers the module in `package.preload`.
pub(crate) fn preload(lua: &Lua) -> mlua::Result<()> {
    let preload: mlua::Table = lua
        .globals()
        .get::<mlua::Table>("package")?
        .get("preload")?;
    let loader = lua.create_function(|lua, _: Variadic<Value>| lua.create_userdata(ShellModule))?;
    preload.set(MODULE_NAME, loader)
}

/// The module object: indexing yields a command constructor, calling it
/// builds a command directly.
#[derive(Debug, Clone, Copy)]
struct ShellModule;

impl UserData for ShellModule {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_meta_method(MetaMethod::Index, |lua, _, program: String| {
            constructor(lua, program, None)
        });
        methods.add_meta_method(
            MetaMethod::Call,
            |lua, _, (program, args): (String, Variadic<Value>)| {
                Ok(Pipeline::new(program, to_args(lua, args)?, None))
            },
        );
    }
}

/// A function building a `program` command, fed by `input` when piped.
/// Leading userdata arguments (the receiver of a `:` call) are skipped.
fn constructor(lua: &Lua, program: String, input: Option<Rc<Stage>>) -> mlua::Result<Function> {
    lua.create_function(move |lua, args: Variadic<Value>| {
        let args = args
            .into_iter()
            .skip_while(|v| matches!(v, Value::UserData(_)))
            .collect();
        Ok(Pipeline::new(program.clone(), to_args(lua, args)?, input.clone()))
    })
}

fn to_args(lua: &Lua, args: Variadic<Value>) -> mlua::Result<Vec<String>> {
    args.into_iter()
        .map(|value| match value {
            Value::String(_) | Value::Integer(_) | Value::Number(_) => lua.unpack::<String>(value),
            other => Err(mlua::Error::runtime(format!(
                "sh: arguments must be strings or numbers, got {}",
                other.type_name()
            ))),
        })
        .collect()
}

#[derive(Debug)]
struct Stage {
    program: String,
    args: Vec<String>,
    input: Option<Rc<Stage>>,
    output: RefCell<Option<CommandOutput>>,
}

impl Stage {
    /// Runs the stage (and everything upstream) once.
    fn output(&self) -> mlua::Result<CommandOutput> {
        if let Some(output) = self.output.borrow().as_ref() {
            return Ok(output.clone());
        }
        let stdin = match &self.input {
            Some(upstream) => Some(upstream.output()?.stdout.into_bytes()),
            None => None,
        };
        let output = executor::run_program(&self.program, &self.args, stdin)
            .map_err(mlua::Error::external)?;
        *self.output.borrow_mut() = Some(output.clone());
        Ok(output)
    }

    fn display(&self) -> String {
        let own = std::iter::once(self.program.as_str()).chain(self.args.iter().map(String::as_str));
        let own = shlex::try_join(own).unwrap_or_else(|_| self.program.clone());
        match &self.input {
            Some(upstream) => format!("{} | {}", upstream.display(), own),
            None => own,
        }
    }
}

#[derive(Debug, Clone)]
struct Pipeline(Rc<Stage>);

impl Pipeline {
    fn new(program: String, args: Vec<String>, input: Option<Rc<Stage>>) -> Self {
        Self(Rc::new(Stage {
            program,
            args,
            input,
            output: RefCell::new(None),
        }))
    }
}

fn pipeline_output(ud: &AnyUserData) -> mlua::Result<CommandOutput> {
    let stage = Rc::clone(&ud.borrow::<Pipeline>()?.0);
    stage.output()
}

impl UserData for Pipeline {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        methods.add_function("print", |_, ud: AnyUserData| {
            let output = pipeline_output(&ud)?;
            print!("{}", output.stdout);
            eprint!("{}", output.stderr);
            Ok(ud)
        });
        methods.add_function("ok", |_, ud: AnyUserData| {
            let output = pipeline_output(&ud)?;
            if !output.success() {
                let display = ud.borrow::<Pipeline>()?.0.display();
                return Err(mlua::Error::runtime(format!(
                    "sh: '{}' exited with status {}: {}",
                    display,
                    output.code,
                    output.stderr.trim()
                )));
            }
            Ok(ud)
        });
        methods.add_method("success", |_, this, ()| Ok(this.0.output()?.success()));
        methods.add_method("exitcode", |_, this, ()| Ok(this.0.output()?.code));
        methods.add_method("stdout", |_, this, file: Option<String>| {
            let stdout = this.0.output()?.stdout;
            write_to(file, &stdout)?;
            Ok(stdout)
        });
        methods.add_method("stderr", |_, this, file: Option<String>| {
            let stderr = this.0.output()?.stderr;
            write_to(file, &stderr)?;
            Ok(stderr)
        });
        methods.add_method("lines", |lua, this, stream: Option<String>| {
            let output = this.0.output()?;
            let text = match stream.as_deref() {
                None | Some("stdout") => output.stdout,
                Some("stderr") => output.stderr,
                Some(other) => {
                    return Err(mlua::Error::runtime(format!(
                        "sh: unknown stream '{}', expected 'stdout' or 'stderr'",
                        other
                    )));
                }
            };
            let lines: Vec<String> = text.lines().map(str::to_string).collect();
            let next = Cell::new(0_usize);
            lua.create_function(move |_, ()| {
                let index = next.get();
                next.set(index + 1);
                Ok(lines.get(index).cloned())
            })
        });
        methods.add_meta_method(MetaMethod::Index, |lua, this, program: String| {
            constructor(lua, program, Some(Rc::clone(&this.0)))
        });
        methods.add_meta_method(MetaMethod::ToString, |_, this, ()| Ok(this.0.display()));
    }
}

fn write_to(file: Option<String>, content: &str) -> mlua::Result<()> {
    if let Some(path) = file {
        fs::write(&path, content).map_err(|e| {
            mlua::Error::runtime(format!("sh: cannot write '{}': {}", path, e))
        })?;
    }
    Ok(())
}

// MARK: --- UNIT TESTS ---
