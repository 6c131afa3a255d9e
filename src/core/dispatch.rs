// src/core/dispatch.rs

//! The setup → target → teardown lifecycle of one invocation.

use crate::core::flags::{FlagError, FlagSet};
use crate::core::registry::Registry;
use crate::models::{CallOutcome, Hook, TargetArgs};
use anyhow::Result;
use std::fmt;
use thiserror::Error;

/// Everything the core needs from the embedded scripting runtime.
///
/// Every call distinguishes a runtime failure (`Err`, always fatal) from a
/// clean return of an explicit `false` (`Ok(CallOutcome::Aborted)`).
pub trait ScriptRuntime {
    /// Identity-comparable handle to a script-defined function.
    type Callable: Clone + PartialEq;

    /// Invokes the global `setup`/`teardown` hook with the resolved target name.
    fn run_hook(&self, hook: Hook, target: &str) -> Result<CallOutcome>;

    /// Invokes a target's callable.
    fn call_target(&self, callable: &Self::Callable, args: TargetArgs) -> Result<CallOutcome>;

    /// Runs a flag-setup callable against a fresh builder and returns what it declared.
    fn build_flag_set(
        &self,
        setup: &Self::Callable,
        target: &str,
    ) -> Result<FlagSet<Self::Callable>>;

    /// Calls a completion function with `(words, cursor)` and returns its result verbatim.
    fn complete(&self, callable: &Self::Callable, words: &[String], cursor: usize)
    -> Result<String>;
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Target '{0}' is not defined. Run 'whet help' to list the available targets.")]
    UndefinedTarget(String),
}

/// The lifecycle phase in which an abort was signaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Target,
    Teardown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::Target => write!(f, "target"),
            Self::Teardown => write!(f, "teardown"),
        }
    }
}

/// How a dispatch that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Done,
    /// A hook or the target returned `false`. The first abort wins.
    Aborted { phase: Phase, target: String },
    /// The target's flags did not parse; holds the text to show on stderr.
    /// The body was skipped but teardown ran.
    Usage(String),
    /// No target was named and the script has no default target. Global
    /// help was shown between the hooks.
    NoDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Setup,
    Running,
    Teardown,
    Done,
    Aborted,
}

/// Drives one invocation against a reconciled registry.
pub struct Dispatcher<'a, R: ScriptRuntime> {
    registry: &'a Registry<R::Callable>,
    runtime: &'a R,
    state: State,
}

impl<R: ScriptRuntime> fmt::Debug for Dispatcher<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("targets", &self.registry.len())
            .field("state", &self.state)
            .finish()
    }
}

impl<'a, R: ScriptRuntime> Dispatcher<'a, R> {
    pub fn new(registry: &'a Registry<R::Callable>, runtime: &'a R) -> Self {
        Self {
            registry,
            runtime,
            state: State::Idle,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    fn transition(&mut self, next: State) {
        log::debug!("Dispatch: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Runs `target` (the default target when `None`) with its remaining words.
    pub fn dispatch(&mut self, target: Option<&str>, words: &[String]) -> Result<DispatchOutcome> {
        self.dispatch_with_help(target, words, || Ok(()))
    }

    /// Like [`Dispatcher::dispatch`], but with no target and no default
    /// target `show_help` stands in for the body, between the hooks.
    pub fn dispatch_with_help<F>(
        &mut self,
        target: Option<&str>,
        words: &[String],
        show_help: F,
    ) -> Result<DispatchOutcome>
    where
        F: FnOnce() -> Result<()>,
    {
        let name = target.unwrap_or("");

        self.transition(State::Setup);
        if self.runtime.run_hook(Hook::Setup, name)?.is_abort() {
            return Ok(self.abort(Phase::Setup, name));
        }

        if target.is_none() && !self.registry.contains("") {
            log::debug!("No target given and no default target declared");
            self.transition(State::Running);
            show_help()?;
            self.transition(State::Teardown);
            if self.runtime.run_hook(Hook::Teardown, name)?.is_abort() {
                return Ok(self.abort(Phase::Teardown, name));
            }
            self.transition(State::Done);
            return Ok(DispatchOutcome::NoDefault);
        }

        let Some(record) = self.registry.get(name) else {
            self.transition(State::Aborted);
            return Err(DispatchError::UndefinedTarget(name.to_string()).into());
        };

        self.transition(State::Running);
        let mut usage = None;
        let outcome = match &record.flag_setup {
            Some(setup) => {
                let flag_set = self.runtime.build_flag_set(setup, name)?;
                match flag_set.parse(words) {
                    Ok(parsed) => self
                        .runtime
                        .call_target(record.callable(), TargetArgs::Flags(parsed))?,
                    Err(err) => {
                        log::debug!("Flags of target '{}' did not parse: {}", name, err);
                        usage = Some(match err {
                            FlagError::HelpRequested => flag_set.usage(),
                            err => format!("{}\n{}", err, flag_set.usage()),
                        });
                        CallOutcome::Completed
                    }
                }
            }
            None => self
                .runtime
                .call_target(record.callable(), TargetArgs::Positional(words.to_vec()))?,
        };

        self.transition(State::Teardown);
        let teardown = self.runtime.run_hook(Hook::Teardown, name)?;

        if outcome.is_abort() {
            return Ok(self.abort(Phase::Target, name));
        }
        if teardown.is_abort() {
            return Ok(self.abort(Phase::Teardown, name));
        }

        self.transition(State::Done);
        Ok(usage.map_or(DispatchOutcome::Done, DispatchOutcome::Usage))
    }

    fn abort(&mut self, phase: Phase, name: &str) -> DispatchOutcome {
        log::debug!("Target '{}' aborted during {}", name, phase);
        self.transition(State::Aborted);
        DispatchOutcome::Aborted {
            phase,
            target: name.to_string(),
        }
    }
}

// MARK: --- UNIT TESTS ---
