// src/models.rs

use std::collections::BTreeMap;
use std::fmt;

// --- TARGET MODELS ---
// These are generic over `F`, the opaque handle to a script-defined callable.
// The only thing the core ever asks of a handle is identity comparison.

/// Index of a `Target` record inside the registry arena. Stable for the
/// lifetime of the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub usize);

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// How completion candidates for a target's own arguments are produced.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CompletionStrategy<F> {
    #[default]
    None,
    /// Always yields this literal string.
    Fixed(String),
    /// Calls the script function with `(words, cursor)` and uses its return value verbatim.
    Delegate(F),
}

/// One invocable subcommand exposed by the hosting script.
#[derive(Debug, Clone)]
pub struct Target<F> {
    pub(crate) id: TargetId,
    pub(crate) callable: F,
    pub(crate) name: String,
    pub(crate) valid: bool,
    pub help: String,
    pub completion: CompletionStrategy<F>,
    pub flag_setup: Option<F>,
}

impl<F> Target<F> {
    pub(crate) fn placeholder(id: TargetId, callable: F, name: String) -> Self {
        Self {
            id,
            callable,
            name,
            valid: false,
            help: String::new(),
            completion: CompletionStrategy::None,
            flag_setup: None,
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn callable(&self) -> &F {
        &self.callable
    }

    /// The name this record was last renamed to (a synthetic name while unreconciled).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// The first non-empty line of the help text, used in target listings.
    pub fn summary(&self) -> &str {
        self.help.trim().lines().next().unwrap_or("")
    }
}

// --- INVOCATION MODELS ---

/// The two global lifecycle hooks wrapped around every dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Setup,
    Teardown,
}

impl Hook {
    /// The key of the hook inside the runner table.
    pub fn key(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Teardown => "teardown",
        }
    }
}

/// Result of a script call that did not raise: either it completed, or it
/// returned an explicit `false` asking the runner to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    Completed,
    Aborted,
}

impl CallOutcome {
    pub fn is_abort(self) -> bool {
        matches!(self, Self::Aborted)
    }
}

/// A parsed value of a target flag.
#[derive(Debug, Clone, PartialEq)]
pub enum FlagValue {
    Str(String),
    Int(i64),
    Number(f64),
    Bool(bool),
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{}", s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Number(n) => write!(f, "{}", n),
            Self::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// The outcome of parsing a target's words against its declared flags.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedFlags {
    /// Flag values (defaults included) and named positional arguments, by name.
    pub values: BTreeMap<String, FlagValue>,
    /// Every positional word, in order.
    pub positional: Vec<String>,
}

/// What a target callable is invoked with.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetArgs {
    /// The raw remaining command-line words, passed as positional strings.
    Positional(Vec<String>),
    /// A single table built from the target's declared flags.
    Flags(ParsedFlags),
}
