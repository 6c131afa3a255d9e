// src/core/flags.rs

use crate::models::{FlagValue, ParsedFlags};
use std::fmt::Write;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlagError {
    #[error("flag provided but not defined: -{0}")]
    Undefined(String),
    #[error("flag needs an argument: -{0}")]
    MissingValue(String),
    #[error("invalid value \"{value}\" for flag -{name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },
    #[error("bad flag syntax: {0}")]
    BadSyntax(String),
    #[error("flag redefined: {0}")]
    Redefined(String),
    #[error("help requested")]
    HelpRequested,
}

/// The value type of a declared flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagKind {
    Str,
    Int,
    Number,
    Bool,
}

impl FlagKind {
    /// The placeholder shown after the flag name in usage text.
    fn placeholder(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Int => "int",
            Self::Number => "number",
            Self::Bool => "",
        }
    }
}

/// A flag declared by a target's flag-setup function.
#[derive(Debug, Clone)]
pub struct FlagDef<F> {
    pub name: String,
    pub kind: FlagKind,
    pub default: FlagValue,
    pub help: String,
    /// Completion function for the flag's value.
    pub completion: Option<F>,
}

/// A named positional argument declared by a target's flag-setup function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgDef {
    pub name: String,
    pub help: String,
}

/// What the shell should be offered for a word inside a target's flags.
#[derive(Debug, PartialEq)]
pub enum FlagCompletion<'a, F> {
    Candidates(Vec<String>),
    /// Call the flag's completion function and emit its result verbatim.
    Delegate(&'a F),
    Nothing,
}

/// The flags and positional arguments one target accepts.
#[derive(Debug, Clone)]
pub struct FlagSet<F> {
    target: String,
    flags: Vec<FlagDef<F>>,
    args: Vec<ArgDef>,
}

impl<F> FlagSet<F> {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            flags: Vec::new(),
            args: Vec::new(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn flags(&self) -> &[FlagDef<F>] {
        &self.flags
    }

    pub fn args(&self) -> &[ArgDef] {
        &self.args
    }

    pub fn add_flag(&mut self, def: FlagDef<F>) -> Result<(), FlagError> {
        if self.find(&def.name).is_some() {
            return Err(FlagError::Redefined(def.name));
        }
        self.flags.push(def);
        Ok(())
    }

    pub fn add_arg(&mut self, name: impl Into<String>, help: impl Into<String>) {
        self.args.push(ArgDef {
            name: name.into(),
            help: help.into(),
        });
    }

    fn find(&self, name: &str) -> Option<&FlagDef<F>> {
        self.flags.iter().find(|f| f.name == name)
    }

    /// Parses `words` (the target name excluded).
    ///
    /// Flags come first; parsing stops at the first non-flag word or after
    /// `--`. Every remaining word is positional.
    pub fn parse(&self, words: &[String]) -> Result<ParsedFlags, FlagError> {
        let mut parsed = ParsedFlags::default();
        for def in &self.flags {
            parsed.values.insert(def.name.clone(), def.default.clone());
        }

        let mut rest = words;
        while let Some((word, tail)) = rest.split_first() {
            if word.len() < 2 || !word.starts_with('-') {
                break;
            }
            rest = tail;
            if word == "--" {
                break;
            }

            let body = strip_dashes(word);
            if body.is_empty() || body.starts_with('-') || body.starts_with('=') {
                return Err(FlagError::BadSyntax(word.clone()));
            }
            let (name, inline) = match body.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (body, None),
            };

            let def = match self.find(name) {
                Some(def) => def,
                None if name == "h" || name == "help" => return Err(FlagError::HelpRequested),
                None => return Err(FlagError::Undefined(name.to_string())),
            };

            let raw = match (def.kind, inline) {
                (_, Some(value)) => value.to_string(),
                (FlagKind::Bool, None) => "true".to_string(),
                (_, None) => {
                    let (value, tail) = rest
                        .split_first()
                        .ok_or_else(|| FlagError::MissingValue(name.to_string()))?;
                    rest = tail;
                    value.clone()
                }
            };
            let value = parse_value(def, &raw)?;
            log::trace!("Parsed flag -{} = {:?}", name, value);
            parsed.values.insert(def.name.clone(), value);
        }

        parsed.positional = rest.to_vec();
        for (arg, value) in self.args.iter().zip(&parsed.positional) {
            parsed
                .values
                .insert(arg.name.clone(), FlagValue::Str(value.clone()));
        }
        Ok(parsed)
    }

    /// One-line synopsis, e.g. `deploy [-env string] [-dry] <host>`.
    pub fn short_usage(&self) -> String {
        let mut usage = self.target.clone();
        for def in &self.flags {
            match def.kind {
                FlagKind::Bool => {
                    let _ = write!(usage, " [-{}]", def.name);
                }
                kind => {
                    let _ = write!(usage, " [-{} {}]", def.name, kind.placeholder());
                }
            }
        }
        for arg in &self.args {
            let _ = write!(usage, " <{}>", arg.name);
        }
        usage
    }

    /// The flag listing, sorted by name, one entry per flag:
    /// the flag line, then its help indented on the next line.
    pub fn flag_defaults(&self) -> String {
        let mut defs: Vec<&FlagDef<F>> = self.flags.iter().collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));

        let mut out = String::new();
        for def in defs {
            let mut line = format!("  -{}", def.name);
            let placeholder = def.kind.placeholder();
            if !placeholder.is_empty() {
                line.push(' ');
                line.push_str(placeholder);
            }
            // Single-letter boolean flags keep their help on the same line.
            if line.len() <= 4 {
                line.push('\t');
            } else {
                line.push_str("\n    \t");
            }
            line.push_str(&def.help);
            if let Some(default) = displayed_default(&def.default) {
                let _ = write!(line, " (default {})", default);
            }
            out.push_str(&line);
            out.push('\n');
        }
        out
    }

    /// The positional argument listing, in declaration order.
    pub fn arg_defaults(&self) -> String {
        self.args
            .iter()
            .map(|arg| format!("  {}\n    \t{}\n", arg.name, arg.help))
            .collect()
    }

    /// The text printed after a parse error.
    pub fn usage(&self) -> String {
        let mut usage = String::from("Usage:\n");
        usage.push_str(&self.flag_defaults());
        if !self.args.is_empty() {
            usage.push_str("Arguments:\n");
            usage.push_str(&self.arg_defaults());
        }
        usage
    }

    /// Completion for position `cursor` in `words`, where `words[0]` is the
    /// target name.
    pub fn complete(&self, words: &[String], cursor: usize) -> FlagCompletion<'_, F> {
        if cursor == 0 {
            return FlagCompletion::Nothing;
        }

        let previous = words.get(cursor - 1).map(String::as_str).unwrap_or("");
        if previous.starts_with('-') && !previous.contains('=') {
            if let Some(def) = self.find(strip_dashes(previous)) {
                if def.kind != FlagKind::Bool {
                    return match &def.completion {
                        Some(f) => FlagCompletion::Delegate(f),
                        None => FlagCompletion::Nothing,
                    };
                }
            }
        }

        let current = words.get(cursor).map(String::as_str).unwrap_or("");
        if current.is_empty() || current.starts_with('-') {
            let mut names: Vec<String> = self.flags.iter().map(|f| format!("-{}", f.name)).collect();
            names.sort();
            return FlagCompletion::Candidates(names);
        }
        FlagCompletion::Nothing
    }
}

fn strip_dashes(word: &str) -> &str {
    let body = word.strip_prefix('-').unwrap_or(word);
    body.strip_prefix('-').unwrap_or(body)
}

fn parse_value<F>(def: &FlagDef<F>, raw: &str) -> Result<FlagValue, FlagError> {
    let invalid = |reason: &str| FlagError::InvalidValue {
        name: def.name.clone(),
        value: raw.to_string(),
        reason: reason.to_string(),
    };
    match def.kind {
        FlagKind::Str => Ok(FlagValue::Str(raw.to_string())),
        FlagKind::Int => raw
            .parse::<i64>()
            .map(FlagValue::Int)
            .map_err(|_| invalid("parse error")),
        FlagKind::Number => raw
            .parse::<f64>()
            .map(FlagValue::Number)
            .map_err(|_| invalid("parse error")),
        FlagKind::Bool => parse_bool(raw)
            .map(FlagValue::Bool)
            .ok_or_else(|| invalid("parse error")),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Zero values are not advertised as defaults.
fn displayed_default(value: &FlagValue) -> Option<String> {
    match value {
        FlagValue::Str(s) if s.is_empty() => None,
        FlagValue::Str(s) => Some(format!("{:?}", s)),
        FlagValue::Int(0) | FlagValue::Bool(false) => None,
        FlagValue::Number(n) if *n == 0.0 => None,
        other => Some(other.to_string()),
    }
}

// MARK: --- UNIT TESTS ---
