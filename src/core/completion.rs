// src/core/completion.rs

//! Shell completion: decides what the word under the cursor is, then asks the
//! registry (and the target's own completion strategy) for candidates.

use crate::constants::{
    COMPGEN_FOOTER, COMPGEN_HEADER, COMPGEN_OPTION_PREFIX, COMPGEN_OPTION_SEPARATOR,
    FILE_PATH_FLAG, HELP_TARGET, INLINE_CODE_FLAG,
};
use crate::core::dispatch::ScriptRuntime;
use crate::core::flags::FlagCompletion;
use crate::core::registry::Registry;
use crate::models::CompletionStrategy;
use anyhow::Result;
use std::fmt;

/// What the word at the cursor is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Position<'a> {
    /// One of the runner's own flags, or (with `filedir`) the path given to `-f`.
    GlobalFlag { filedir: bool },
    TargetName,
    /// A word belonging to a target. `words[0]` is the target name and
    /// `cursor` is relative to it.
    TargetArgs { words: &'a [String], cursor: usize },
    /// Past the end of what was typed, with no target to ask, or the
    /// source given to `-c`.
    Nothing,
}

/// Classifies `cursor` within `words`, where `words[0]` is the program name.
///
/// Needs no script: the global flags are recognized purely by shape, so
/// flag completion keeps working when no script can be found.
pub fn classify(words: &[String], cursor: usize) -> Position<'_> {
    let mut rest = words.get(1..).unwrap_or_default();
    let mut index = 1;
    let mut previous = "";

    while let Some((word, tail)) = rest.split_first() {
        let takes_path = previous == FILE_PATH_FLAG;
        let takes_code = previous == INLINE_CODE_FLAG;
        if !word.starts_with('-') && !takes_path && !takes_code {
            break;
        }
        if cursor == index && takes_code {
            return Position::Nothing;
        }
        if cursor == index {
            log::debug!("Completing global flag at word {}", index);
            return Position::GlobalFlag {
                filedir: takes_path,
            };
        }
        previous = word;
        rest = tail;
        index += 1;
    }

    if cursor == index {
        log::debug!("Completing target name at word {}", index);
        return Position::TargetName;
    }
    if rest.is_empty() || cursor < index {
        return Position::Nothing;
    }
    log::debug!("Completing arguments of target at word {}", index);
    Position::TargetArgs {
        words: rest,
        cursor: cursor - index,
    }
}

/// The completion block written to stdout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionReply {
    /// Ask the shell to fall back to filename completion.
    pub filedir: bool,
    pub lines: Vec<String>,
}

impl CompletionReply {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self {
            filedir: false,
            lines,
        }
    }

    /// The reply for a global flag position. A path position yields no
    /// candidates and hands over to filename completion.
    pub fn global_flags(flags: &[String], filedir: bool) -> Self {
        if filedir {
            return Self {
                filedir: true,
                lines: Vec::new(),
            };
        }
        Self::from_lines(flags.to_vec())
    }

    pub fn is_empty(&self) -> bool {
        !self.filedir && self.lines.iter().all(String::is_empty)
    }
}

impl fmt::Display for CompletionReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut lines: Vec<String> = Vec::new();
        if self.filedir {
            lines.push(COMPGEN_HEADER.to_string());
            lines.push(format!(
                "{}mode{}filedir",
                COMPGEN_OPTION_PREFIX, COMPGEN_OPTION_SEPARATOR
            ));
            lines.push(COMPGEN_FOOTER.to_string());
        }
        lines.extend(self.lines.iter().filter(|l| !l.is_empty()).cloned());
        write!(f, "{}", lines.join("\n"))
    }
}

/// Produces completion replies against a reconciled registry.
pub struct Completer<'a, R: ScriptRuntime> {
    registry: &'a Registry<R::Callable>,
    runtime: &'a R,
    global_flags: &'a [String],
}

impl<R: ScriptRuntime> fmt::Debug for Completer<'_, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completer")
            .field("targets", &self.registry.len())
            .field("global_flags", &self.global_flags)
            .finish()
    }
}

impl<'a, R: ScriptRuntime> Completer<'a, R> {
    pub fn new(
        registry: &'a Registry<R::Callable>,
        runtime: &'a R,
        global_flags: &'a [String],
    ) -> Self {
        Self {
            registry,
            runtime,
            global_flags,
        }
    }

    /// Every public target name except the default, sorted.
    fn target_names(&self) -> Vec<String> {
        self.registry
            .names()
            .into_iter()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn complete(&self, position: &Position<'_>) -> Result<CompletionReply> {
        match position {
            Position::GlobalFlag { filedir } => {
                Ok(CompletionReply::global_flags(self.global_flags, *filedir))
            }
            Position::TargetName => {
                let mut names = self.target_names();
                names.push(HELP_TARGET.to_string());
                names.sort();
                names.dedup();
                Ok(CompletionReply::from_lines(names))
            }
            Position::Nothing => Ok(CompletionReply::default()),
            Position::TargetArgs { words, cursor } => self.complete_target(words, *cursor),
        }
    }

    fn complete_target(&self, words: &[String], cursor: usize) -> Result<CompletionReply> {
        let Some(name) = words.first().filter(|n| !n.is_empty()) else {
            return Ok(CompletionReply::default());
        };
        if name == HELP_TARGET {
            return Ok(CompletionReply::from_lines(self.target_names()));
        }
        let Some(target) = self.registry.get(name) else {
            log::debug!("No completion for unknown target '{}'", name);
            return Ok(CompletionReply::default());
        };

        let mut lines = Vec::new();
        match &target.completion {
            CompletionStrategy::None => {}
            CompletionStrategy::Fixed(text) => lines.push(text.clone()),
            CompletionStrategy::Delegate(f) => {
                lines.push(self.runtime.complete(f, words, cursor)?);
            }
        }

        if let Some(setup) = &target.flag_setup {
            let flag_set = self.runtime.build_flag_set(setup, name)?;
            match flag_set.complete(words, cursor) {
                FlagCompletion::Candidates(candidates) => lines.extend(candidates),
                FlagCompletion::Delegate(f) => lines.push(self.runtime.complete(f, words, cursor)?),
                FlagCompletion::Nothing => {}
            }
        }
        Ok(CompletionReply::from_lines(lines))
    }
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatch::tests::FakeRuntime;
    use crate::core::registration::{declare_compgen, declare_flags, reconcile};

    fn words(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn registry() -> Registry<&'static str> {
        let mut registry = Registry::new();
        declare_flags(&mut registry, &"fooer", None, "fooer_flags").unwrap();
        declare_compgen(
            &mut registry,
            &"build",
            None,
            CompletionStrategy::Fixed("debug release".to_string()),
        )
        .unwrap();
        declare_compgen(
            &mut registry,
            &"deploy",
            None,
            CompletionStrategy::Delegate("deploy_hosts"),
        )
        .unwrap();
        let commands = vec![
            ("fooer".to_string(), "fooer"),
            ("build".to_string(), "build"),
            ("deploy".to_string(), "deploy"),
        ];
        reconcile(&mut registry, commands, Some(&"default"), |_| None).unwrap();
        registry
    }

    #[test]
    fn test_classify_positions() {
        let w = words(&["whet", "-debug", "-f", "Whetfile", "build", "x"]);
        assert_eq!(classify(&w, 1), Position::GlobalFlag { filedir: false });
        assert_eq!(classify(&w, 3), Position::GlobalFlag { filedir: true });
        assert_eq!(classify(&w, 4), Position::TargetName);
        assert_eq!(
            classify(&w, 5),
            Position::TargetArgs {
                words: &w[4..],
                cursor: 1
            }
        );
    }

    #[test]
    fn test_classify_skips_inline_source() {
        let w = words(&["whet", "-c", "function target.zz() end", ""]);
        assert_eq!(classify(&w, 2), Position::Nothing);
        assert_eq!(classify(&w, 3), Position::TargetName);

        let w = words(&["whet", "-c", "print(1)", "build", "-"]);
        assert_eq!(
            classify(&w, 4),
            Position::TargetArgs {
                words: &w[3..],
                cursor: 1
            }
        );
    }

    #[test]
    fn test_classify_first_word_after_program_is_target_name() {
        let w = words(&["whet", ""]);
        assert_eq!(classify(&w, 1), Position::TargetName);
        assert_eq!(classify(&words(&["whet"]), 1), Position::TargetName);
        assert_eq!(classify(&words(&["whet", "-debug"]), 3), Position::Nothing);
    }

    #[test]
    fn test_target_names_are_sorted_with_help_and_without_default() {
        let registry = registry();
        let runtime = FakeRuntime::default();
        let flags: Vec<String> = Vec::new();
        let completer = Completer::new(&registry, &runtime, &flags);

        let reply = completer.complete(&Position::TargetName).unwrap();
        assert_eq!(reply.to_string(), "build\ndeploy\nfooer\nhelp");
    }

    #[test]
    fn test_help_argument_lists_targets() {
        let registry = registry();
        let runtime = FakeRuntime::default();
        let completer = Completer::new(&registry, &runtime, &[]);
        let w = words(&["help", ""]);

        let reply = completer
            .complete(&Position::TargetArgs { words: &w, cursor: 1 })
            .unwrap();
        assert_eq!(reply.lines, words(&["build", "deploy", "fooer"]));
    }

    #[test]
    fn test_fixed_and_delegated_strategies() {
        let registry = registry();
        let runtime = FakeRuntime {
            completions: vec![("deploy_hosts", "prod staging".to_string())],
            ..Default::default()
        };
        let completer = Completer::new(&registry, &runtime, &[]);

        let w = words(&["build", ""]);
        let reply = completer
            .complete(&Position::TargetArgs { words: &w, cursor: 1 })
            .unwrap();
        assert_eq!(reply.to_string(), "debug release");

        let w = words(&["deploy", "p"]);
        let reply = completer
            .complete(&Position::TargetArgs { words: &w, cursor: 1 })
            .unwrap();
        assert_eq!(reply.to_string(), "prod staging");
        assert_eq!(runtime.calls(), vec!["deploy_hosts(deploy,p;1)"]);
    }

    #[test]
    fn test_flag_value_completion_is_delegated() {
        let registry = registry();
        let runtime = FakeRuntime {
            completions: vec![("complete_name", "fi fi fo fum".to_string())],
            ..Default::default()
        };
        let completer = Completer::new(&registry, &runtime, &[]);

        let w = words(&["whet", "fooer", "-name"]);
        let position = classify(&w, 3);
        let reply = completer.complete(&position).unwrap();
        assert_eq!(reply.to_string(), "fi fi fo fum");
    }

    #[test]
    fn test_unknown_target_yields_nothing() {
        let registry = registry();
        let runtime = FakeRuntime::default();
        let completer = Completer::new(&registry, &runtime, &[]);
        let w = words(&["nope", ""]);

        let reply = completer
            .complete(&Position::TargetArgs { words: &w, cursor: 1 })
            .unwrap();
        assert!(reply.is_empty());
        assert!(runtime.calls().is_empty());
    }

    #[test]
    fn test_filedir_reply_has_header_block() {
        let reply = CompletionReply::global_flags(&words(&["-debug", "-f"]), true);
        assert_eq!(
            reply.to_string(),
            "### BEGIN COMPGEN INFO\n# mode: filedir\n### END COMPGEN INFO"
        );

        let reply = CompletionReply::global_flags(&words(&["-debug", "-f"]), false);
        assert_eq!(reply.to_string(), "-debug\n-f");
    }
}
