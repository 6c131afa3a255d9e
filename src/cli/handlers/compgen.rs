// src/cli/handlers/compgen.rs

use super::commons::{self, ScriptSource};
use crate::{
    cli::{self, Cli},
    constants::{FILE_PATH_FLAG, INLINE_CODE_FLAG},
    core::completion::{self, CompletionReply, Completer, Position},
    state::AppContext,
};
use anyhow::{Context, Result};

/// The main handler for `-compgen`. `cli.args` are the shell's words,
/// starting with the program name.
pub fn handle(cli: &Cli, ctx: &AppContext) -> Result<()> {
    let words = &cli.args;
    let cursor = cli
        .comp_cwords
        .unwrap_or_else(|| words.len().saturating_sub(1));
    let reply = reply_for(words, cursor, cli, ctx)?;
    if !reply.is_empty() {
        println!("{}", reply);
    }
    Ok(())
}

fn reply_for(words: &[String], cursor: usize, cli: &Cli, ctx: &AppContext) -> Result<CompletionReply> {
    let position = completion::classify(words, cursor);
    let global_flags = cli::global_flag_names();
    match position {
        Position::GlobalFlag { filedir } => {
            return Ok(CompletionReply::global_flags(&global_flags, filedir));
        }
        Position::Nothing => return Ok(CompletionReply::default()),
        Position::TargetName | Position::TargetArgs { .. } => {}
    }

    // A `-f` or `-c` on the line being completed beats the one given to `-compgen`.
    let typed = (typed_value(words, FILE_PATH_FLAG), typed_value(words, INLINE_CODE_FLAG));
    let (file, code) = match typed {
        (None, None) => (cli.file.as_deref(), cli.code.as_deref()),
        typed => typed,
    };
    let source = ScriptSource::resolve(file, code).context("whet: no script to complete from")?;
    let (runtime, registry) = commons::load_script(&source, ctx)?;
    Completer::new(&registry, &runtime, &global_flags).complete(&position)
}

/// The value following `flag` among the words typed so far.
fn typed_value<'a>(words: &'a [String], flag: &str) -> Option<&'a str> {
    words
        .iter()
        .zip(words.iter().skip(1))
        .find(|(word, _)| word.as_str() == flag)
        .map(|(_, value)| value.as_str())
}

// MARK: --- UNIT TESTS ---

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn inline(code: &str) -> Cli {
        Cli {
            code: Some(code.to_string()),
            ..Cli::default()
        }
    }

    #[test]
    fn test_global_flags_need_no_script() {
        let cli = Cli {
            file: Some("/definitely/not/here.lua".to_string()),
            ..Cli::default()
        };
        let words = strings(&["whet", "-"]);
        let reply = reply_for(&words, 1, &cli, &AppContext::default()).unwrap();
        assert!(reply.lines.contains(&"-debug".to_string()));

        let words = strings(&["whet", "-f", ""]);
        let reply = reply_for(&words, 2, &cli, &AppContext::default()).unwrap();
        assert!(reply.filedir);
    }

    #[test]
    fn test_target_names_and_flag_values() {
        let cli = inline(
            r#"
            function target.fooer() end
            function target.build() end
            whet.flag(target.fooer, function(flag)
              flag:string("name", "", "Who", function() return "fi fi fo fum" end)
            end)
            "#,
        );
        let words = strings(&["whet", ""]);
        let reply = reply_for(&words, 1, &cli, &AppContext::default()).unwrap();
        assert_eq!(reply.to_string(), "build\nfooer\nhelp");

        let words = strings(&["whet", "fooer", "-name"]);
        let reply = reply_for(&words, 3, &cli, &AppContext::default()).unwrap();
        assert_eq!(reply.to_string(), "fi fi fo fum");
    }

    #[test]
    fn test_typed_flag_values() {
        let words = strings(&["whet", "-f", "x.lua", "a"]);
        assert_eq!(typed_value(&words, FILE_PATH_FLAG), Some("x.lua"));
        assert_eq!(typed_value(&words, INLINE_CODE_FLAG), None);
        assert_eq!(typed_value(&strings(&["whet", "a"]), FILE_PATH_FLAG), None);
    }

    #[test]
    fn test_inline_source_on_the_line_is_completed_from() {
        let cli = Cli {
            file: Some("/definitely/not/here.lua".to_string()),
            ..Cli::default()
        };
        let words = strings(&["whet", "-c", "function target.zz() end", ""]);
        let reply = reply_for(&words, 3, &cli, &AppContext::default()).unwrap();
        assert_eq!(reply.to_string(), "help\nzz");

        let reply = reply_for(&words, 2, &cli, &AppContext::default()).unwrap();
        assert!(reply.is_empty());
    }
}
