// src/cli/mod.rs

use clap::{Arg, CommandFactory, Parser};

pub mod handlers;

/// whet: runs the targets of a Lua script, with completion and file watching.
#[derive(Parser, Debug, Default)]
#[command(
    name = "whet",
    version,
    about,
    disable_help_flag = true,
    styles = clap::builder::Styles::styled()
        .header(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .usage(clap::builder::styling::AnsiColor::Yellow.on_default().bold())
        .literal(clap::builder::styling::AnsiColor::Cyan.on_default().bold())
        .placeholder(clap::builder::styling::AnsiColor::Green.on_default()),
)]
pub struct Cli {
    /// Print debug logs on stderr.
    #[arg(long)]
    pub debug: bool,

    /// Script file to load instead of searching for a Whetfile.
    #[arg(short = 'f', value_name = "FILE")]
    pub file: Option<String>,

    /// Script source to run instead of a file.
    #[arg(short = 'c', value_name = "SOURCE", conflicts_with = "file")]
    pub code: Option<String>,

    /// Show the help of the runner, or of a target with `help <target>`.
    #[arg(short = 'h', long)]
    pub help: bool,

    /// Complete the command line given as the remaining words.
    #[arg(long, hide = true)]
    pub compgen: bool,

    /// Index of the word under the cursor, for `-compgen`.
    #[arg(long = "comp-cwords", hide = true, value_name = "N")]
    pub comp_cwords: Option<usize>,

    /// Print the bash completion configuration.
    #[arg(long = "generate-bash-conf")]
    pub generate_bash_conf: bool,

    /// Create a starter Whetfile in the current directory.
    #[arg(long)]
    pub init: bool,

    /// The target followed by its arguments.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "TARGET")]
    pub args: Vec<String>,
}

/// What an invocation asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Init,
    BashConf,
    Compgen,
    Run,
}

impl Cli {
    pub fn mode(&self) -> Mode {
        if self.init {
            Mode::Init
        } else if self.generate_bash_conf {
            Mode::BashConf
        } else if self.compgen {
            Mode::Compgen
        } else {
            Mode::Run
        }
    }

    /// The target named on the command line, with `-h` read as `help`.
    pub fn target_and_args(&self) -> (Option<&str>, &[String]) {
        if self.help {
            return (Some(crate::constants::HELP_TARGET), &self.args);
        }
        match self.args.split_first() {
            Some((target, rest)) => (Some(target.as_str()), rest),
            None => (None, &[]),
        }
    }
}

/// The runner's flags; hidden ones only with `include_hidden`.
fn option_args(include_hidden: bool) -> Vec<Arg> {
    let mut command = Cli::command();
    command.build();
    command
        .get_arguments()
        .filter(|arg| !arg.is_positional() && (include_hidden || !arg.is_hide_set()))
        .cloned()
        .collect()
}

/// The flag as users type it: always with a single dash.
fn single_dash_name(arg: &Arg) -> Option<String> {
    arg.get_long()
        .map(|long| format!("-{}", long))
        .or_else(|| arg.get_short().map(|short| format!("-{}", short)))
}

fn takes_value(arg: &Arg) -> bool {
    arg.get_action().takes_values()
}

/// Every visible runner flag, sorted, for completion.
pub fn global_flag_names() -> Vec<String> {
    let mut names: Vec<String> = option_args(false).iter().filter_map(single_dash_name).collect();
    names.sort();
    names
}

/// The `Options:` block of the global help.
pub fn render_options() -> String {
    let rows: Vec<(String, String)> = option_args(false)
        .iter()
        .filter_map(|arg| {
            let mut usage = single_dash_name(arg)?;
            if takes_value(arg) {
                let value = arg
                    .get_value_names()
                    .and_then(|names| names.first())
                    .map(|name| name.to_string())
                    .unwrap_or_else(|| "VALUE".to_string());
                usage = format!("{} {}", usage, value);
            }
            let help = arg.get_help().map(|h| h.to_string()).unwrap_or_default();
            Some((usage, help))
        })
        .collect();

    let width = rows.iter().map(|(usage, _)| usage.len()).max().unwrap_or(0);
    rows.iter()
        .map(|(usage, help)| format!("  {:<width$}  {}\n", usage, help, width = width))
        .collect()
}

/// Rewrites leading single-dash long flags (`-debug`) to the form the
/// parser expects (`--debug`). Stops at the first positional word so the
/// target's own arguments are passed through untouched.
pub fn normalize_args<I>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let args = option_args(true);
    let find = |name: &str| {
        args.iter().find(|arg| {
            arg.get_long() == Some(name)
                || (name.chars().count() == 1 && arg.get_short() == name.chars().next())
        })
    };

    let mut raw = raw.into_iter();
    let mut out: Vec<String> = raw.next().into_iter().collect();

    while let Some(word) = raw.next() {
        if word == "--" || !word.starts_with('-') || word == "-" {
            out.push(word);
            break;
        }
        let body = word.trim_start_matches('-');
        let name = body.split_once('=').map_or(body, |(name, _)| name);
        let is_long = name.chars().count() > 1;
        let needs_value = !body.contains('=') && find(name).is_some_and(takes_value);

        let normalized = if is_long && !word.starts_with("--") {
            format!("-{}", word)
        } else {
            word
        };
        log::trace!("Global flag '{}'", normalized);
        out.push(normalized);
        if needs_value {
            if let Some(value) = raw.next() {
                out.push(value);
            }
        }
    }
    out.extend(raw);
    out
}

// MARK: --- UNIT TESTS ---
