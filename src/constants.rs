// src/constants.rs

/// The script filenames searched for during discovery, in order of preference.
pub const DEFAULT_SCRIPT_FILENAMES: &[&str] = &["Whetfile", "Whetfile.lua"];

/// The file written by `whet -init`.
pub const INIT_SCRIPT_FILENAME: &str = "Whetfile";

/// The global Lua table exposing the runner API.
pub const RUNNER_TABLE: &str = "whet";

/// The global Lua table the script assigns its targets into.
pub const COMMANDS_TABLE: &str = "target";

/// A second global name bound to the same commands table.
pub const COMMANDS_TABLE_ALIAS: &str = "cmd";

/// The pseudo-target that prints help instead of dispatching.
pub const HELP_TARGET: &str = "help";

/// How the default target (registry key `""`) is shown in help listings.
pub const DEFAULT_TARGET_DISPLAY: &str = "<default>";

/// The global flag whose value is a file path (completion switches to filename mode).
pub const FILE_PATH_FLAG: &str = "-f";

/// The global flag whose value is inline script source.
pub const INLINE_CODE_FLAG: &str = "-c";

// Completion header block, emitted before the candidates when the shell
// should fall back to filename completion.
pub const COMPGEN_HEADER: &str = "### BEGIN COMPGEN INFO";
pub const COMPGEN_FOOTER: &str = "### END COMPGEN INFO";
pub const COMPGEN_OPTION_PREFIX: &str = "# ";
pub const COMPGEN_OPTION_SEPARATOR: &str = ": ";

/// The directory (under the system config dir) holding `config.toml`.
pub const CONFIG_DIR_NAME: &str = "whet";

/// The name of the optional user configuration file.
pub const CONFIG_FILENAME: &str = "config.toml";

/// Exit status used when the process is interrupted with nothing to wind down.
pub const INTERRUPTED_EXIT_CODE: i32 = 130;
