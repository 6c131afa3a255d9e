// src/system/executor.rs

use std::io::{self, Read, Write};
use std::process::{Command as StdCommand, Stdio};
use std::thread;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Shell '{0}' could not be parsed.")]
    ShellParse(String),
    #[error("No command specified to run.")]
    EmptyCommand,
    #[error("Command '{0}' could not be executed: {1}")]
    CommandFailed(String, #[source] io::Error),
    #[error("Command '{command}' exited with status {code}.")]
    NonZeroExitStatus { command: String, code: i32 },
}

/// Where a running command's output goes besides the capture buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    /// Print the command line before running it.
    pub echo: bool,
    /// Turn a non-zero exit status into `ExecutionError::NonZeroExitStatus`.
    pub abort_on_failure: bool,
    /// Copy stdout to the terminal while capturing it.
    pub stream_stdout: bool,
}

impl RunOptions {
    pub const SH: Self = Self {
        echo: true,
        abort_on_failure: true,
        stream_stdout: true,
    };
    pub const SH_QUIET: Self = Self {
        echo: false,
        ..Self::SH
    };
    pub const EXEC: Self = Self {
        abort_on_failure: false,
        ..Self::SH
    };
    pub const EXEC_QUIET: Self = Self {
        echo: false,
        ..Self::EXEC
    };
    pub const SYSTEM: Self = Self {
        echo: false,
        abort_on_failure: false,
        stream_stdout: false,
    };
}

/// The captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == 0
    }
}

/// Runs `command_line` as `<shell> -c <command_line>`.
///
/// Stderr is always streamed to the terminal; stdout is streamed when
/// `options.stream_stdout` is set. Both are captured either way.
pub fn run_shell(
    command_line: &str,
    shell: &str,
    options: RunOptions,
) -> Result<CommandOutput, ExecutionError> {
    if command_line.trim().is_empty() {
        return Err(ExecutionError::EmptyCommand);
    }
    let mut shell_parts =
        shlex::split(shell).ok_or_else(|| ExecutionError::ShellParse(shell.to_string()))?;
    if shell_parts.is_empty() {
        return Err(ExecutionError::ShellParse(shell.to_string()));
    }
    let program = shell_parts.remove(0);

    if options.echo {
        println!("{}", command_line);
    }
    log::debug!("Running '{}' with {} {:?}", command_line, program, shell_parts);

    let mut command = StdCommand::new(&program);
    command.args(&shell_parts).arg("-c").arg(command_line);
    let output = spawn_and_capture(command, command_line, None, options.stream_stdout, true)?;

    if options.abort_on_failure && !output.success() {
        return Err(ExecutionError::NonZeroExitStatus {
            command: command_line.to_string(),
            code: output.code,
        });
    }
    Ok(output)
}

/// Runs `program` directly with `args`, feeding `stdin` when given.
/// Nothing is streamed; both outputs are only captured.
pub fn run_program(
    program: &str,
    args: &[String],
    stdin: Option<Vec<u8>>,
) -> Result<CommandOutput, ExecutionError> {
    let display = shlex::try_join(std::iter::once(program).chain(args.iter().map(String::as_str)))
        .unwrap_or_else(|_| program.to_string());
    log::debug!("Running program: {}", display);

    let mut command = StdCommand::new(program);
    command.args(args);
    spawn_and_capture(command, &display, stdin, false, false)
}

fn spawn_and_capture(
    mut command: StdCommand,
    display: &str,
    stdin: Option<Vec<u8>>,
    stream_stdout: bool,
    stream_stderr: bool,
) -> Result<CommandOutput, ExecutionError> {
    let failed = |e: io::Error| ExecutionError::CommandFailed(display.to_string(), e);

    command
        .stdin(if stdin.is_some() { Stdio::piped() } else { Stdio::null() })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let mut child = command.spawn().map_err(failed)?;

    let feeder = match (child.stdin.take(), stdin) {
        (Some(mut pipe), Some(bytes)) => Some(thread::spawn(move || {
            // A reader that exits early closes the pipe; that is not our failure.
            let _ = pipe.write_all(&bytes);
        })),
        _ => None,
    };
    let stdout_reader = child
        .stdout
        .take()
        .map(|pipe| thread::spawn(move || tee(pipe, stream_stdout, io::stdout)));
    let stderr_reader = child
        .stderr
        .take()
        .map(|pipe| thread::spawn(move || tee(pipe, stream_stderr, io::stderr)));

    let status = child.wait().map_err(failed)?;
    if let Some(handle) = feeder {
        let _ = handle.join();
    }
    let stdout = join_reader(stdout_reader).map_err(failed)?;
    let stderr = join_reader(stderr_reader).map_err(failed)?;

    // Killed by a signal: report it the way shells do.
    let code = status.code().unwrap_or_else(|| signal_code(&status));
    log::debug!("Command '{}' exited with {}", display, code);
    Ok(CommandOutput {
        code,
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr: String::from_utf8_lossy(&stderr).into_owned(),
    })
}

/// Copies `source` into a buffer, mirroring each chunk to `sink` when `stream` is set.
fn tee<R, W, S>(mut source: R, stream: bool, sink: S) -> io::Result<Vec<u8>>
where
    R: Read,
    W: Write,
    S: Fn() -> W,
{
    let mut captured = Vec::new();
    let mut chunk = [0_u8; 8192];
    loop {
        let read = source.read(&mut chunk)?;
        if read == 0 {
            break;
        }
        let bytes = chunk.get(..read).unwrap_or_default();
        captured.extend_from_slice(bytes);
        if stream {
            let mut out = sink();
            out.write_all(bytes)?;
            out.flush()?;
        }
    }
    Ok(captured)
}

fn join_reader(handle: Option<thread::JoinHandle<io::Result<Vec<u8>>>>) -> io::Result<Vec<u8>> {
    match handle {
        Some(handle) => handle
            .join()
            .unwrap_or_else(|_| Err(io::Error::other("output reader panicked"))),
        None => Ok(Vec::new()),
    }
}

#[cfg(unix)]
fn signal_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.signal().map_or(1, |signal| 128 + signal)
}

#[cfg(not(unix))]
fn signal_code(_status: &std::process::ExitStatus) -> i32 {
    1
}

// MARK: --- UNIT TESTS ---
