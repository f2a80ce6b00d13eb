//! Centralized command execution with consistent error handling.
//!
//! Every external tool (buildah, podman, rpm, ldd) is described by a [`Cmd`]
//! and handed to an [`Executor`]. [`System`] runs commands for real or, in
//! dry-run mode, only prints them.

use std::fmt;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use crate::error::{Error, Result};

/// Result of a command execution.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub status: ExitStatus,
    /// Captured stdout (empty for streamed commands).
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    /// A successful result with the given stdout, for dry runs and fakes.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: ExitStatus::from_raw(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Get the exit code, or -1 if terminated by signal.
    pub fn code(&self) -> i32 {
        self.status.code().unwrap_or(-1)
    }

    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }
}

/// How the child's stdout/stderr are wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// Capture into the [`CommandResult`].
    Capture,
    /// Inherit the terminal (long-running builds).
    Stream,
    /// Discard (best-effort cleanup commands).
    Quiet,
}

/// Builder for configuring command execution.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    current_dir: Option<PathBuf>,
    /// If true, don't fail on non-zero exit.
    allow_fail: bool,
    output: Output,
}

impl Cmd {
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            program: program.as_ref().to_string(),
            args: Vec::new(),
            current_dir: None,
            allow_fail: false,
            output: Output::Capture,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.args.push(arg.as_ref().to_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_string());
        }
        self
    }

    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    pub fn dir(mut self, dir: &Path) -> Self {
        self.current_dir = Some(dir.to_path_buf());
        self
    }

    /// Allow non-zero exit codes without failing.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    /// Inherit stdio so the user sees progress.
    pub fn stream(mut self) -> Self {
        self.output = Output::Stream;
        self
    }

    /// Best-effort: discard output and ignore the exit code.
    pub fn quiet(mut self) -> Self {
        self.output = Output::Quiet;
        self.allow_fail = true;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn get_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    pub fn is_allow_fail(&self) -> bool {
        self.allow_fail
    }

    /// Run the command on the host.
    pub fn run(&self) -> Result<CommandResult> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);

        if let Some(ref dir) = self.current_dir {
            cmd.current_dir(dir);
        }

        let spawn_error = |e: std::io::Error| Error::ExternalTool {
            command: self.to_string(),
            code: -1,
            stderr: format!("failed to execute '{}': {}. Is it installed?", self.program, e),
        };

        let result = match self.output {
            Output::Capture => {
                let output = cmd.output().map_err(spawn_error)?;
                CommandResult {
                    status: output.status,
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                }
            }
            Output::Stream | Output::Quiet => {
                let stdio = || {
                    if self.output == Output::Quiet {
                        Stdio::null()
                    } else {
                        Stdio::inherit()
                    }
                };
                cmd.stdin(Stdio::inherit());
                cmd.stdout(stdio());
                cmd.stderr(stdio());
                let status = cmd.status().map_err(spawn_error)?;
                CommandResult {
                    status,
                    stdout: String::new(),
                    stderr: String::new(),
                }
            }
        };

        if !self.allow_fail && !result.success() {
            return Err(Error::ExternalTool {
                command: self.to_string(),
                code: result.code(),
                stderr: result.stderr.clone(),
            });
        }

        Ok(result)
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Something that can carry out a [`Cmd`].
pub trait Executor {
    fn execute(&self, cmd: Cmd) -> Result<CommandResult>;
}

/// Executes commands on the host, or prints them in dry-run mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct System {
    pub dry_run: bool,
}

impl System {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }
}

impl Executor for System {
    fn execute(&self, cmd: Cmd) -> Result<CommandResult> {
        if self.dry_run {
            match cmd.get_dir() {
                Some(dir) => println!("  [dry-run] ({}) {}", dir.display(), cmd),
                None => println!("  [dry-run] {}", cmd),
            }
            return Ok(CommandResult::ok(""));
        }
        cmd.run()
    }
}

/// Check if a program exists in PATH.
pub fn which(program: &str) -> Option<PathBuf> {
    which::which(program).ok()
}
