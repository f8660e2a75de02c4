//! External process invocation.
//!
//! Every external tool (`pveam`, `chroot`, `tar`, compressors) goes through a
//! [`CommandRunner`], so pipeline stages can be exercised with a fake runner
//! and so that tolerated failures are decided by the caller's
//! [`Tolerance`] rather than ad-hoc `|| true`.

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};

use ctforge_common::error::{ForgeError, Result};

/// How a non-zero exit status is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tolerance {
    /// Failure aborts the pipeline.
    #[default]
    Fatal,
    /// Failure is logged and execution continues.
    Tolerated,
}

/// Description of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandSpec {
    /// Executable name or path.
    pub program: String,
    /// Arguments, not shell-interpreted.
    pub args: Vec<String>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
    /// Start from an empty environment instead of inheriting ours.
    pub clear_env: bool,
    /// Capture stdout/stderr instead of streaming them to the terminal.
    pub capture: bool,
    /// Failure handling.
    pub tolerance: Tolerance,
}

impl CommandSpec {
    /// Creates a fatal, streaming command with no arguments.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Appends one argument.
    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Sets an environment variable for the child.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Clears the inherited environment.
    #[must_use]
    pub const fn clear_env(mut self) -> Self {
        self.clear_env = true;
        self
    }

    /// Captures output instead of streaming it.
    #[must_use]
    pub const fn capture(mut self) -> Self {
        self.capture = true;
        self
    }

    /// Marks the command's failure as non-fatal.
    #[must_use]
    pub const fn tolerated(mut self) -> Self {
        self.tolerance = Tolerance::Tolerated;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Output from a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Captured standard output (empty when streamed).
    pub stdout: String,
    /// Captured standard error (empty when streamed).
    pub stderr: String,
    /// Exit code, `None` if killed by a signal.
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    /// Whether the command exited with status zero.
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.exit_code, Some(0))
    }

    /// Human-readable exit status.
    #[must_use]
    pub fn status_text(&self) -> String {
        self.exit_code.map_or_else(
            || "terminated by signal".to_string(),
            |code| format!("exit code {code}"),
        )
    }
}

/// Executes external commands.
pub trait CommandRunner {
    /// Runs `spec` to completion and returns its output, whatever the exit
    /// status.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process could not be spawned.
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Runs `spec` and applies its [`Tolerance`].
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::CommandFailed`] when a fatal command exits
    /// unsuccessfully.
    fn execute(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let output = self.run(spec)?;
        if output.success() {
            return Ok(output);
        }
        match spec.tolerance {
            Tolerance::Tolerated => {
                tracing::warn!(command = %spec, status = %output.status_text(), "tolerated command failure");
                Ok(output)
            }
            Tolerance::Fatal => Err(ForgeError::CommandFailed {
                command: spec.to_string(),
                status: output.status_text(),
            }),
        }
    }

    /// Runs `producer | consumer` with the consumer's stdout written to
    /// `out`, waiting for both.
    ///
    /// # Errors
    ///
    /// Returns an error if `out` cannot be created or either process could
    /// not be spawned. Runners without pipe support return
    /// [`ForgeError::Config`].
    fn pipe(
        &self,
        producer: &CommandSpec,
        consumer: &CommandSpec,
        out: &Path,
    ) -> Result<(CommandOutput, CommandOutput)> {
        let _ = (consumer, out);
        Err(ForgeError::Config {
            message: format!("runner cannot pipe `{producer}`"),
        })
    }

    /// Runs a pipe and applies each side's [`Tolerance`].
    ///
    /// # Errors
    ///
    /// Returns [`ForgeError::CommandFailed`] for the first fatal command
    /// that exits unsuccessfully.
    fn execute_pipe(&self, producer: &CommandSpec, consumer: &CommandSpec, out: &Path) -> Result<()> {
        let (upstream, downstream) = self.pipe(producer, consumer, out)?;
        for (spec, output) in [(producer, &upstream), (consumer, &downstream)] {
            if !output.success() && spec.tolerance == Tolerance::Fatal {
                return Err(ForgeError::CommandFailed {
                    command: spec.to_string(),
                    status: output.status_text(),
                });
            }
        }
        Ok(())
    }
}

/// Runner backed by [`std::process::Command`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(spec: &CommandSpec) -> Command {
        let mut command = Command::new(&spec.program);
        let _ = command.args(&spec.args);
        if spec.clear_env {
            let _ = command.env_clear();
        }
        let _ = command.envs(spec.env.iter().map(|(k, v)| (k, v)));
        command
    }

    fn status_only(status: ExitStatus) -> CommandOutput {
        CommandOutput {
            exit_code: status.code(),
            ..CommandOutput::default()
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        tracing::debug!(command = %spec, "running command");
        let mut command = Self::command(spec);

        let spawn_err = |e| ForgeError::io(&spec.program, e);
        if spec.capture {
            let output = command.stdin(Stdio::null()).output().map_err(spawn_err)?;
            Ok(CommandOutput {
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                exit_code: output.status.code(),
            })
        } else {
            let status = command.status().map_err(spawn_err)?;
            Ok(Self::status_only(status))
        }
    }

    fn pipe(
        &self,
        producer: &CommandSpec,
        consumer: &CommandSpec,
        out: &Path,
    ) -> Result<(CommandOutput, CommandOutput)> {
        tracing::debug!(%producer, %consumer, out = %out.display(), "running pipe");
        let file = File::create(out).map_err(|e| ForgeError::io(out, e))?;

        let mut upstream = Self::command(producer)
            .stdout(Stdio::piped())
            .spawn()
            .map_err(|e| ForgeError::io(&producer.program, e))?;
        let Some(upstream_stdout) = upstream.stdout.take() else {
            let _ = upstream.kill();
            let _ = upstream.wait();
            return Err(ForgeError::Config {
                message: format!("stdout of `{producer}` was not captured"),
            });
        };

        // The consumer owns the only read end, so a failed spawn lets the
        // producer exit on SIGPIPE before it is reaped below.
        let downstream = Self::command(consumer)
            .stdin(Stdio::from(upstream_stdout))
            .stdout(Stdio::from(file))
            .status();
        let upstream = upstream
            .wait()
            .map_err(|e| ForgeError::io(&producer.program, e))?;
        let downstream = downstream.map_err(|e| ForgeError::io(&consumer.program, e))?;
        Ok((Self::status_only(upstream), Self::status_only(downstream)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_renders_program_and_args() {
        let spec = CommandSpec::new("pveam").args(["available", "--section", "system"]);
        assert_eq!(spec.to_string(), "pveam available --section system");
    }

    #[test]
    fn builder_defaults_to_fatal_streaming() {
        let spec = CommandSpec::new("tar");
        assert_eq!(spec.tolerance, Tolerance::Fatal);
        assert!(!spec.capture);
        assert!(!spec.clear_env);
    }

    #[test]
    fn system_runner_captures_stdout() {
        let spec = CommandSpec::new("sh").args(["-c", "echo hello"]).capture();
        let output = SystemRunner.execute(&spec).expect("run sh");
        assert_eq!(output.stdout.trim(), "hello");
        assert!(output.success());
    }

    #[test]
    fn fatal_failure_is_an_error() {
        let spec = CommandSpec::new("sh").args(["-c", "exit 3"]).capture();
        let err = SystemRunner.execute(&spec).expect_err("exit 3 is fatal");
        assert!(matches!(err, ForgeError::CommandFailed { .. }));
    }

    #[test]
    fn tolerated_failure_returns_output() {
        let spec = CommandSpec::new("sh")
            .args(["-c", "exit 3"])
            .capture()
            .tolerated();
        let output = SystemRunner.execute(&spec).expect("tolerated");
        assert_eq!(output.exit_code, Some(3));
    }

    #[test]
    fn clear_env_drops_inherited_variables() {
        let spec = CommandSpec::new("/bin/sh")
            .args(["-c", "echo \"${HOME:-unset}:$FOO\""])
            .clear_env()
            .env("FOO", "bar")
            .capture();
        let output = SystemRunner.execute(&spec).expect("run sh");
        assert_eq!(output.stdout.trim(), "unset:bar");
    }

    #[test]
    fn system_runner_pipes_into_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out.txt");
        let producer = CommandSpec::new("sh").args(["-c", "echo hello"]);
        let consumer = CommandSpec::new("tr").args(["a-z", "A-Z"]);
        SystemRunner
            .execute_pipe(&producer, &consumer, &out)
            .expect("pipe");
        assert_eq!(std::fs::read_to_string(&out).expect("read"), "HELLO\n");
    }

    #[test]
    fn failed_producer_fails_pipe() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out.txt");
        let producer = CommandSpec::new("sh").args(["-c", "exit 2"]);
        let consumer = CommandSpec::new("cat");
        let err = SystemRunner
            .execute_pipe(&producer, &consumer, &out)
            .expect_err("producer failed");
        assert!(matches!(err, ForgeError::CommandFailed { ref command, .. } if command.starts_with("sh ")));
        assert!(err.to_string().contains("exit code 2"));
    }

    #[test]
    fn runners_without_pipe_support_refuse() {
        struct Inert;
        impl CommandRunner for Inert {
            fn run(&self, _spec: &CommandSpec) -> Result<CommandOutput> {
                Ok(CommandOutput::default())
            }
        }
        let out = Path::new("/nonexistent/out");
        let result = Inert.pipe(&CommandSpec::new("tar"), &CommandSpec::new("xz"), out);
        assert!(matches!(result, Err(ForgeError::Config { .. })));
    }

    #[test]
    fn missing_program_is_spawn_error() {
        let spec = CommandSpec::new("definitely_not_a_real_command_12345").capture();
        assert!(matches!(
            SystemRunner.run(&spec),
            Err(ForgeError::Io { .. })
        ));
    }
}
