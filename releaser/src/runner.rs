//! External command execution with timeouts.
//!
//! [`CommandRunner`] is the seam between the pipelines and the operating
//! system. Production code spawns real processes with piped output and kills
//! them when their time limit expires; tests substitute a mock.

use std::process::{Command, Stdio};
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use wait_timeout::ChildExt;

/// Default time limit for build and check commands.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(600);

/// A fully described external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program to execute.
    pub program: String,
    /// Arguments passed to the program.
    pub args: Vec<String>,
    /// Working directory, when it differs from the current one.
    pub cwd: Option<Utf8PathBuf>,
    /// Time limit before the process is killed.
    pub timeout: Duration,
}

impl CommandSpec {
    /// Build a spec from an argv-style list.
    ///
    /// # Errors
    ///
    /// Returns [`RunnerError::EmptyCommand`] when the list has no program.
    pub fn from_argv(
        argv: &[String],
        cwd: Option<&Utf8Path>,
        timeout: Duration,
    ) -> Result<Self, RunnerError> {
        let (program, args) = argv.split_first().ok_or(RunnerError::EmptyCommand)?;
        if program.is_empty() {
            return Err(RunnerError::EmptyCommand);
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
            cwd: cwd.map(Utf8Path::to_path_buf),
            timeout,
        })
    }

    /// Rendered command line for reports and error messages.
    #[must_use]
    pub fn display_line(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// Captured result of a completed command.
#[derive(Debug, Clone, Default)]
pub struct RunOutput {
    /// Whether the process exited successfully.
    pub success: bool,
    /// Captured standard output.
    pub stdout: String,
    /// Captured standard error.
    pub stderr: String,
}

/// Errors raised while spawning or waiting on a command.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// A configured command list had no program.
    #[error("command is empty")]
    EmptyCommand,

    /// The program could not be spawned.
    #[error("failed to run `{program}`: {source}")]
    SpawnFailed {
        /// Program that failed to start.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Waiting on the process failed.
    #[error("failed waiting on `{program}`: {source}")]
    WaitFailed {
        /// Program that was being awaited.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The process exceeded its time limit and was killed.
    #[error("`{program}` timed out after {seconds} seconds")]
    TimedOut {
        /// Program that was killed.
        program: String,
        /// Limit that was exceeded, in seconds.
        seconds: u64,
    },

    /// Reading the captured output failed.
    #[error("failed to read output of `{program}`: {source}")]
    OutputUnreadable {
        /// Program whose output could not be read.
        program: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Abstraction for running external commands.
#[cfg_attr(test, mockall::automock)]
pub trait CommandRunner {
    /// Run the command to completion, enforcing its timeout.
    ///
    /// # Errors
    ///
    /// Returns an error when the process cannot be spawned, exceeds its time
    /// limit, or its output cannot be collected. A non-zero exit is not an
    /// error; callers inspect [`RunOutput::success`].
    fn run(&self, spec: &CommandSpec) -> Result<RunOutput, RunnerError>;
}

/// Runner that spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunOutput, RunnerError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir.as_std_path());
        }

        let mut child = command.spawn().map_err(|source| RunnerError::SpawnFailed {
            program: spec.program.clone(),
            source,
        })?;

        let status = child
            .wait_timeout(spec.timeout)
            .map_err(|source| RunnerError::WaitFailed {
                program: spec.program.clone(),
                source,
            })?;

        match status {
            Some(status) => {
                let stdout = read_pipe(child.stdout.take(), spec)?;
                let stderr = read_pipe(child.stderr.take(), spec)?;
                Ok(RunOutput {
                    success: status.success(),
                    stdout,
                    stderr,
                })
            }
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(RunnerError::TimedOut {
                    program: spec.program.clone(),
                    seconds: spec.timeout.as_secs(),
                })
            }
        }
    }
}

fn read_pipe<R: std::io::Read>(pipe: Option<R>, spec: &CommandSpec) -> Result<String, RunnerError> {
    pipe.map(std::io::read_to_string)
        .transpose()
        .map_err(|source| RunnerError::OutputUnreadable {
            program: spec.program.clone(),
            source,
        })
        .map(Option::unwrap_or_default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn spec(argv: &[&str]) -> CommandSpec {
        let argv: Vec<String> = argv.iter().map(ToString::to_string).collect();
        CommandSpec::from_argv(&argv, None, DEFAULT_COMMAND_TIMEOUT).expect("valid argv")
    }

    #[rstest]
    #[case::bare(&["true"], "true")]
    #[case::with_args(&["git", "rev-parse", "HEAD"], "git rev-parse HEAD")]
    fn display_line_renders_the_argv(#[case] argv: &[&str], #[case] expected: &str) {
        assert_eq!(spec(argv).display_line(), expected);
    }

    #[test]
    fn empty_argv_is_rejected() {
        let result = CommandSpec::from_argv(&[], None, DEFAULT_COMMAND_TIMEOUT);
        assert!(matches!(result, Err(RunnerError::EmptyCommand)));
    }

    #[test]
    fn blank_program_is_rejected() {
        let argv = vec![String::new()];
        let result = CommandSpec::from_argv(&argv, None, DEFAULT_COMMAND_TIMEOUT);
        assert!(matches!(result, Err(RunnerError::EmptyCommand)));
    }

    #[test]
    fn captures_stdout_of_a_successful_command() {
        let output = SystemRunner
            .run(&spec(&["sh", "-c", "echo out; echo err >&2"]))
            .expect("command runs");
        assert!(output.success);
        assert_eq!(output.stdout, "out\n");
        assert_eq!(output.stderr, "err\n");
    }

    #[test]
    fn reports_failure_exits_without_error() {
        let output = SystemRunner
            .run(&spec(&["sh", "-c", "exit 3"]))
            .expect("command runs");
        assert!(!output.success);
    }

    #[test]
    fn missing_programs_fail_to_spawn() {
        let result = SystemRunner.run(&spec(&["slipway-no-such-program"]));
        assert!(matches!(result, Err(RunnerError::SpawnFailed { .. })));
    }

    #[test]
    fn slow_commands_are_killed() {
        let mut slow = spec(&["sleep", "5"]);
        slow.timeout = Duration::from_millis(100);
        let result = SystemRunner.run(&slow);
        assert!(matches!(result, Err(RunnerError::TimedOut { .. })));
    }

    #[test]
    fn honours_the_working_directory() {
        let temp = tempfile::tempdir().expect("temp dir");
        let dir = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8 path");
        let mut pwd = spec(&["pwd"]);
        pwd.cwd = Some(dir.clone());
        let output = SystemRunner.run(&pwd).expect("command runs");
        assert!(output.stdout.trim_end().ends_with(dir.file_name().expect("dir name")));
    }
}
