//! Lint and test pipeline.
//!
//! Runs every configured lint command, then every configured test command,
//! without stopping at the first failure, and reports the outcomes. The
//! `check` subcommand derives its exit code from the report.

use std::fmt;
use std::io::Write;
use std::time::Instant;

use camino::Utf8Path;
use serde::Serialize;

use crate::config::{Config, ConfigError};
use crate::error::Result;
use crate::output::{tail, write_stderr_line};
use crate::runner::{CommandRunner, CommandSpec};

/// Lines of stderr kept for a failed check.
const STDERR_TAIL_LINES: usize = 20;

/// Which check families to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckSelection {
    /// Lint commands, then test commands.
    #[default]
    All,
    /// Lint commands only.
    LintOnly,
    /// Test commands only.
    TestsOnly,
}

impl CheckSelection {
    fn describe(self) -> &'static str {
        match self {
            Self::All => "lint or test",
            Self::LintOnly => "lint",
            Self::TestsOnly => "test",
        }
    }

    const fn includes_lints(self) -> bool {
        matches!(self, Self::All | Self::LintOnly)
    }

    const fn includes_tests(self) -> bool {
        matches!(self, Self::All | Self::TestsOnly)
    }
}

/// Family a check command belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckKind {
    /// Static analysis and formatting.
    Lint,
    /// Test suites.
    Test,
}

impl CheckKind {
    /// Lowercase label for reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lint => "lint",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one check command.
#[derive(Debug, Clone, Serialize)]
pub struct CheckOutcome {
    /// Family the command belongs to.
    pub kind: CheckKind,
    /// Rendered command line.
    pub command: String,
    /// Whether the command succeeded.
    pub passed: bool,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u128,
    /// Diagnostic tail for failed commands.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr_tail: Option<String>,
}

/// Aggregated outcomes of a checks run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CheckReport {
    /// Outcomes in execution order.
    pub outcomes: Vec<CheckOutcome>,
}

impl CheckReport {
    /// Whether every check passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcomes.iter().all(|outcome| outcome.passed)
    }

    /// Number of failed checks.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.outcomes.iter().filter(|outcome| !outcome.passed).count()
    }

    /// Human-readable report, one line per check plus a summary.
    #[must_use]
    pub fn format_human(&self) -> String {
        let mut lines = Vec::with_capacity(self.outcomes.len() + 1);
        for outcome in &self.outcomes {
            let verdict = if outcome.passed { "PASS" } else { "FAIL" };
            lines.push(format!(
                "{:<4} {verdict}  {} ({} ms)",
                outcome.kind,
                outcome.command,
                outcome.duration_ms
            ));
            if let Some(diagnostics) = &outcome.stderr_tail {
                for line in diagnostics.lines() {
                    lines.push(format!("       {line}"));
                }
            }
        }
        let failed = self.failure_count();
        let passed = self.outcomes.len() - failed;
        lines.push(format!("{passed} check(s) passed, {failed} failed"));
        lines.join("\n")
    }

    /// Pretty JSON report.
    ///
    /// # Errors
    ///
    /// Returns an error when serialisation fails.
    pub fn format_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Run the selected checks, honouring the per-command timeout.
///
/// A failing command never stops the run; the remaining checks still
/// execute and the report carries every outcome. Commands that cannot be
/// spawned or time out are recorded as failures, not errors.
///
/// # Errors
///
/// Returns an error when the selection has no configured commands.
pub fn run_checks(
    config: &Config,
    runner: &dyn CommandRunner,
    selection: CheckSelection,
    root: &Utf8Path,
    quiet: bool,
    stderr: &mut dyn Write,
) -> Result<CheckReport> {
    let mut planned: Vec<(CheckKind, &Vec<String>)> = Vec::new();
    if selection.includes_lints() {
        planned.extend(config.checks.lint.iter().map(|argv| (CheckKind::Lint, argv)));
    }
    if selection.includes_tests() {
        planned.extend(config.checks.test.iter().map(|argv| (CheckKind::Test, argv)));
    }
    if planned.is_empty() {
        return Err(ConfigError::NoChecksConfigured {
            selection: selection.describe(),
        }
        .into());
    }

    let mut report = CheckReport::default();
    for (kind, argv) in planned {
        let spec = CommandSpec::from_argv(argv, Some(root), config.check_timeout())?;
        if !quiet {
            write_stderr_line(stderr, format!("Running {kind}: {}", spec.display_line()));
        }
        report.outcomes.push(run_one(runner, kind, &spec));
    }
    Ok(report)
}

fn run_one(runner: &dyn CommandRunner, kind: CheckKind, spec: &CommandSpec) -> CheckOutcome {
    let started = Instant::now();
    let (passed, stderr_tail) = match runner.run(spec) {
        Ok(output) if output.success => (true, None),
        Ok(output) => (false, tail(&output.stderr, STDERR_TAIL_LINES)),
        Err(error) => (false, Some(error.to_string())),
    };
    CheckOutcome {
        kind,
        command: spec.display_line(),
        passed,
        duration_ms: started.elapsed().as_millis(),
        stderr_tail,
    }
}
