//! Test-suite orchestration across the sibling services.
//!
//! A [`TestTarget`] is resolved against a fixed [`SuiteTable`] into ordered
//! [`TestStep`]s. Steps run one after another through a [`CommandRunner`] and
//! every result is folded into a single [`AggregateReport`]. A failing step
//! never stops the run.

use proto::{AggregateReport, CommandResult, TestStep, TestSuite, TestTarget};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::CommandRunner;

/// Default bound for a single step.
pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(180);

/// Default phrases that mark a tool as unavailable.
pub const DEFAULT_MISSING_TOOL_PATTERNS: &[&str] = &[
    "not found",
    "not recognized",
    "não encontrado",
    "não é reconhecido",
    "no se reconoce",
];

/// Command configuration of one suite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteSpec {
    /// Directory relative to the table's base directory (or absolute).
    pub dir: PathBuf,
    pub command: String,
    pub fallback: Option<String>,
}

impl SuiteSpec {
    pub fn new(dir: impl Into<PathBuf>, command: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            command: command.into(),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = Some(fallback.into());
        self
    }
}

/// Fixed mapping from suite to command and working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuiteTable {
    base_dir: PathBuf,
    rag: SuiteSpec,
    ai: SuiteSpec,
    ui: SuiteSpec,
}

impl SuiteTable {
    /// Builds a table with explicit suite entries.
    pub fn new(base_dir: impl Into<PathBuf>, rag: SuiteSpec, ai: SuiteSpec, ui: SuiteSpec) -> Self {
        Self {
            base_dir: base_dir.into(),
            rag,
            ai,
            ui,
        }
    }

    /// Standard layout: Python services one level up, the UI in `base_dir` itself.
    pub fn with_defaults(base_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            base_dir,
            SuiteSpec::new("../rag", "uv run -q pytest -vv").with_fallback("pytest -vv"),
            SuiteSpec::new("../ai", "uv run -q pytest -vv").with_fallback("pytest -vv"),
            SuiteSpec::new(".", "pnpm test"),
        )
    }

    pub fn spec(&self, suite: TestSuite) -> &SuiteSpec {
        match suite {
            TestSuite::Rag => &self.rag,
            TestSuite::Ai => &self.ai,
            TestSuite::Ui => &self.ui,
        }
    }

    /// Resolves a target into its ordered steps.
    pub fn steps(&self, target: TestTarget) -> Vec<TestStep> {
        target
            .suites()
            .iter()
            .map(|&suite| {
                let spec = self.spec(suite);
                TestStep {
                    command: spec.command.clone(),
                    working_dir: resolve_dir(&self.base_dir, &spec.dir),
                    fallback: spec.fallback.clone(),
                }
            })
            .collect()
    }
}

/// Joins `dir` onto `base` and folds `.`/`..` components lexically.
fn resolve_dir(base: &Path, dir: &Path) -> PathBuf {
    use std::path::Component;

    let mut out = PathBuf::new();
    for component in base.join(dir).components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_relative_top = matches!(
                    out.components().next_back(),
                    None | Some(Component::ParentDir)
                );
                if at_relative_top {
                    out.push("..");
                } else {
                    out.pop();
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Decides whether a failed step's stderr reports its tool as unavailable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolMissingMatcher {
    patterns: Vec<String>,
}

impl ToolMissingMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            patterns: patterns
                .into_iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// `true` when stderr names `program` and contains one of the phrases.
    pub fn matches(&self, program: &str, stderr: &str) -> bool {
        if program.is_empty() {
            return false;
        }
        let stderr = stderr.to_lowercase();
        stderr.contains(&program.to_lowercase())
            && self.patterns.iter().any(|p| stderr.contains(p.as_str()))
    }
}

impl Default for ToolMissingMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_MISSING_TOOL_PATTERNS)
    }
}

/// Runs test targets and folds their results into one report.
pub struct TestOrchestrator {
    runner: Arc<dyn CommandRunner>,
    table: SuiteTable,
    matcher: ToolMissingMatcher,
    step_timeout: Duration,
}

impl TestOrchestrator {
    pub fn new(runner: Arc<dyn CommandRunner>, table: SuiteTable) -> Self {
        Self {
            runner,
            table,
            matcher: ToolMissingMatcher::default(),
            step_timeout: DEFAULT_STEP_TIMEOUT,
        }
    }

    pub fn with_matcher(mut self, matcher: ToolMissingMatcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_step_timeout(mut self, step_timeout: Duration) -> Self {
        self.step_timeout = step_timeout;
        self
    }

    pub fn table(&self) -> &SuiteTable {
        &self.table
    }

    /// Runs every step of `target` in order and reports the aggregate.
    pub async fn run_tests(&self, target: TestTarget) -> AggregateReport {
        let steps = self.table.steps(target);
        info!(test_target = %target, steps = steps.len(), "Test run starting");

        let mut report = ReportBuilder::default();
        for step in &steps {
            self.run_step(step, &mut report).await;
        }

        let report = report.finish();
        info!(test_target = %target, success = report.success, "Test run finished");
        report
    }

    async fn run_step(&self, step: &TestStep, report: &mut ReportBuilder) {
        report.header(step);
        let mut result = self
            .runner
            .run(&step.command, &step.working_dir, self.step_timeout)
            .await;

        if let Some(fallback) = &step.fallback
            && !result.success()
            && self.matcher.matches(step.program(), &result.stderr)
        {
            warn!(
                program = step.program(),
                fallback = %fallback,
                dir = %step.working_dir.display(),
                "Tool unavailable, running fallback"
            );
            report.fallback_note(step.program(), fallback);
            result = self
                .runner
                .run(fallback, &step.working_dir, self.step_timeout)
                .await;
        }

        if !result.success() {
            warn!(
                command = %step.command,
                exit_code = result.exit_code,
                "Test step failed"
            );
        }
        report.result(&result);
    }
}

/// Accumulates the combined output of a run, step by step.
#[derive(Debug)]
struct ReportBuilder {
    output: String,
    success: bool,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self {
            output: String::new(),
            success: true,
        }
    }
}

impl ReportBuilder {
    fn header(&mut self, step: &TestStep) {
        self.output.push_str(&format!(
            "cwd: {}\n> {}\n",
            step.working_dir.display(),
            step.command
        ));
    }

    fn fallback_note(&mut self, program: &str, fallback: &str) {
        self.output
            .push_str(&format!("{program} não disponível, tentando: {fallback}\n"));
    }

    fn result(&mut self, result: &CommandResult) {
        self.output.push_str(&result.stdout);
        if !result.stderr.is_empty() {
            self.output
                .push_str(&format!("\n[stderr]\n{}\n", result.stderr));
        }
        self.output
            .push_str(&format!("\n(exit code: {})\n\n", result.exit_code));
        self.success &= result.success();
    }

    fn finish(self) -> AggregateReport {
        AggregateReport {
            success: self.success,
            combined_output: self.output.trim().to_string(),
        }
    }
}
