//! Test-run types shared by the orchestrator, the HTTP gateway and the web panel.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ValidationError;

/// Which suites a test run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestTarget {
    Rag,
    Ai,
    Ui,
    All,
}

impl TestTarget {
    /// Suites covered by this target, in execution order.
    pub fn suites(self) -> &'static [TestSuite] {
        match self {
            Self::Rag => &[TestSuite::Rag],
            Self::Ai => &[TestSuite::Ai],
            Self::Ui => &[TestSuite::Ui],
            Self::All => &[TestSuite::Rag, TestSuite::Ai, TestSuite::Ui],
        }
    }

    /// Wire name of the target.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rag => "rag",
            Self::Ai => "ai",
            Self::Ui => "ui",
            Self::All => "all",
        }
    }
}

impl std::fmt::Display for TestTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TestTarget {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rag" => Ok(Self::Rag),
            "ai" => Ok(Self::Ai),
            "ui" => Ok(Self::Ui),
            "all" => Ok(Self::All),
            other => Err(ValidationError::InvalidBody(format!(
                "unknown target: {other}"
            ))),
        }
    }
}

/// One row of the fixed suite table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TestSuite {
    Rag,
    Ai,
    Ui,
}

/// A single command to run in a working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestStep {
    pub command: String,
    pub working_dir: PathBuf,
    /// Command substituted when the primary tool is unavailable.
    pub fallback: Option<String>,
}

impl TestStep {
    /// Program name of the primary command (its first token).
    pub fn program(&self) -> &str {
        self.command.split_whitespace().next().unwrap_or("")
    }
}

/// Outcome of one external command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Combined outcome of a whole test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateReport {
    /// `true` iff every step's final exit code was zero.
    pub success: bool,
    pub combined_output: String,
}

/// Body of `POST /api/tests`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunRequest {
    pub target: TestTarget,
}

impl TestRunRequest {
    /// Parses a raw body; anything but a known target is rejected.
    pub fn parse(raw: &[u8]) -> Result<Self, ValidationError> {
        serde_json::from_slice(raw).map_err(|e| ValidationError::InvalidBody(e.to_string()))
    }
}

/// Response body of a completed test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestRunResponse {
    pub ok: bool,
    pub output: String,
}

impl From<AggregateReport> for TestRunResponse {
    fn from(report: AggregateReport) -> Self {
        Self {
            ok: report.success,
            output: report.combined_output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_targets_cover_one_suite() {
        assert_eq!(TestTarget::Rag.suites(), &[TestSuite::Rag]);
        assert_eq!(TestTarget::Ai.suites(), &[TestSuite::Ai]);
        assert_eq!(TestTarget::Ui.suites(), &[TestSuite::Ui]);
    }

    #[test]
    fn all_target_runs_rag_ai_ui_in_order() {
        assert_eq!(
            TestTarget::All.suites(),
            &[TestSuite::Rag, TestSuite::Ai, TestSuite::Ui]
        );
    }

    #[test]
    fn target_parses_from_str_and_display_round_trips() {
        for target in [TestTarget::Rag, TestTarget::Ai, TestTarget::Ui, TestTarget::All] {
            assert_eq!(target.to_string().parse::<TestTarget>().unwrap(), target);
        }
        assert!("RAG".parse::<TestTarget>().is_err());
    }

    #[test]
    fn run_request_accepts_known_targets() {
        let req = TestRunRequest::parse(br#"{"target":"all"}"#).unwrap();
        assert_eq!(req.target, TestTarget::All);
    }

    #[test]
    fn run_request_rejects_unknown_or_missing_target() {
        for raw in [
            &br#"{"target":"rag; rm -rf /"}"#[..],
            br#"{"target":"unit"}"#,
            br#"{}"#,
            br#"{"target":null}"#,
            b"garbage",
        ] {
            let err = TestRunRequest::parse(raw).expect_err("must reject");
            assert_eq!(err.to_string(), "Invalid body");
        }
    }

    #[test]
    fn step_program_is_first_token() {
        let mut step = TestStep {
            command: "uv run -q pytest -vv".to_string(),
            working_dir: PathBuf::from("/tmp"),
            fallback: Some("pytest -vv".to_string()),
        };
        assert_eq!(step.program(), "uv");

        step.command = "   ".to_string();
        assert_eq!(step.program(), "");
    }

    #[test]
    fn response_mirrors_report() {
        let resp = TestRunResponse::from(AggregateReport {
            success: false,
            combined_output: "out".to_string(),
        });
        assert!(!resp.ok);
        assert_eq!(resp.output, "out");
    }
}
