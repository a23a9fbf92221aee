//! Command execution and test-suite orchestration.
//!
//! The gateway and the CLI use this crate to run the fixed test commands of
//! the sibling services and fold their output into one report.

pub mod runner;
pub mod suite;

pub use runner::ShellRunner;
pub use suite::{SuiteSpec, SuiteTable, TestOrchestrator, ToolMissingMatcher};

use async_trait::async_trait;
use proto::CommandResult;
use std::path::Path;
use std::time::Duration;

/// Executes one external command.
///
/// Implementations never fail outward: spawn errors and timeouts come back as
/// a nonzero [`CommandResult`] with the reason on stderr.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs `command` in `working_dir`, bounded by `timeout`.
    async fn run(&self, command: &str, working_dir: &Path, timeout: Duration) -> CommandResult;
}
