//! Shell command runner.

use async_trait::async_trait;
use proto::CommandResult;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::CommandRunner;

/// Exit code reported when the command exceeded its time bound.
pub const TIMEOUT_EXIT_CODE: i32 = 124;
/// Exit code reported when the shell could not be spawned.
pub const SPAWN_FAILURE_EXIT_CODE: i32 = 127;
/// Exit code reported when the process ended without one (killed by signal).
pub const NO_EXIT_CODE: i32 = -1;

const MAX_OUTPUT_CHARS: usize = 200_000;

/// Runs commands through `bash -c`, inheriting the current environment.
pub struct ShellRunner {
    shell: String,
}

impl ShellRunner {
    /// Creates a runner that uses `bash`.
    pub fn new() -> Self {
        Self {
            shell: "bash".to_string(),
        }
    }

    /// Creates a runner that uses a custom shell binary (must accept `-c`).
    pub fn with_shell(shell: impl Into<String>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str, working_dir: &Path, limit: Duration) -> CommandResult {
        debug!(command, dir = %working_dir.display(), "Running command");

        let mut cmd = Command::new(&self.shell);
        cmd.arg("-c")
            .arg(command)
            .current_dir(working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(command, dir = %working_dir.display(), "Spawn failed: {e}");
                return CommandResult::new(
                    SPAWN_FAILURE_EXIT_CODE,
                    "",
                    format!("failed to spawn `{command}`: {e}"),
                );
            }
        };
        let group = child.id();

        let outcome = timeout(limit, child.wait_with_output()).await;
        // Whatever the shell forked belongs to this step and must not outlive it.
        kill_process_group(group);

        match outcome {
            Ok(Ok(output)) => {
                let stdout = truncate_str(&String::from_utf8_lossy(&output.stdout), MAX_OUTPUT_CHARS);
                let stderr = truncate_str(&String::from_utf8_lossy(&output.stderr), MAX_OUTPUT_CHARS);
                let exit_code = output.status.code().unwrap_or(NO_EXIT_CODE);
                debug!(command, exit_code, "Command finished");
                CommandResult::new(exit_code, stdout, stderr)
            }
            Ok(Err(e)) => CommandResult::new(
                NO_EXIT_CODE,
                "",
                format!("failed to collect output of `{command}`: {e}"),
            ),
            Err(_) => {
                warn!(command, limit = ?limit, "Command timed out");
                CommandResult::new(
                    TIMEOUT_EXIT_CODE,
                    "",
                    format!("command timed out after {limit:?}"),
                )
            }
        }
    }
}

/// Sends SIGKILL to every process left in the step's process group.
#[cfg(unix)]
fn kill_process_group(leader: Option<u32>) {
    use nix::errno::Errno;
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    let Some(pgid) = leader.and_then(|pid| i32::try_from(pid).ok()) else {
        return;
    };
    match killpg(Pid::from_raw(pgid), Signal::SIGKILL) {
        Ok(()) => debug!(pgid, "Killed leftover processes of step"),
        Err(Errno::ESRCH) => {}
        Err(e) => warn!(pgid, "Failed to kill process group: {e}"),
    }
}

#[cfg(not(unix))]
fn kill_process_group(_leader: Option<u32>) {}

/// Truncates UTF-8 text to `max_chars` code points and appends a suffix when truncated.
fn truncate_str(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars).collect();
        format!("{truncated}\n[... output truncated at {max_chars} chars]")
    }
}
