use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::{debug, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// Exit code; `-1` when the process was terminated by a signal.
    Exited(i32),
    TimedOut,
}

/// Runs `program`, killing it once `timeout` elapses.
///
/// Bare program names are looked up on `PATH`. The child's stdout is sent to
/// our stderr so stdout only ever carries command output.
///
/// # Errors
///
/// Returns an error when the program cannot be spawned or waited on.
pub fn run_command_with_timeout(
    program: &Path,
    args: &[String],
    envs: &[(String, String)],
    timeout: Option<Duration>,
) -> Result<CommandOutcome> {
    let resolved = which::which(program)
        .with_context(|| format!("{} not found on PATH", program.display()))?;
    let mut command = Command::new(&resolved);
    command
        .args(args)
        .envs(envs.iter().map(|(k, v)| (k, v)))
        .stdin(Stdio::null())
        .stdout(io::stderr())
        .stderr(Stdio::inherit());
    debug!(program = %resolved.display(), ?args, "spawning");
    let mut child = command
        .spawn()
        .with_context(|| format!("failed to start {}", program.display()))?;

    let Some(timeout) = timeout else {
        let status = child
            .wait()
            .with_context(|| format!("failed to wait for {}", program.display()))?;
        return Ok(CommandOutcome::Exited(status.code().unwrap_or(-1)));
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child
            .try_wait()
            .with_context(|| format!("failed to poll {}", program.display()))?
        {
            return Ok(CommandOutcome::Exited(status.code().unwrap_or(-1)));
        }
        if Instant::now() >= deadline {
            warn!(program = %program.display(), ?timeout, "timed out; killing process");
            if let Err(err) = child.kill() {
                debug!(%err, "kill after timeout failed");
            }
            let _ = child.wait();
            return Ok(CommandOutcome::TimedOut);
        }
        thread::sleep(POLL_INTERVAL);
    }
}
