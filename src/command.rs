//! Bounded external command execution
//!
//! `xinput` and `gsettings` are invoked as short-lived subprocesses. Both are
//! expected to finish in milliseconds; a hung tool must not stall the engine
//! loop, so every invocation runs under a hard deadline.

use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Deadline for a single external command
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll interval while waiting for the child to exit
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Run an external command and capture its stdout.
///
/// Returns `Some(stdout)` only when the command spawned, exited within
/// [`COMMAND_TIMEOUT`] and reported success. Everything else (missing
/// binary, non-zero exit, deadline exceeded) degrades to `None` after a
/// logged warning, never an error.
pub fn run_command(program: &str, args: &[&str]) -> Option<String> {
    run_command_with_timeout(program, args, COMMAND_TIMEOUT)
}

/// [`run_command`] with an explicit deadline.
pub fn run_command_with_timeout(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Option<String> {
    let mut child = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(child) => child,
        Err(e) => {
            tracing::warn!(program, error = %e, "Failed to spawn command");
            return None;
        }
    };

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                if !status.success() {
                    tracing::debug!(program, ?args, %status, "Command exited non-zero");
                    return None;
                }
                let mut stdout = String::new();
                if let Some(mut out) = child.stdout.take() {
                    use std::io::Read;
                    if let Err(e) = out.read_to_string(&mut stdout) {
                        tracing::warn!(program, error = %e, "Failed to read command output");
                        return None;
                    }
                }
                return Some(stdout);
            }
            Ok(None) => {
                if start.elapsed() >= timeout {
                    tracing::warn!(
                        program,
                        ?args,
                        timeout_ms = timeout.as_millis() as u64,
                        "Command deadline exceeded, killing"
                    );
                    let _ = child.kill();
                    let _ = child.wait();
                    return None;
                }
                std::thread::sleep(WAIT_POLL_INTERVAL);
            }
            Err(e) => {
                tracing::warn!(program, error = %e, "Failed to wait for command");
                let _ = child.kill();
                let _ = child.wait();
                return None;
            }
        }
    }
}
