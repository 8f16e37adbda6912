use anyhow::{Context, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

/// Default limit for commands handed to the OS shell.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How a line handed to the OS shell ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShellOutcome {
    Finished { stdout: String, stderr: String },
    TimedOut,
}

impl ShellOutcome {
    /// Render the outcome as shell output text.
    pub fn render(&self) -> String {
        match self {
            ShellOutcome::Finished { stdout, stderr } => {
                let mut output = stdout.clone();
                if !stderr.is_empty() {
                    output.push_str("\nError: ");
                    output.push_str(stderr);
                }
                if output.is_empty() {
                    "Command executed successfully".to_string()
                } else {
                    output
                }
            }
            ShellOutcome::TimedOut => "Command timed out".to_string(),
        }
    }
}

fn shell_command(line: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", line]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", line]);
        cmd
    }
}

/// Run `line` through the platform shell in `cwd`, killing it after `timeout`.
///
/// The deadline also covers collecting output: a background job that keeps
/// the pipes open after the shell exits (`sleep 100 & echo hi`) still ends in
/// [`ShellOutcome::TimedOut`]. Errors are reserved for failing to launch the
/// shell at all.
pub fn run_shell(line: &str, cwd: &Path, timeout: Duration) -> Result<ShellOutcome> {
    let mut child = shell_command(line)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("failed to spawn shell")?;

    // Pipes are drained concurrently so a chatty child never blocks on a full buffer.
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());
    let deadline = Instant::now() + timeout;

    if !wait_until(&mut child, deadline)? {
        // kill can fail if the child exited in the meantime; either way reap it
        let _ = child.kill();
        let _ = child.wait();
        tracing::warn!(%line, ?timeout, "shell command timed out");
        return Ok(ShellOutcome::TimedOut);
    }

    let (Some(stdout), Some(stderr)) = (collect(stdout, deadline), collect(stderr, deadline))
    else {
        tracing::warn!(%line, ?timeout, "shell exited but its output stayed open");
        return Ok(ShellOutcome::TimedOut);
    };
    Ok(ShellOutcome::Finished { stdout, stderr })
}

/// Returns `false` if the deadline passed before the child exited.
fn wait_until(child: &mut Child, deadline: Instant) -> Result<bool> {
    loop {
        if let Some(status) = child.try_wait().context("failed to wait for shell")? {
            tracing::debug!(?status, "shell command finished");
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Read `pipe` to the end on a helper thread, delivering the text once EOF is seen.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<String>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            // the receiver is gone if the deadline already passed
            let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
        });
        rx
    })
}

/// `None` if the pipe is still open at `deadline`.
fn collect(rx: Option<Receiver<String>>, deadline: Instant) -> Option<String> {
    let Some(rx) = rx else {
        return Some(String::new());
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    match rx.recv_timeout(remaining) {
        Ok(text) => Some(text),
        Err(mpsc::RecvTimeoutError::Disconnected) => Some(String::new()),
        Err(mpsc::RecvTimeoutError::Timeout) => None,
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_stdout_and_stderr_are_combined() {
        let dir = TempDir::new().unwrap();
        let outcome = run_shell("echo out; echo err 1>&2", dir.path(), DEFAULT_TIMEOUT).unwrap();
        assert_eq!(outcome.render(), "out\n\nError: err\n");
    }

    #[test]
    fn test_runs_in_given_directory() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let outcome = run_shell("ls", dir.path(), DEFAULT_TIMEOUT).unwrap();
        assert!(outcome.render().contains("marker.txt"));
    }

    #[test]
    fn test_silent_command_reports_success() {
        let dir = TempDir::new().unwrap();
        let outcome = run_shell("true", dir.path(), DEFAULT_TIMEOUT).unwrap();
        assert_eq!(outcome.render(), "Command executed successfully");
    }

    #[test]
    fn test_timeout_is_reported_as_text() {
        let dir = TempDir::new().unwrap();
        let started = Instant::now();
        let outcome = run_shell("sleep 5", dir.path(), Duration::from_millis(200)).unwrap();
        assert_eq!(outcome, ShellOutcome::TimedOut);
        assert_eq!(outcome.render(), "Command timed out");
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_background_job_holding_pipes_times_out() {
        let dir = TempDir::new().unwrap();
        let started = Instant::now();
        let outcome = run_shell("sleep 5 & echo hi", dir.path(), Duration::from_millis(200)).unwrap();
        assert_eq!(outcome, ShellOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
