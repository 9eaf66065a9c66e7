//! Child processes with a timeout and bounded captured output.
//!
//! Both `gh` and the agent run through [`run_command`]. Output is drained on
//! reader threads while the child runs, so a chatty agent cannot deadlock on a
//! full pipe.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// Captured child process output.
#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes of stdout discarded past the output limit.
    pub stdout_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    /// True if the child exited with status 0 before the timeout.
    pub fn succeeded(&self) -> bool {
        !self.timed_out && self.status.success()
    }

    pub fn stdout_text(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Limits applied to one child process.
#[derive(Debug, Clone, Copy)]
pub struct CommandLimits {
    pub timeout: Duration,
    /// Maximum bytes kept from each of stdout/stderr.
    pub output_limit_bytes: usize,
}

/// Run `cmd`, optionally feeding `stdin`, and capture its output.
///
/// Returns `Err` only when the process cannot be spawned or waited on. A
/// non-zero exit or a timeout is reported through the returned
/// [`CommandOutput`] so callers decide whether it matters.
#[instrument(skip_all, fields(timeout_secs = limits.timeout.as_secs(), output_limit_bytes = limits.output_limit_bytes))]
pub fn run_command(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    limits: CommandLimits,
) -> Result<CommandOutput> {
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    let program = cmd.get_program().to_string_lossy().into_owned();
    debug!(program = %program, "spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(program = %program, err = %e, "failed to spawn command");
            return Err(e).with_context(|| format!("spawn {program}"));
        }
    };

    if let Some(input) = stdin {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        child_stdin.write_all(input).context("write stdin")?;
        // Dropping the handle closes the pipe so the child sees EOF.
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let limit = limits.output_limit_bytes;
    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, limit));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, limit));

    let mut timed_out = false;
    let status = match child
        .wait_timeout(limits.timeout)
        .with_context(|| format!("wait for {program}"))?
    {
        Some(status) => status,
        None => {
            warn!(
                program = %program,
                timeout_secs = limits.timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            child.kill().with_context(|| format!("kill {program}"))?;
            child
                .wait()
                .with_context(|| format!("wait {program} after kill"))?
        }
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(
            program = %program,
            stdout_truncated, stderr_truncated, "output truncated"
        );
    }

    debug!(program = %program, exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        timed_out,
    })
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_stream_limited_keeps_prefix_and_counts_rest() {
        let data = vec![b'a'; 20_000];
        let (kept, truncated) = read_stream_limited(&data[..], 10_000).expect("read");
        assert_eq!(kept.len(), 10_000);
        assert_eq!(truncated, 10_000);
    }

    #[cfg(unix)]
    #[test]
    fn captures_stdout_and_feeds_stdin() {
        let cmd = Command::new("cat");
        let out = run_command(
            cmd,
            Some(b"hello"),
            CommandLimits {
                timeout: Duration::from_secs(10),
                output_limit_bytes: 1_000,
            },
        )
        .expect("run cat");
        assert!(out.succeeded());
        assert_eq!(out.stdout_text(), "hello");
    }

    #[cfg(unix)]
    #[test]
    fn non_zero_exit_is_reported_not_raised() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("echo oops >&2; exit 3");
        let out = run_command(
            cmd,
            None,
            CommandLimits {
                timeout: Duration::from_secs(10),
                output_limit_bytes: 1_000,
            },
        )
        .expect("run sh");
        assert!(!out.succeeded());
        assert_eq!(out.status.code(), Some(3));
        assert_eq!(out.stderr_text(), "oops");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let cmd = Command::new("definitely-not-a-real-binary-7f3a");
        let err = run_command(
            cmd,
            None,
            CommandLimits {
                timeout: Duration::from_secs(1),
                output_limit_bytes: 100,
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("spawn"));
    }
}
