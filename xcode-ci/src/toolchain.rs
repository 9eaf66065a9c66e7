//! Adapter for the Apple command-line tools this crate shells out to.
//!
//! Everything that touches `defaults`, `xcodebuild`, `xcrun` or `tuist` goes
//! through [`Toolchain`], so the cleaning and reporting logic can be tested
//! with a scripted implementation on any platform.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use tracing::{debug, instrument, warn};
use wait_timeout::ChildExt;

/// Timeout for `xcresulttool` queries.
pub const XCRESULT_TIMEOUT: Duration = Duration::from_secs(60);
/// Timeout for `xcodebuild -showBuildSettings`.
pub const BUILD_SETTINGS_TIMEOUT: Duration = Duration::from_secs(120);
/// Timeout for each `tuist` step.
pub const TUIST_TIMEOUT: Duration = Duration::from_secs(30 * 60);
/// Bytes kept from each of stdout/stderr. Legacy xcresult JSON for large UI
/// test runs reaches tens of megabytes.
pub const OUTPUT_LIMIT_BYTES: usize = 64 * 1024 * 1024;

pub trait Toolchain {
    /// Xcode's custom DerivedData location, if the user configured one.
    fn custom_derived_data_location(&self) -> Option<PathBuf>;

    /// Raw `xcodebuild -showBuildSettings` output for the project in `workdir`.
    fn build_settings(&self, workdir: &Path) -> Result<String>;

    /// Stdout of `xcrun xcresulttool <args>`.
    fn xcresulttool(&self, args: &[&str]) -> Result<Vec<u8>>;

    /// Run `program args` in `workdir`; `Err` on spawn failure, non-zero exit or timeout.
    fn run_tool(&self, workdir: &Path, program: &str, args: &[&str]) -> Result<()>;
}

/// The real tools on `PATH`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemToolchain;

impl Toolchain for SystemToolchain {
    fn custom_derived_data_location(&self) -> Option<PathBuf> {
        let mut cmd = Command::new("defaults");
        cmd.args(["read", "com.apple.dt.Xcode", "IDECustomDerivedDataLocation"]);
        // The key is absent on most machines; `defaults` then exits non-zero.
        let out = run_with_timeout(cmd, Duration::from_secs(10), OUTPUT_LIMIT_BYTES).ok()?;
        if !out.status.success() {
            return None;
        }
        let value = String::from_utf8_lossy(&out.stdout).trim().to_string();
        (!value.is_empty()).then(|| PathBuf::from(value))
    }

    #[instrument(skip_all, fields(workdir = %workdir.display()))]
    fn build_settings(&self, workdir: &Path) -> Result<String> {
        let mut cmd = Command::new("xcodebuild");
        cmd.arg("-showBuildSettings").current_dir(workdir);
        let out = checked(cmd, BUILD_SETTINGS_TIMEOUT, "xcodebuild -showBuildSettings")?;
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }

    #[instrument(skip_all)]
    fn xcresulttool(&self, args: &[&str]) -> Result<Vec<u8>> {
        let mut cmd = Command::new("xcrun");
        cmd.arg("xcresulttool").args(args);
        let label = format!("xcrun xcresulttool {}", args.join(" "));
        Ok(checked(cmd, XCRESULT_TIMEOUT, &label)?.stdout)
    }

    #[instrument(skip_all, fields(program))]
    fn run_tool(&self, workdir: &Path, program: &str, args: &[&str]) -> Result<()> {
        let mut cmd = Command::new(program);
        cmd.args(args).current_dir(workdir);
        let label = format!("{program} {}", args.join(" "));
        checked(cmd, TUIST_TIMEOUT, &label)?;
        Ok(())
    }
}

struct Captured {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    /// Stdout bytes dropped past the limit.
    stdout_truncated: usize,
}

/// Run `cmd` and require a zero exit with complete stdout.
fn checked(cmd: Command, timeout: Duration, label: &str) -> Result<Captured> {
    let out = run_with_timeout(cmd, timeout, OUTPUT_LIMIT_BYTES)
        .with_context(|| format!("run {label}"))?;
    if !out.status.success() {
        bail!(
            "{label} failed with status {:?}: {}",
            out.status.code(),
            String::from_utf8_lossy(&out.stderr).trim()
        );
    }
    if out.stdout_truncated > 0 {
        bail!(
            "{label} printed more than {OUTPUT_LIMIT_BYTES} bytes ({} dropped)",
            out.stdout_truncated
        );
    }
    Ok(out)
}

/// Spawn `cmd`, drain stdout/stderr on reader threads keeping at most `limit`
/// bytes of each, and kill it after `timeout`.
fn run_with_timeout(mut cmd: Command, timeout: Duration, limit: usize) -> Result<Captured> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    let program = cmd.get_program().to_string_lossy().into_owned();
    debug!(program = %program, "spawning");
    let mut child = cmd
        .spawn()
        .with_context(|| format!("spawn {program}"))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, limit));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, limit));

    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                program = %program,
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            child.kill().context("kill command")?;
            child.wait().context("wait command after kill")?;
            bail!("{program} timed out after {}s", timeout.as_secs());
        }
    };

    let (stdout, stdout_truncated) = stdout_handle
        .join()
        .map_err(|_| anyhow!("stdout reader thread panicked"))?
        .context("read stdout")?;
    let (stderr, _) = stderr_handle
        .join()
        .map_err(|_| anyhow!("stderr reader thread panicked"))?
        .context("read stderr")?;
    if stdout_truncated > 0 {
        warn!(program = %program, stdout_truncated, "output truncated");
    }

    Ok(Captured {
        status,
        stdout,
        stderr,
        stdout_truncated,
    })
}

/// Read `reader` to EOF, keeping the first `limit` bytes and counting the rest.
fn read_stream_limited<R: Read>(
    mut reader: R,
    limit: usize,
) -> std::io::Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        let keep = n.min(limit.saturating_sub(buf.len()));
        buf.extend_from_slice(&chunk[..keep]);
        dropped += n - keep;
    }
    Ok((buf, dropped))
}
