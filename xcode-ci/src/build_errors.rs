//! Transient build failure detection and remediation.
//!
//! Scans `log/` for build logs and result bundles, looks for failures known to
//! go away on a clean rebuild, applies the matching fix and asks the workflow
//! to retry by setting `RETRY_BUILD=true` in `$GITHUB_ENV`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::derived_data::{CleanPaths, Locator, clear_derived_data};
use crate::github::append_env;
use crate::toolchain::Toolchain;
use crate::tuist::reset_tuist_cache;

pub const CLEAR_DERIVED_DATA_ERRORS: &[&str] = &["ld: symbol(s) not found"];

pub const CLEAR_TUIST_CACHE_ERRORS: &[&str] =
    &["Underlying Error: Crash", "Failed to load the test bundle"];

pub const RETRY_ERRORS: &[&str] = &[
    "The Xcode build system has crashed",
    "Command CodeSign failed with a nonzero exit code",
    "The test runner failed to initialize for UI testing",
    "Segmentation fault",
    "error: stat",
];

/// Directory (relative to the working directory) holding build logs and result bundles.
pub const LOG_DIR: &str = "log";

/// Remediation for a recognised failure, carrying the matched pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildErrorAction {
    ClearDerivedData(&'static str),
    ClearTuistCache(&'static str),
    Retry(&'static str),
}

impl BuildErrorAction {
    pub fn pattern(self) -> &'static str {
        match self {
            Self::ClearDerivedData(p) | Self::ClearTuistCache(p) | Self::Retry(p) => p,
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Self::ClearDerivedData(_) => "Found error that requires cleaning derived data",
            Self::ClearTuistCache(_) => "Found error that requires clearing tuist cache",
            Self::Retry(_) => "Found build error that requires retry",
        }
    }
}

/// Classify one message. Derived data patterns win over tuist, tuist over retry.
pub fn classify(message: &str) -> Option<BuildErrorAction> {
    let find = |patterns: &'static [&'static str]| {
        patterns.iter().copied().find(|p| message.contains(p))
    };
    find(CLEAR_DERIVED_DATA_ERRORS)
        .map(BuildErrorAction::ClearDerivedData)
        .or_else(|| find(CLEAR_TUIST_CACHE_ERRORS).map(BuildErrorAction::ClearTuistCache))
        .or_else(|| find(RETRY_ERRORS).map(BuildErrorAction::Retry))
}

/// First actionable message, in order.
pub fn first_action<S: AsRef<str>>(messages: &[S]) -> Option<BuildErrorAction> {
    messages.iter().find_map(|m| classify(m.as_ref()))
}

/// Error summaries from a result bundle's legacy JSON. Any failure yields none.
pub fn xcresult_error_messages<T: Toolchain>(toolchain: &T, bundle: &Path) -> Vec<String> {
    let path = bundle.to_string_lossy();
    let args = ["get", "--format", "json", "--path", &*path, "--legacy"];
    let raw = match toolchain.xcresulttool(&args) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(bundle = %path, err = %format!("{err:#}"), "cannot read result bundle");
            return Vec::new();
        }
    };
    let json: Value = match serde_json::from_slice(&raw) {
        Ok(json) => json,
        Err(err) => {
            warn!(bundle = %path, err = %err, "result bundle JSON is invalid");
            return Vec::new();
        }
    };
    let Some(summaries) = json
        .pointer("/issues/errorSummaries/_values")
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };
    summaries
        .iter()
        .filter_map(|s| s.pointer("/message/_value").and_then(Value::as_str))
        .inspect(|msg| info!(bundle = %path, error = %msg, "found error in result bundle"))
        .map(str::to_string)
        .collect()
}

/// Messages from every `*.log` (whole file) and `*.xcresult` in `log_dir`, sorted by file name.
pub fn collect_messages<T: Toolchain>(toolchain: &T, log_dir: &Path) -> Result<Vec<String>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(log_dir)
        .with_context(|| format!("read {}", log_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    let mut messages = Vec::new();
    for path in entries {
        match path.extension().and_then(|e| e.to_str()) {
            Some("log") => match fs::read(&path) {
                Ok(bytes) => messages.push(String::from_utf8_lossy(&bytes).into_owned()),
                Err(err) => warn!(path = %path.display(), err = %err, "cannot read log"),
            },
            Some("xcresult") => messages.extend(xcresult_error_messages(toolchain, &path)),
            _ => debug!(path = %path.display(), "ignoring"),
        }
    }
    Ok(messages)
}

/// Where the checker runs and reports.
#[derive(Debug, Clone)]
pub struct CheckEnv {
    pub paths: CleanPaths,
    /// Workflow env file (`$GITHUB_ENV`), if running under Actions.
    pub github_env: Option<PathBuf>,
}

/// Scan `log/`, apply the first matching remediation and flag a retry.
///
/// Returns the action taken, or `None` if `log/` is missing or nothing matched.
#[instrument(skip_all, fields(workdir = %env.paths.workdir.display()))]
pub fn check_build_errors<T: Toolchain>(
    toolchain: &T,
    env: &CheckEnv,
) -> Result<Option<BuildErrorAction>> {
    let log_dir = env.paths.workdir.join(LOG_DIR);
    if !log_dir.is_dir() {
        println!(
            "Error: '{LOG_DIR}' directory not found in {}",
            env.paths.workdir.display()
        );
        return Ok(None);
    }

    let messages = collect_messages(toolchain, &log_dir)?;
    let Some(action) = first_action(&messages) else {
        info!(messages = messages.len(), "no retryable build errors");
        return Ok(None);
    };
    println!("{}: {}", action.describe(), action.pattern());

    match action {
        BuildErrorAction::ClearDerivedData(_) => {
            if let Err(err) = clear_derived_data(toolchain, &env.paths, Locator::ProjectName) {
                warn!(err = %format!("{err:#}"), "clearing derived data failed");
            }
        }
        BuildErrorAction::ClearTuistCache(_) => {
            reset_tuist_cache(toolchain, &env.paths.workdir, &env.paths.home);
        }
        BuildErrorAction::Retry(_) => {}
    }

    match &env.github_env {
        Some(env_file) => append_env(env_file, "RETRY_BUILD", "true")?,
        None => info!("GITHUB_ENV not set, retry flag not written"),
    }
    Ok(Some(action))
}
