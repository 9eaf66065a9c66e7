//! Test failure reporting from `.xcresult` bundles.
//!
//! Prints one GitHub error annotation per failed assertion so failures show up
//! inline on the PR, followed by a plain-text summary for the job log.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::build_errors::LOG_DIR;
use crate::github::error_annotation;
use crate::toolchain::Toolchain;

/// Longest failure message printed, ellipsis included.
pub const MAX_MESSAGE_CHARS: usize = 500;

const SUMMARY_RULE_WIDTH: usize = 60;

/// Node types that contribute a segment to the test path.
const PATH_NODE_TYPES: [&str; 4] = [
    "Unit test bundle",
    "UI test bundle",
    "Test Suite",
    "Test Case",
];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResults {
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub test_nodes: Vec<TestNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: Option<String>,
    #[serde(default = "unknown_device")]
    pub device_name: String,
    #[serde(default)]
    pub os_version: String,
}

fn unknown_device() -> String {
    "Unknown Device".to_string()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestNode {
    #[serde(default)]
    pub node_type: String,
    #[serde(default)]
    pub name: String,
    pub details: Option<String>,
    #[serde(default)]
    pub children: Vec<TestNode>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestFailure {
    /// Bundle, suite and case names from the root down.
    pub path: Vec<String>,
    pub message: String,
    pub device: Option<String>,
}

impl TestFailure {
    pub fn identifier(&self) -> String {
        self.path.join("/")
    }

    pub fn annotation(&self) -> String {
        let message = truncate_message(&self.message);
        let body = match &self.device {
            Some(device) => format!("[{device}] {message}"),
            None => message,
        };
        error_annotation(&self.identifier(), &body)
    }
}

/// `deviceId -> "name (os)"`, or just the name when the OS version is empty.
pub fn device_map(devices: &[Device]) -> HashMap<String, String> {
    devices
        .iter()
        .filter_map(|d| {
            let id = d.device_id.as_ref().filter(|id| !id.is_empty())?;
            let label = if d.os_version.is_empty() {
                d.device_name.clone()
            } else {
                format!("{} ({})", d.device_name, d.os_version)
            };
            Some((id.clone(), label))
        })
        .collect()
}

/// Collect failures below `node`. Failure messages outside any test path are dropped.
pub fn extract_failures(node: &TestNode) -> Vec<TestFailure> {
    let mut failures = Vec::new();
    walk(node, &[], None, &mut failures);
    failures
}

fn walk(node: &TestNode, path: &[String], device: Option<&str>, out: &mut Vec<TestFailure>) {
    let device = if node.node_type == "Device" {
        Some(node.name.as_str())
    } else {
        device
    };

    let mut extended;
    let path = if PATH_NODE_TYPES.contains(&node.node_type.as_str()) {
        extended = path.to_vec();
        extended.push(node.name.clone());
        extended.as_slice()
    } else {
        path
    };

    if node.node_type == "Failure Message" && !path.is_empty() {
        out.push(TestFailure {
            path: path.to_vec(),
            message: node.details.clone().unwrap_or_else(|| node.name.clone()),
            device: device.filter(|d| !d.is_empty()).map(str::to_string),
        });
    }

    for child in &node.children {
        walk(child, path, device, out);
    }
}

/// All failures in `results`, with device ids replaced by display names.
pub fn failures_from_results(results: &TestResults) -> Vec<TestFailure> {
    let devices = device_map(&results.devices);
    let mut failures: Vec<TestFailure> = results
        .test_nodes
        .iter()
        .flat_map(extract_failures)
        .collect();
    for failure in &mut failures {
        if let Some(device) = &failure.device
            && let Some(label) = devices.get(device)
        {
            failure.device = Some(label.clone());
        }
    }
    failures
}

/// Cut `message` to [`MAX_MESSAGE_CHARS`] characters, ending in `...` when shortened.
pub fn truncate_message(message: &str) -> String {
    if message.chars().count() <= MAX_MESSAGE_CHARS {
        return message.to_string();
    }
    let mut out: String = message.chars().take(MAX_MESSAGE_CHARS - 3).collect();
    out.push_str("...");
    out
}

/// Plain-text summary block; empty when there are no failures.
pub fn render_summary(failures: &[TestFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let rule = "=".repeat(SUMMARY_RULE_WIDTH);
    let mut out = String::new();
    let _ = writeln!(out, "\n{rule}\nTEST FAILURES SUMMARY\n{rule}");
    for (i, failure) in failures.iter().enumerate() {
        let _ = writeln!(out, "\n{}. {}", i + 1, failure.identifier());
        if let Some(device) = &failure.device {
            let _ = writeln!(out, "   Device: {device}");
        }
        let _ = writeln!(out, "   Message: {}", truncate_message(&failure.message));
    }
    let _ = writeln!(out, "\n{rule}\nTotal failures: {}\n{rule}\n", failures.len());
    out
}

/// Failures recorded in one bundle. Tool failures and bad JSON are warnings.
#[instrument(skip_all, fields(bundle = %bundle.display()))]
pub fn bundle_failures<T: Toolchain>(toolchain: &T, bundle: &Path) -> Vec<TestFailure> {
    let path = bundle.to_string_lossy();
    let raw = match toolchain.xcresulttool(&["get", "test-results", "tests", "--path", &*path]) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "failed to get test results");
            return Vec::new();
        }
    };
    match serde_json::from_slice::<TestResults>(&raw) {
        Ok(results) => failures_from_results(&results),
        Err(err) => {
            warn!(err = %err, "failed to parse test results JSON");
            Vec::new()
        }
    }
}

/// Bundles to inspect: an explicit existing `.xcresult`, else every bundle in `log/`.
pub fn bundles_to_scan(workdir: &Path, explicit: Option<&Path>) -> Result<Vec<PathBuf>> {
    if let Some(path) = explicit
        && path.extension().is_some_and(|e| e == "xcresult")
    {
        if path.exists() {
            return Ok(vec![path.to_path_buf()]);
        }
        debug!(path = %path.display(), "result bundle does not exist");
        return Ok(Vec::new());
    }

    let log_dir = workdir.join(LOG_DIR);
    if !log_dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut bundles: Vec<PathBuf> = fs::read_dir(&log_dir)
        .with_context(|| format!("read {}", log_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.extension().is_some_and(|e| e == "xcresult"))
        .collect();
    bundles.sort();
    Ok(bundles)
}

/// Annotations followed by the summary. Empty when no test failed.
pub fn render_report(failures: &[TestFailure]) -> String {
    if failures.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    for failure in failures {
        let _ = writeln!(out, "{}", failure.annotation());
    }
    out.push_str(&render_summary(failures));
    out
}

/// Gather failures from the selected bundles.
pub fn collect_failures<T: Toolchain>(
    toolchain: &T,
    workdir: &Path,
    explicit: Option<&Path>,
) -> Result<Vec<TestFailure>> {
    let bundles = bundles_to_scan(workdir, explicit)?;
    debug!(bundles = bundles.len(), "scanning result bundles");
    Ok(bundles
        .iter()
        .flat_map(|bundle| bundle_failures(toolchain, bundle))
        .collect())
}
