//! CLI command implementations.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::info;

use crate::build_errors::{CheckEnv, check_build_errors};
use crate::derived_data::{CleanPaths, Locator, clear_derived_data};
use crate::test_failures::{collect_failures, render_report};
use crate::toolchain::Toolchain;

/// Working directory and home directory for a command.
pub fn resolve_paths(workdir: Option<PathBuf>) -> Result<CleanPaths> {
    let workdir = match workdir {
        Some(dir) => dir,
        None => std::env::current_dir().context("resolve current directory")?,
    };
    let home = dirs::home_dir().context("cannot determine home directory")?;
    Ok(CleanPaths { workdir, home })
}

pub fn clear_derived_data_cmd<T: Toolchain>(
    toolchain: &T,
    paths: &CleanPaths,
    locator: Locator,
) -> Result<()> {
    let report = clear_derived_data(toolchain, paths, locator)?;
    println!(
        "clear-derived-data: project={} root={} removed={}",
        report.project.as_deref().unwrap_or("-"),
        report.derived_data_root.display(),
        report.removed.len()
    );
    for path in &report.removed {
        println!("clear-derived-data: removed {}", path.display());
    }
    Ok(())
}

pub fn check_build_errors_cmd<T: Toolchain>(
    toolchain: &T,
    paths: CleanPaths,
    github_env: Option<PathBuf>,
) -> Result<()> {
    let env = CheckEnv { paths, github_env };
    if let Some(action) = check_build_errors(toolchain, &env)? {
        info!(?action, "retry requested");
    }
    Ok(())
}

pub fn show_test_failures_cmd<T: Toolchain>(
    toolchain: &T,
    workdir: &Path,
    bundle: Option<&Path>,
) -> Result<()> {
    let failures = collect_failures(toolchain, workdir, bundle)?;
    print!("{}", render_report(&failures));
    Ok(())
}
