//! Tuist cache reset.

use std::path::{Path, PathBuf};

use tracing::{info, instrument, warn};

use crate::derived_data::remove_best_effort;
use crate::toolchain::Toolchain;

/// Regeneration steps, run in order until one fails.
const REGENERATE_STEPS: [&[&str]; 3] = [&["install"], &["cache"], &["generate", "--no-open"]];

/// Caches removed before regenerating.
pub fn tuist_cache_dirs(workdir: &Path, home: &Path) -> [PathBuf; 2] {
    [
        home.join(".cache").join("tuist"),
        workdir.join("Tuist").join(".build"),
    ]
}

/// Remove the global and project Tuist caches, then reinstall, warm and regenerate.
///
/// Returns whether every regeneration step succeeded. A failing step stops the
/// sequence with a warning.
#[instrument(skip_all, fields(workdir = %workdir.display()))]
pub fn reset_tuist_cache<T: Toolchain>(toolchain: &T, workdir: &Path, home: &Path) -> bool {
    for dir in tuist_cache_dirs(workdir, home) {
        if !remove_best_effort(&dir) {
            info!(path = %dir.display(), "tuist cache not present");
        }
    }

    info!("regenerating tuist cache");
    for args in REGENERATE_STEPS {
        if let Err(err) = toolchain.run_tool(workdir, "tuist", args) {
            warn!(err = %format!("{err:#}"), "tuist step failed, stopping regeneration");
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::toolchain::scripted::ScriptedToolchain;

    #[test]
    fn clears_caches_and_runs_all_steps() {
        let temp = tempfile::tempdir().expect("tempdir");
        let home = temp.path().join("home");
        let workdir = temp.path().join("repo");
        let [global, project] = tuist_cache_dirs(&workdir, &home);
        fs::create_dir_all(global.join("Binaries")).expect("global");
        fs::create_dir_all(&project).expect("project");
        let toolchain = ScriptedToolchain::default();

        assert!(reset_tuist_cache(&toolchain, &workdir, &home));

        assert!(!global.exists());
        assert!(!project.exists());
        assert_eq!(
            *toolchain.tool_calls.borrow(),
            vec!["tuist install", "tuist cache", "tuist generate --no-open"]
        );
    }

    #[test]
    fn failing_step_stops_the_sequence() {
        let temp = tempfile::tempdir().expect("tempdir");
        let toolchain = ScriptedToolchain {
            failing_tools: vec!["tuist".to_string()],
            ..ScriptedToolchain::default()
        };

        assert!(!reset_tuist_cache(&toolchain, temp.path(), temp.path()));
        assert_eq!(*toolchain.tool_calls.borrow(), vec!["tuist install"]);
    }
}
