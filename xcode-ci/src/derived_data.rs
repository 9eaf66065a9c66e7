//! DerivedData and package-cache cleaning.
//!
//! Forces the next build to resolve packages and compile from scratch. Every
//! deletion is best-effort: a missing target is not an error and a failed
//! removal is only logged. Nothing is backed up.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::toolchain::Toolchain;

/// Extensions that identify the project at the top of the working directory,
/// in lookup order.
const PROJECT_EXTENSIONS: [&str; 2] = ["xcodeproj", "xcworkspace"];

/// How to find the project's DerivedData folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Locator {
    /// `<root>/<Project>-<hash>` under the DerivedData root.
    #[default]
    ProjectName,
    /// Ask `xcodebuild -showBuildSettings` for `BUILD_DIR`, falling back to
    /// [`Locator::ProjectName`] if that fails.
    BuildSettings,
}

/// Directories the cleaner works relative to.
#[derive(Debug, Clone)]
pub struct CleanPaths {
    /// Directory containing the Xcode project.
    pub workdir: PathBuf,
    /// User home (for the default DerivedData root and SwiftPM cache).
    pub home: PathBuf,
}

impl CleanPaths {
    /// Default DerivedData root under the user's home.
    pub fn default_derived_data_root(&self) -> PathBuf {
        self.home
            .join("Library")
            .join("Developer")
            .join("Xcode")
            .join("DerivedData")
    }

    /// Global SwiftPM cache.
    pub fn swiftpm_cache(&self) -> PathBuf {
        self.home
            .join("Library")
            .join("Caches")
            .join("org.swift.swiftpm")
    }

    /// `Package.resolved` locations to delete for `project` (if known).
    pub fn package_resolved_files(&self, project: Option<&str>) -> Vec<PathBuf> {
        let mut files = vec![self.workdir.join("Package.resolved")];
        if let Some(name) = project {
            let swiftpm = Path::new("xcshareddata")
                .join("swiftpm")
                .join("Package.resolved");
            files.push(self.workdir.join(format!("{name}.xcworkspace")).join(&swiftpm));
            files.push(
                self.workdir
                    .join(format!("{name}.xcodeproj"))
                    .join("project.xcworkspace")
                    .join(&swiftpm),
            );
        }
        files
    }
}

/// What a clean run found and removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub project: Option<String>,
    pub derived_data_root: PathBuf,
    /// Paths that existed and were deleted, in deletion order.
    pub removed: Vec<PathBuf>,
}

/// Name of the first `*.xcodeproj` (then `*.xcworkspace`) in `workdir`, without extension.
pub fn find_project_name(workdir: &Path) -> Result<Option<String>> {
    let mut entries: Vec<PathBuf> = fs::read_dir(workdir)
        .with_context(|| format!("read {}", workdir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .collect();
    entries.sort();

    for ext in PROJECT_EXTENSIONS {
        let found = entries
            .iter()
            .find(|path| path.extension().is_some_and(|e| e == ext))
            .and_then(|path| path.file_stem())
            .map(|stem| stem.to_string_lossy().into_owned());
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

/// Where Xcode keeps DerivedData for this user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedDataRoot {
    pub path: PathBuf,
    /// Set from Xcode preferences rather than the default location.
    pub custom: bool,
}

/// Custom DerivedData location from Xcode preferences, else the default.
pub fn derived_data_root<T: Toolchain>(toolchain: &T, paths: &CleanPaths) -> DerivedDataRoot {
    match toolchain.custom_derived_data_location() {
        Some(custom) => {
            debug!(path = %custom.display(), "using custom DerivedData location");
            DerivedDataRoot {
                path: custom,
                custom: true,
            }
        }
        None => DerivedDataRoot {
            path: paths.default_derived_data_root(),
            custom: false,
        },
    }
}

/// First directory in `root` whose name starts with `<project>-`.
pub fn find_project_derived_data(root: &Path, project: &str) -> Result<Option<PathBuf>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("read {}", root.display())),
    };
    let prefix = format!("{project}-");
    let mut matches: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(&prefix))
        .map(|entry| entry.path())
        .collect();
    matches.sort();
    Ok(matches.into_iter().next())
}

/// Value of `key` in `xcodebuild -showBuildSettings` output.
pub fn parse_build_setting(output: &str, key: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let (name, value) = line.split_once(" = ")?;
        (name.trim() == key).then(|| value.trim().to_string())
    })
}

/// DerivedData folder owning `build_dir` (`<folder>/Build/Products`).
///
/// Returns `None` when `BUILD_DIR` does not have that shape, e.g. when the
/// project sets a custom `SYMROOT`.
pub fn derived_data_from_build_dir(build_dir: &Path) -> Option<PathBuf> {
    if build_dir.file_name()? != "Products" {
        return None;
    }
    let build = build_dir.parent()?;
    if build.file_name()? != "Build" {
        return None;
    }
    build.parent().map(Path::to_path_buf)
}

fn canonical(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

/// Reason `folder` must not be deleted as the project's DerivedData folder.
///
/// The working directory and its ancestors are always refused, as is the root
/// itself. Unless the root is custom, the folder must sit inside it.
pub fn rejected_build_folder(
    folder: &Path,
    workdir: &Path,
    root: &DerivedDataRoot,
    project: Option<&str>,
) -> Option<&'static str> {
    let folder = canonical(folder);
    let root_path = canonical(&root.path);
    if canonical(workdir).starts_with(&folder) {
        return Some("contains the working directory");
    }
    if folder == root_path {
        return Some("is the DerivedData root itself");
    }
    if let Some(name) = project {
        let prefix = format!("{name}-");
        let named = folder
            .file_name()
            .is_some_and(|f| f.to_string_lossy().starts_with(&prefix));
        if !named {
            return Some("is not named after the project");
        }
    }
    if !root.custom && !folder.starts_with(&root_path) {
        return Some("is outside the DerivedData root");
    }
    None
}

fn folder_from_build_settings<T: Toolchain>(
    toolchain: &T,
    paths: &CleanPaths,
    root: &DerivedDataRoot,
    project: Option<&str>,
) -> Option<PathBuf> {
    let output = match toolchain.build_settings(&paths.workdir) {
        Ok(output) => output,
        Err(err) => {
            warn!(err = %format!("{err:#}"), "build settings query failed");
            return None;
        }
    };
    let Some(folder) = parse_build_setting(&output, "BUILD_DIR")
        .and_then(|dir| derived_data_from_build_dir(Path::new(&dir)))
    else {
        warn!("BUILD_DIR does not end in Build/Products");
        return None;
    };
    if let Some(reason) = rejected_build_folder(&folder, &paths.workdir, root, project) {
        warn!(folder = %folder.display(), reason, "refusing folder derived from BUILD_DIR");
        return None;
    }
    Some(folder)
}

fn locate_project_folder<T: Toolchain>(
    toolchain: &T,
    paths: &CleanPaths,
    root: &DerivedDataRoot,
    project: Option<&str>,
    locator: Locator,
) -> Result<Option<PathBuf>> {
    if locator == Locator::BuildSettings {
        match folder_from_build_settings(toolchain, paths, root, project) {
            Some(folder) => return Ok(Some(folder)),
            None => info!("falling back to project name lookup"),
        }
    }
    match project {
        Some(name) => find_project_derived_data(&root.path, name),
        None => Ok(None),
    }
}

/// Delete `path` if it exists. Returns true if something was removed.
pub fn remove_best_effort(path: &Path) -> bool {
    let meta = match fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            debug!(path = %path.display(), "nothing to remove");
            return false;
        }
        Err(err) => {
            warn!(path = %path.display(), err = %err, "cannot inspect path");
            return false;
        }
    };
    let result = if meta.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    match result {
        Ok(()) => {
            info!(path = %path.display(), "removed");
            true
        }
        Err(err) => {
            warn!(path = %path.display(), err = %err, "failed to remove");
            false
        }
    }
}

/// Remove the project's DerivedData folder, `Package.resolved` files and the SwiftPM cache.
#[instrument(skip_all, fields(workdir = %paths.workdir.display(), locator = ?locator))]
pub fn clear_derived_data<T: Toolchain>(
    toolchain: &T,
    paths: &CleanPaths,
    locator: Locator,
) -> Result<CleanReport> {
    let project = find_project_name(&paths.workdir)?;
    let root = derived_data_root(toolchain, paths);
    let mut removed = Vec::new();

    match &project {
        Some(name) => info!(project = %name, "found Xcode project"),
        None => info!("no Xcode project found, skipping project DerivedData lookup"),
    }

    let folder = if project.is_some() || locator == Locator::BuildSettings {
        locate_project_folder(toolchain, paths, &root, project.as_deref(), locator)?
    } else {
        None
    };
    match folder {
        Some(folder) => {
            if remove_best_effort(&folder) {
                removed.push(folder);
            }
        }
        None => debug!(root = %root.path.display(), "no DerivedData folder for project"),
    }

    let mut targets = paths.package_resolved_files(project.as_deref());
    targets.push(paths.swiftpm_cache());
    for target in targets {
        if remove_best_effort(&target) {
            removed.push(target);
        }
    }

    Ok(CleanReport {
        project,
        derived_data_root: root.path,
        removed,
    })
}
