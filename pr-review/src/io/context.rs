//! Temporary context artifact attached to the agent call.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;
use tracing::debug;

/// Markdown file holding the review context for the lifetime of one run.
///
/// The file is removed when the artifact is dropped, which covers every exit
/// path of the review including errors.
#[derive(Debug)]
pub struct ContextArtifact {
    file: NamedTempFile,
}

impl ContextArtifact {
    /// Write `contents` to a fresh temp file named `pr-<number>-context-*.md`.
    pub fn write(pr_number: u64, contents: &str) -> Result<Self> {
        let mut file = tempfile::Builder::new()
            .prefix(&format!("pr-{pr_number}-context-"))
            .suffix(".md")
            .tempfile()
            .context("create context artifact")?;
        file.write_all(contents.as_bytes())
            .context("write context artifact")?;
        file.flush().context("flush context artifact")?;
        debug!(path = %file.path().display(), bytes = contents.len(), "wrote context artifact");
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
