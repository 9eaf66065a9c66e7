//! GitHub Actions workflow commands.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

/// Environment variable naming the workflow's env file.
pub const GITHUB_ENV_VAR: &str = "GITHUB_ENV";

/// Append `KEY=value` to the workflow env file at `env_file`.
pub fn append_env(env_file: &Path, key: &str, value: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(env_file)
        .with_context(|| format!("open {}", env_file.display()))?;
    writeln!(file, "{key}={value}")
        .with_context(|| format!("write {}", env_file.display()))?;
    Ok(())
}

/// Escape annotation message data (`%`, CR, LF).
pub fn escape_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// `::error title=<title>::<message>` with the message escaped.
pub fn error_annotation(title: &str, message: &str) -> String {
    format!("::error title={title}::{}", escape_data(message))
}
