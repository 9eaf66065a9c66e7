//! Optional reviewer configuration (`--config path/to/pr-review.toml`).

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};

use crate::core::truncate::DEFAULT_DIFF_BUDGET_CHARS;

/// Reviewer configuration (TOML).
///
/// Every field has a default, so the file is optional and may set only what
/// a repository wants to change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReviewConfig {
    /// Diffs longer than this many characters are cut before reaching the agent.
    pub diff_budget_chars: usize,

    pub ticket: TicketConfig,

    pub agent: AgentConfig,

    /// Timeout for each `gh` call, in seconds.
    pub gh_timeout_secs: u64,

    /// Also write the raw agent output here (e.g. for upload as a workflow artifact).
    pub output_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TicketConfig {
    /// Keyword searched (case-insensitively) in PR comments.
    pub keyword: String,
    /// Lines captured after each keyword hit.
    pub context_lines: usize,
    /// Upper bound on captured lines overall.
    pub max_lines: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Agent executable (looked up on `PATH`).
    pub command: String,
    /// Wall-clock limit for the agent run, in seconds.
    pub timeout_secs: u64,
    /// Truncate captured agent stdout beyond this many bytes.
    pub output_limit_bytes: usize,
}

impl Default for TicketConfig {
    fn default() -> Self {
        Self {
            keyword: "linear".to_string(),
            context_lines: 20,
            max_lines: 60,
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            command: "opencode".to_string(),
            timeout_secs: 30 * 60,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            diff_budget_chars: DEFAULT_DIFF_BUDGET_CHARS,
            ticket: TicketConfig::default(),
            agent: AgentConfig::default(),
            gh_timeout_secs: 120,
            output_path: None,
        }
    }
}

impl ReviewConfig {
    pub fn validate(&self) -> Result<()> {
        if self.diff_budget_chars == 0 {
            return Err(anyhow!("diff_budget_chars must be > 0"));
        }
        if self.ticket.keyword.trim().is_empty() {
            return Err(anyhow!("ticket.keyword must be non-empty"));
        }
        if self.ticket.max_lines == 0 {
            return Err(anyhow!("ticket.max_lines must be > 0"));
        }
        if self.agent.command.trim().is_empty() {
            return Err(anyhow!("agent.command must be non-empty"));
        }
        if self.agent.timeout_secs == 0 {
            return Err(anyhow!("agent.timeout_secs must be > 0"));
        }
        if self.agent.output_limit_bytes == 0 {
            return Err(anyhow!("agent.output_limit_bytes must be > 0"));
        }
        if self.gh_timeout_secs == 0 {
            return Err(anyhow!("gh_timeout_secs must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file, or defaults when no path is given.
///
/// An explicitly named file that does not exist is an error.
pub fn load_config(path: Option<&Path>) -> Result<ReviewConfig> {
    let Some(path) = path else {
        let cfg = ReviewConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    };
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ReviewConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_path_returns_default() {
        let cfg = load_config(None).expect("load");
        assert_eq!(cfg, ReviewConfig::default());
        assert_eq!(cfg.diff_budget_chars, DEFAULT_DIFF_BUDGET_CHARS);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("pr-review.toml");
        fs::write(
            &path,
            "diff_budget_chars = 5000\n\n[ticket]\nkeyword = \"jira\"\n",
        )
        .expect("write");

        let cfg = load_config(Some(&path)).expect("load");
        assert_eq!(cfg.diff_budget_chars, 5000);
        assert_eq!(cfg.ticket.keyword, "jira");
        assert_eq!(cfg.ticket.context_lines, 20);
        assert_eq!(cfg.agent, AgentConfig::default());
    }

    #[test]
    fn missing_named_file_is_an_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        assert!(load_config(Some(&temp.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn zero_budget_is_rejected() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("pr-review.toml");
        fs::write(&path, "diff_budget_chars = 0\n").expect("write");
        let err = load_config(Some(&path)).unwrap_err();
        assert!(format!("{err:#}").contains("diff_budget_chars"));
    }
}
