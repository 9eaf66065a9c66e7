//! Pull-request host adapter backed by the GitHub CLI.
//!
//! All PR traffic goes through `gh`, which picks up `GH_TOKEN`/`GITHUB_TOKEN`
//! from the workflow environment. The [`PrHost`] trait keeps the review
//! sequence testable without a network.

use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::io::process::{CommandLimits, CommandOutput, run_command};

/// Output cap for `gh` reads; diffs beyond this are cut again later anyway.
const GH_OUTPUT_LIMIT_BYTES: usize = 16 * 1024 * 1024;

/// A pull request in a specific repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrRef {
    /// `owner/name`.
    pub repository: String,
    pub number: u64,
}

/// Operations the review needs from the PR host.
pub trait PrHost {
    /// Unified diff of the PR.
    fn diff(&self, pr: &PrRef) -> Result<String>;
    /// Bodies of all issue comments on the PR, oldest first.
    fn comments(&self, pr: &PrRef) -> Result<Vec<String>>;
    /// PR description.
    fn body(&self, pr: &PrRef) -> Result<String>;
    /// Create a new PR comment with `body` verbatim.
    fn post_comment(&self, pr: &PrRef, body: &str) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct CommentsView {
    #[serde(default)]
    comments: Vec<CommentView>,
}

#[derive(Debug, Deserialize)]
struct CommentView {
    #[serde(default)]
    body: String,
}

#[derive(Debug, Deserialize)]
struct BodyView {
    #[serde(default)]
    body: String,
}

/// `gh` subprocess wrapper.
#[derive(Debug, Clone)]
pub struct GhCli {
    program: String,
    timeout: Duration,
}

impl GhCli {
    pub fn new(timeout: Duration) -> Self {
        Self {
            program: "gh".to_string(),
            timeout,
        }
    }

    /// Use a different executable (e.g. a wrapper script).
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn run_checked(&self, args: &[&str], stdin: Option<&[u8]>) -> Result<CommandOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args);
        let output = run_command(
            cmd,
            stdin,
            CommandLimits {
                timeout: self.timeout,
                output_limit_bytes: GH_OUTPUT_LIMIT_BYTES,
            },
        )
        .with_context(|| format!("run gh {}", args.join(" ")))?;
        if output.timed_out {
            return Err(anyhow!(
                "gh {} timed out after {:?}",
                args.join(" "),
                self.timeout
            ));
        }
        if !output.status.success() {
            return Err(anyhow!(
                "gh {} failed: {}",
                args.join(" "),
                output.stderr_text()
            ));
        }
        Ok(output)
    }

    fn view_json<T: for<'de> Deserialize<'de>>(&self, pr: &PrRef, fields: &str) -> Result<T> {
        let number = pr.number.to_string();
        let output = self.run_checked(
            &[
                "pr",
                "view",
                &number,
                "--repo",
                &pr.repository,
                "--json",
                fields,
            ],
            None,
        )?;
        serde_json::from_slice(&output.stdout)
            .with_context(|| format!("parse gh pr view --json {fields}"))
    }
}

impl PrHost for GhCli {
    #[instrument(skip_all, fields(repo = %pr.repository, pr = pr.number))]
    fn diff(&self, pr: &PrRef) -> Result<String> {
        let number = pr.number.to_string();
        let output =
            self.run_checked(&["pr", "diff", &number, "--repo", &pr.repository], None)?;
        let diff = output.stdout_text();
        debug!(bytes = diff.len(), "fetched diff");
        Ok(diff)
    }

    #[instrument(skip_all, fields(repo = %pr.repository, pr = pr.number))]
    fn comments(&self, pr: &PrRef) -> Result<Vec<String>> {
        let view: CommentsView = self.view_json(pr, "comments")?;
        let bodies: Vec<String> = view.comments.into_iter().map(|c| c.body).collect();
        debug!(count = bodies.len(), "fetched comments");
        Ok(bodies)
    }

    #[instrument(skip_all, fields(repo = %pr.repository, pr = pr.number))]
    fn body(&self, pr: &PrRef) -> Result<String> {
        let view: BodyView = self.view_json(pr, "body")?;
        Ok(view.body)
    }

    #[instrument(skip_all, fields(repo = %pr.repository, pr = pr.number, bytes = body.len()))]
    fn post_comment(&self, pr: &PrRef, body: &str) -> Result<()> {
        let number = pr.number.to_string();
        self.run_checked(
            &[
                "pr",
                "comment",
                &number,
                "--repo",
                &pr.repository,
                "--body-file",
                "-",
            ],
            Some(body.as_bytes()),
        )?;
        debug!("posted comment");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comment_bodies() {
        let raw = r#"{"comments":[{"author":{"login":"bot"},"body":"first"},{"body":"second"}]}"#;
        let view: CommentsView = serde_json::from_str(raw).expect("parse");
        let bodies: Vec<String> = view.comments.into_iter().map(|c| c.body).collect();
        assert_eq!(bodies, vec!["first", "second"]);
    }

    #[test]
    fn missing_fields_default_to_empty() {
        let view: CommentsView = serde_json::from_str("{}").expect("parse");
        assert!(view.comments.is_empty());
        let body: BodyView = serde_json::from_str("{}").expect("parse");
        assert!(body.body.is_empty());
    }

    // `sh` stands in for `gh`: it treats `pr` as a script path and fails.
    #[cfg(unix)]
    #[test]
    fn failing_command_is_an_error_naming_the_call() {
        let gh = GhCli::new(Duration::from_secs(10)).with_program("sh");
        let pr = PrRef {
            repository: "acme/app".to_string(),
            number: 1,
        };
        let err = gh.diff(&pr).unwrap_err();
        assert!(
            err.to_string().contains("gh pr diff 1 --repo acme/app failed"),
            "{err}"
        );
    }
}
