//! Shared deterministic types for the review sequence.
//!
//! These types define stable contracts between the core logic and the I/O
//! adapters. They do not depend on external state.

use serde::Serialize;

/// Everything the agent needs to know about one pull request.
///
/// Built once per invocation, rendered into a temporary Markdown file that is
/// attached to the agent call, then discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReviewContext {
    pub pr_number: u64,
    /// `owner/name` of the repository hosting the PR.
    pub repository: String,
    /// PR description as written by the author (may be empty).
    pub pr_body: String,
    /// Ticket text pulled from PR comments, or the "no context" placeholder.
    pub ticket_context: String,
    /// Unified diff, already capped to the configured budget.
    pub diff: String,
}

/// How a review run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// A comment carrying the review marker already exists on the PR.
    SkippedAlreadyReviewed,
    /// `gh pr diff` returned nothing (no changes or a fetch failure).
    SkippedEmptyDiff,
    /// The agent output was posted as a new PR comment.
    Posted {
        /// Length in bytes of the posted body.
        body_len: usize,
    },
}

impl ReviewOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SkippedAlreadyReviewed => "skipped_already_reviewed",
            Self::SkippedEmptyDiff => "skipped_empty_diff",
            Self::Posted { .. } => "posted",
        }
    }
}
