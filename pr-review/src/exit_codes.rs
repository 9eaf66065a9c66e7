//! Stable exit codes for the `pr-review` CLI.

/// A review was posted, or the run was skipped on purpose (already reviewed, empty diff).
pub const OK: i32 = 0;
/// Missing or invalid input, or an unrecoverable `gh` failure while posting.
pub const INVALID: i32 = 1;
/// The agent produced no output, so nothing was posted.
pub const AGENT_FAILED: i32 = 2;
