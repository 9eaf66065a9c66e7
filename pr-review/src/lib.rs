//! Headless AI review of a single pull request.
//!
//! The crate keeps the same split as the rest of the workspace:
//!
//! - **[`core`]**: Pure, deterministic logic (input validation, provider
//!   mapping, diff truncation, ticket-context extraction, the review marker).
//!   No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting adapters (`gh`, `opencode`, child processes,
//!   prompt rendering, config and the temporary context artifact).
//!
//! [`review`] wires the two together into the linear review sequence used by
//! the `pr-review run` command.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod review;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
