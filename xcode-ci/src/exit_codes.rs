//! Exit codes for the `xcode-ci` CLI.

/// The command ran. Findings (errors in logs, failed tests) do not change this.
pub const OK: i32 = 0;
/// Unusable environment or arguments, e.g. no home directory or an unreadable working directory.
pub const FAILED: i32 = 1;
