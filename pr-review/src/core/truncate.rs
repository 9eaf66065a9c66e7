//! Character budget for the diff handed to the agent.

/// Default diff budget, in characters.
pub const DEFAULT_DIFF_BUDGET_CHARS: usize = 100_000;

/// Notice appended after a truncated diff.
pub fn truncation_notice(budget: usize) -> String {
    format!("\n\n[Diff truncated at {budget} characters]")
}

/// Cap `diff` at `budget` bytes and append the truncation notice when it was cut.
///
/// The cut point is floored to a UTF-8 boundary, so a diff with multi-byte
/// characters may keep slightly less than `budget` bytes. The result is never
/// longer than `budget + truncation_notice(budget).len()`.
pub fn truncate_diff(diff: &str, budget: usize) -> (String, bool) {
    if diff.len() <= budget {
        return (diff.to_string(), false);
    }
    let mut cut = budget;
    while !diff.is_char_boundary(cut) {
        cut -= 1;
    }
    let mut out = String::with_capacity(cut + 48);
    out.push_str(&diff[..cut]);
    out.push_str(&truncation_notice(budget));
    (out, true)
}
