//! Review marker used to keep at most one AI review per pull request.

/// Literal the guideline template asks the agent to end every review with.
///
/// Presence of this string in any existing PR comment means the PR has
/// already been reviewed. This is a text search, not a lock: two concurrent
/// runs may both miss each other's comment.
pub const REVIEW_MARKER: &str = "<!-- ai-pr-review -->";

/// True if any comment body contains [`REVIEW_MARKER`] (exact, case-sensitive).
pub fn already_reviewed<S: AsRef<str>>(comments: &[S]) -> bool {
    comments
        .iter()
        .any(|body| body.as_ref().contains(REVIEW_MARKER))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_comments_means_not_reviewed() {
        let comments: [&str; 0] = [];
        assert!(!already_reviewed(&comments));
    }

    #[test]
    fn detects_marker_inside_a_longer_body() {
        let comments = [
            "LGTM".to_string(),
            format!("## Review\n\nAll good.\n\n{REVIEW_MARKER}\n"),
        ];
        assert!(already_reviewed(&comments));
    }

    #[test]
    fn marker_match_is_case_sensitive() {
        let comments = [REVIEW_MARKER.to_uppercase()];
        assert!(!already_reviewed(&comments));
    }

    #[test]
    fn shipped_guidelines_end_reviews_with_the_marker() {
        let guidelines = include_str!("../../guidelines/review-guidelines.md");
        assert!(guidelines.contains(REVIEW_MARKER));
    }
}
