//! Ticket context pulled from PR comments.
//!
//! Issue-tracker bots usually leave a comment linking the ticket and quoting
//! its description. [`KeywordProximity`] finds those comments by keyword and
//! keeps the lines that follow; nothing checks that the captured lines are
//! actually about the ticket beyond their position. Other sources (e.g. a
//! direct tracker lookup) can implement [`TicketContextSource`] without
//! touching the review sequence.

use anyhow::{Context, Result};
use regex::{Regex, RegexBuilder};

/// Substituted when no source finds any ticket text.
pub const NO_TICKET_CONTEXT: &str = "No Linear ticket context found in PR comments.";

/// Something that can derive ticket text from a PR's comments.
pub trait TicketContextSource {
    /// Return the ticket text, or `None` if nothing relevant was found.
    fn extract(&self, comments: &[String]) -> Option<String>;
}

/// Case-insensitive keyword search that captures the lines after each hit.
///
/// Mirrors `grep -i -A <after_lines> <keyword>` over all comment lines, with
/// the total capped at `max_lines`.
#[derive(Debug, Clone)]
pub struct KeywordProximity {
    pattern: Regex,
    after_lines: usize,
    max_lines: usize,
}

impl KeywordProximity {
    pub fn new(keyword: &str, after_lines: usize, max_lines: usize) -> Result<Self> {
        let pattern = RegexBuilder::new(&regex::escape(keyword))
            .case_insensitive(true)
            .build()
            .with_context(|| format!("compile ticket keyword {keyword:?}"))?;
        Ok(Self {
            pattern,
            after_lines,
            max_lines,
        })
    }
}

impl TicketContextSource for KeywordProximity {
    fn extract(&self, comments: &[String]) -> Option<String> {
        let lines: Vec<&str> = comments.iter().flat_map(|body| body.lines()).collect();

        let mut keep = vec![false; lines.len()];
        for (idx, line) in lines.iter().enumerate() {
            if self.pattern.is_match(line) {
                let end = (idx + self.after_lines).min(lines.len().saturating_sub(1));
                for flag in &mut keep[idx..=end] {
                    *flag = true;
                }
            }
        }

        let captured: Vec<&str> = lines
            .iter()
            .zip(&keep)
            .filter(|(_, kept)| **kept)
            .map(|(line, _)| *line)
            .take(self.max_lines)
            .collect();

        let text = captured.join("\n");
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Run `source` and substitute [`NO_TICKET_CONTEXT`] when it finds nothing.
pub fn ticket_context_or_placeholder<S: TicketContextSource + ?Sized>(
    source: &S,
    comments: &[String],
) -> String {
    source
        .extract(comments)
        .unwrap_or_else(|| NO_TICKET_CONTEXT.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comments(bodies: &[&str]) -> Vec<String> {
        bodies.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn captures_matching_line_and_following_lines() {
        let source = KeywordProximity::new("linear", 2, 50).expect("source");
        let found = source
            .extract(&comments(&["intro\nLinear: ENG-42\nFix login\nSteps here\nunrelated"]))
            .expect("context");
        assert_eq!(found, "Linear: ENG-42\nFix login\nSteps here");
    }

    #[test]
    fn keyword_match_ignores_case() {
        let source = KeywordProximity::new("linear", 0, 50).expect("source");
        let found = source
            .extract(&comments(&["see https://LINEAR.app/acme/issue/ENG-7"]))
            .expect("context");
        assert!(found.contains("ENG-7"));
    }

    #[test]
    fn overlapping_windows_do_not_duplicate_lines() {
        let source = KeywordProximity::new("linear", 2, 50).expect("source");
        let found = source
            .extract(&comments(&["linear one\nlinear two\nthree\nfour"]))
            .expect("context");
        assert_eq!(found, "linear one\nlinear two\nthree\nfour");
    }

    #[test]
    fn total_lines_are_capped() {
        let source = KeywordProximity::new("linear", 100, 3).expect("source");
        let found = source
            .extract(&comments(&["linear\n1\n2\n3\n4\n5"]))
            .expect("context");
        assert_eq!(found.lines().count(), 3);
    }

    #[test]
    fn window_spans_comment_boundaries() {
        let source = KeywordProximity::new("linear", 1, 50).expect("source");
        let found = source
            .extract(&comments(&["Linear ENG-1", "next comment"]))
            .expect("context");
        assert_eq!(found, "Linear ENG-1\nnext comment");
    }

    #[test]
    fn keyword_is_matched_literally() {
        let source = KeywordProximity::new("a.b", 0, 50).expect("source");
        assert!(source.extract(&comments(&["axb"])).is_none());
        assert!(source.extract(&comments(&["a.b"])).is_some());
    }

    #[test]
    fn missing_keyword_yields_placeholder() {
        let source = KeywordProximity::new("linear", 20, 50).expect("source");
        let text = ticket_context_or_placeholder(&source, &comments(&["LGTM", "nit: rename"]));
        assert_eq!(text, NO_TICKET_CONTEXT);
    }
}
