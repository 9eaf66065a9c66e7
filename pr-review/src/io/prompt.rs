//! Prompt rendering for the review agent.
//!
//! Two templates: the context artifact (PR description, ticket text, diff)
//! that is attached as a file, and the short instruction passed on the
//! command line.

use std::path::Path;

use anyhow::{Context, Result};
use minijinja::{Environment, context};

use crate::core::marker::REVIEW_MARKER;
use crate::core::types::ReviewContext;

const CONTEXT_TEMPLATE: &str = include_str!("prompts/context.md");
const INSTRUCTION_TEMPLATE: &str = include_str!("prompts/instruction.md");

/// Template engine wrapper around minijinja.
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.add_template("context", CONTEXT_TEMPLATE)
            .context("load context template")?;
        env.add_template("instruction", INSTRUCTION_TEMPLATE)
            .context("load instruction template")?;
        Ok(Self { env })
    }

    /// Render the Markdown written to the temporary context artifact.
    pub fn render_context(&self, ctx: &ReviewContext) -> Result<String> {
        let template = self.env.get_template("context")?;
        let mut rendered = template
            .render(context! { ctx => ctx })
            .context("render context template")?;
        rendered.push('\n');
        Ok(rendered)
    }

    /// Render the instruction handed to the agent alongside the attachments.
    pub fn render_instruction(
        &self,
        ctx: &ReviewContext,
        context_file: &Path,
        guidelines_file: &Path,
    ) -> Result<String> {
        let template = self.env.get_template("instruction")?;
        let rendered = template
            .render(context! {
                pr_number => ctx.pr_number,
                repository => ctx.repository.as_str(),
                context_file => file_label(context_file),
                guidelines_file => file_label(guidelines_file),
                marker => REVIEW_MARKER,
            })
            .context("render instruction template")?;
        Ok(rendered)
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ticket::NO_TICKET_CONTEXT;

    fn sample() -> ReviewContext {
        ReviewContext {
            pr_number: 42,
            repository: "acme/app".to_string(),
            pr_body: String::new(),
            ticket_context: NO_TICKET_CONTEXT.to_string(),
            diff: "diff --git a/x b/x\n+line".to_string(),
        }
    }

    /// Sections must appear in a stable order: description, ticket, diff.
    #[test]
    fn context_sections_are_ordered() {
        let engine = PromptEngine::new().expect("engine");
        let out = engine.render_context(&sample()).expect("render");

        let header = out.find("# Pull Request #42 (acme/app)").expect("header");
        let description = out.find("## Description").expect("description");
        let ticket = out.find("## Ticket Context").expect("ticket");
        let diff = out.find("## Diff").expect("diff");
        assert!(header < description);
        assert!(description < ticket);
        assert!(ticket < diff);
        assert!(out.contains("(no description provided)"));
        assert!(out.contains(NO_TICKET_CONTEXT));
        assert!(out.contains("```diff\ndiff --git a/x b/x\n+line\n```"));
    }

    /// Diff text is inserted raw, without HTML escaping.
    #[test]
    fn diff_is_not_escaped() {
        let engine = PromptEngine::new().expect("engine");
        let mut ctx = sample();
        ctx.diff = "+if a < b && c > d {".to_string();
        let out = engine.render_context(&ctx).expect("render");
        assert!(out.contains("+if a < b && c > d {"));
    }

    #[test]
    fn instruction_names_attachments_and_marker() {
        let engine = PromptEngine::new().expect("engine");
        let out = engine
            .render_instruction(
                &sample(),
                Path::new("/tmp/pr-review-context-abc.md"),
                Path::new("/actions/review-guidelines.md"),
            )
            .expect("render");
        assert!(out.contains("pull request #42 in acme/app"));
        assert!(out.contains("`pr-review-context-abc.md`"));
        assert!(out.contains("`review-guidelines.md`"));
        assert!(out.contains(REVIEW_MARKER));
    }
}
