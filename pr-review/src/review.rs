//! Orchestration for a single `pr-review run`.
//!
//! The sequence is linear: credential mapping, idempotency check, diff fetch,
//! truncation, context assembly, agent invocation, output check, post.
//! Fetch failures degrade to empty results; only an empty agent reply and a
//! failed post are fatal.

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::{info, instrument, warn};

use crate::core::inputs::ReviewInputs;
use crate::core::marker::already_reviewed;
use crate::core::provider::map_credential;
use crate::core::ticket::{TicketContextSource, ticket_context_or_placeholder};
use crate::core::truncate::truncate_diff;
use crate::core::types::{ReviewContext, ReviewOutcome};
use crate::io::agent::{Agent, AgentRequest};
use crate::io::config::ReviewConfig;
use crate::io::context::ContextArtifact;
use crate::io::gh::{PrHost, PrRef};
use crate::io::prompt::PromptEngine;

/// The agent ran but produced nothing to post.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyAgentOutput;

impl fmt::Display for EmptyAgentOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("agent produced no output; nothing was posted")
    }
}

impl std::error::Error for EmptyAgentOutput {}

/// Review one pull request and post the agent's reply as a comment.
///
/// Returns `Err` for an unreadable guideline file, an empty agent reply
/// ([`EmptyAgentOutput`]) or a failed post. Skips are `Ok`.
#[instrument(skip_all, fields(repo = %inputs.repository, pr = inputs.pr_number))]
pub fn run_review<H: PrHost, A: Agent, T: TicketContextSource + ?Sized>(
    inputs: &ReviewInputs,
    config: &ReviewConfig,
    host: &H,
    agent: &A,
    tickets: &T,
) -> Result<ReviewOutcome> {
    if !inputs.guidelines_path.is_file() {
        bail!(
            "guidelines file not found: {}",
            inputs.guidelines_path.display()
        );
    }

    let mapping = map_credential(&inputs.provider, &inputs.api_key);
    if mapping.known_provider {
        info!(provider = %inputs.provider, var = mapping.credential.var, "mapped credential");
    } else {
        warn!(
            provider = %inputs.provider,
            var = mapping.credential.var,
            "unknown provider, using generic credential variable"
        );
    }

    let pr = PrRef {
        repository: inputs.repository.clone(),
        number: inputs.pr_number,
    };

    let comments = host.comments(&pr).unwrap_or_else(|err| {
        warn!(err = %format!("{err:#}"), "could not fetch PR comments, continuing without them");
        Vec::new()
    });
    if already_reviewed(&comments) {
        info!("PR already has a review comment, skipping");
        return Ok(ReviewOutcome::SkippedAlreadyReviewed);
    }

    let raw_diff = host.diff(&pr).unwrap_or_else(|err| {
        warn!(err = %format!("{err:#}"), "could not fetch PR diff");
        String::new()
    });
    if raw_diff.trim().is_empty() {
        info!("no diff to review, skipping");
        return Ok(ReviewOutcome::SkippedEmptyDiff);
    }
    let (diff, truncated) = truncate_diff(&raw_diff, config.diff_budget_chars);
    if truncated {
        warn!(
            original_bytes = raw_diff.len(),
            budget = config.diff_budget_chars,
            "diff truncated"
        );
    }

    let pr_body = host.body(&pr).unwrap_or_else(|err| {
        warn!(err = %format!("{err:#}"), "could not fetch PR body");
        String::new()
    });
    let ticket_context = ticket_context_or_placeholder(tickets, &comments);

    let ctx = ReviewContext {
        pr_number: inputs.pr_number,
        repository: inputs.repository.clone(),
        pr_body,
        ticket_context,
        diff,
    };

    let engine = PromptEngine::new()?;
    let artifact = ContextArtifact::write(ctx.pr_number, &engine.render_context(&ctx)?)?;
    let instruction =
        engine.render_instruction(&ctx, artifact.path(), &inputs.guidelines_path)?;

    let workdir = match &inputs.workspace {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("resolve current directory")?,
    };
    let request = AgentRequest {
        workdir,
        model: inputs.qualified_model(),
        instruction,
        attachments: vec![
            artifact.path().to_path_buf(),
            inputs.guidelines_path.clone(),
        ],
        credential: mapping.credential,
        timeout: Duration::from_secs(config.agent.timeout_secs),
        output_limit_bytes: config.agent.output_limit_bytes,
    };

    let output = match agent.run(&request) {
        Ok(reply) => {
            if !reply.exited_cleanly {
                warn!("agent did not exit cleanly, using its output as-is");
            }
            if reply.truncated_bytes > 0 {
                warn!(
                    dropped_bytes = reply.truncated_bytes,
                    limit = config.agent.output_limit_bytes,
                    "agent output cut at the output limit"
                );
            }
            reply.text
        }
        Err(err) => {
            warn!(err = %format!("{err:#}"), "agent invocation failed");
            String::new()
        }
    };

    if let Some(path) = &config.output_path {
        write_output_copy(path, &output)?;
    }

    if output.trim().is_empty() {
        return Err(EmptyAgentOutput.into());
    }

    host.post_comment(&pr, &output).context("post review comment")?;
    info!(bytes = output.len(), "posted review comment");
    Ok(ReviewOutcome::Posted {
        body_len: output.len(),
    })
}

fn write_output_copy(path: &Path, output: &str) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .with_context(|| format!("create output dir {}", parent.display()))?;
    }
    fs::write(path, output).with_context(|| format!("write agent output {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ticket::{KeywordProximity, NO_TICKET_CONTEXT};
    use crate::test_support::{ScriptedAgent, ScriptedHost, sample_inputs};

    fn tickets() -> KeywordProximity {
        KeywordProximity::new("linear", 20, 60).expect("tickets")
    }

    #[test]
    fn missing_guidelines_fail_before_any_fetch() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut inputs = sample_inputs(temp.path());
        inputs.guidelines_path = temp.path().join("missing.md");
        let host = ScriptedHost::new("diff --git a/x b/x\n+line");
        let agent = ScriptedAgent::replying("review");

        let err = run_review(&inputs, &ReviewConfig::default(), &host, &agent, &tickets())
            .unwrap_err();
        assert!(err.to_string().contains("guidelines file not found"));
        assert_eq!(host.calls().len(), 0);
    }

    #[test]
    fn context_artifact_is_gone_after_the_run() {
        let temp = tempfile::tempdir().expect("tempdir");
        let inputs = sample_inputs(temp.path());
        let host = ScriptedHost::new("diff --git a/x b/x\n+line");
        let agent = ScriptedAgent::replying("## Review\n");

        run_review(&inputs, &ReviewConfig::default(), &host, &agent, &tickets()).expect("run");
        let request = agent.last_request().expect("request");
        assert!(!request.attachments[0].exists());
    }

    #[test]
    fn output_copy_is_written_even_when_empty() {
        let temp = tempfile::tempdir().expect("tempdir");
        let inputs = sample_inputs(temp.path());
        let host = ScriptedHost::new("diff --git a/x b/x\n+line");
        let agent = ScriptedAgent::replying("");
        let config = ReviewConfig {
            output_path: Some(temp.path().join("out/review.md")),
            ..ReviewConfig::default()
        };

        let err = run_review(&inputs, &config, &host, &agent, &tickets()).unwrap_err();
        assert!(err.downcast_ref::<EmptyAgentOutput>().is_some());
        assert_eq!(
            fs::read_to_string(temp.path().join("out/review.md")).expect("read"),
            ""
        );
    }

    #[test]
    fn placeholder_is_used_without_ticket_comments() {
        let temp = tempfile::tempdir().expect("tempdir");
        let inputs = sample_inputs(temp.path());
        let host = ScriptedHost::new("diff --git a/x b/x\n+line").with_comments(&["nice"]);
        let agent = ScriptedAgent::replying("ok");

        run_review(&inputs, &ReviewConfig::default(), &host, &agent, &tickets()).expect("run");
        let context = agent.last_context().expect("context");
        assert!(context.contains(NO_TICKET_CONTEXT));
    }
}
