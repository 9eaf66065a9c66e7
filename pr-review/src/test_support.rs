//! Scripted fakes of the PR host and the agent for tests.

use std::cell::RefCell;
use std::fs;
use std::path::Path;

use anyhow::{Result, anyhow};

use crate::core::inputs::ReviewInputs;
use crate::io::agent::{Agent, AgentReply, AgentRequest};
use crate::io::gh::{PrHost, PrRef};

/// Write a guideline file under `dir` and return inputs pointing at it.
pub fn sample_inputs(dir: &Path) -> ReviewInputs {
    let guidelines_path = dir.join("review-guidelines.md");
    fs::write(&guidelines_path, "# Guidelines\n").expect("write guidelines");
    ReviewInputs {
        pr_number: 42,
        api_key: "test-key".to_string(),
        model: "claude-sonnet-4-5".to_string(),
        provider: "anthropic".to_string(),
        guidelines_path,
        repository: "acme/app".to_string(),
        workspace: Some(dir.to_path_buf()),
    }
}

/// One recorded call against [`ScriptedHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Comments,
    Diff,
    Body,
    Post(String),
}

/// In-memory PR host. Each fetch can be scripted to fail.
#[derive(Debug, Default)]
pub struct ScriptedHost {
    diff: Option<String>,
    comments: Option<Vec<String>>,
    body: Option<String>,
    fail_post: bool,
    calls: RefCell<Vec<HostCall>>,
}

impl ScriptedHost {
    /// Host with the given diff, no comments and an empty body.
    pub fn new(diff: &str) -> Self {
        Self {
            diff: Some(diff.to_string()),
            comments: Some(Vec::new()),
            body: Some(String::new()),
            ..Self::default()
        }
    }

    pub fn with_comments(mut self, comments: &[&str]) -> Self {
        self.comments = Some(comments.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn with_body(mut self, body: &str) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn failing_diff(mut self) -> Self {
        self.diff = None;
        self
    }

    pub fn failing_comments(mut self) -> Self {
        self.comments = None;
        self
    }

    pub fn failing_body(mut self) -> Self {
        self.body = None;
        self
    }

    pub fn failing_post(mut self) -> Self {
        self.fail_post = true;
        self
    }

    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.borrow().clone()
    }

    /// Bodies of all comments posted so far.
    pub fn posted(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                HostCall::Post(body) => Some(body.clone()),
                _ => None,
            })
            .collect()
    }
}

impl PrHost for ScriptedHost {
    fn diff(&self, _pr: &PrRef) -> Result<String> {
        self.calls.borrow_mut().push(HostCall::Diff);
        self.diff.clone().ok_or_else(|| anyhow!("scripted diff failure"))
    }

    fn comments(&self, _pr: &PrRef) -> Result<Vec<String>> {
        self.calls.borrow_mut().push(HostCall::Comments);
        self.comments
            .clone()
            .ok_or_else(|| anyhow!("scripted comments failure"))
    }

    fn body(&self, _pr: &PrRef) -> Result<String> {
        self.calls.borrow_mut().push(HostCall::Body);
        self.body.clone().ok_or_else(|| anyhow!("scripted body failure"))
    }

    fn post_comment(&self, _pr: &PrRef, body: &str) -> Result<()> {
        if self.fail_post {
            return Err(anyhow!("scripted post failure"));
        }
        self.calls.borrow_mut().push(HostCall::Post(body.to_string()));
        Ok(())
    }
}

/// Agent that returns a canned reply and records what it was given.
///
/// The first attachment's contents are captured during the call, because
/// the context artifact is deleted once the review finishes.
#[derive(Debug, Default)]
pub struct ScriptedAgent {
    reply: Option<AgentReply>,
    last_request: RefCell<Option<AgentRequest>>,
    last_context: RefCell<Option<String>>,
}

impl ScriptedAgent {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Some(AgentReply {
                text: text.to_string(),
                exited_cleanly: true,
                truncated_bytes: 0,
            }),
            ..Self::default()
        }
    }

    /// Agent whose process "failed" but still printed `text`.
    pub fn failing_with(text: &str) -> Self {
        Self {
            reply: Some(AgentReply {
                text: text.to_string(),
                exited_cleanly: false,
                truncated_bytes: 0,
            }),
            ..Self::default()
        }
    }

    /// Agent that cannot be started at all.
    pub fn unavailable() -> Self {
        Self::default()
    }

    pub fn last_request(&self) -> Option<AgentRequest> {
        self.last_request.borrow().clone()
    }

    pub fn last_context(&self) -> Option<String> {
        self.last_context.borrow().clone()
    }
}

impl Agent for ScriptedAgent {
    fn run(&self, request: &AgentRequest) -> Result<AgentReply> {
        *self.last_request.borrow_mut() = Some(request.clone());
        if let Some(first) = request.attachments.first() {
            *self.last_context.borrow_mut() = fs::read_to_string(first).ok();
        }
        self.reply
            .clone()
            .ok_or_else(|| anyhow!("scripted agent unavailable"))
    }
}
