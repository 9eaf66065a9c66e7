//! Headless agent invocation.
//!
//! The [`Agent`] trait decouples the review sequence from the agent backend
//! (currently `opencode run`). Tests use scripted agents that return canned
//! reviews without spawning processes.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::core::provider::AgentCredential;
use crate::io::process::{CommandLimits, CommandOutput, run_command};

/// Environment variable `opencode` reads inline JSON config from.
pub const CONFIG_CONTENT_VAR: &str = "OPENCODE_CONFIG_CONTENT";

/// Parameters for one agent invocation.
#[derive(Debug, Clone)]
pub struct AgentRequest {
    /// Directory the agent may read (the checked-out repository).
    pub workdir: PathBuf,
    /// `provider/model`.
    pub model: String,
    /// Instruction text passed as the message.
    pub instruction: String,
    /// Files attached to the message (context artifact, guidelines).
    pub attachments: Vec<PathBuf>,
    /// API key and the variable it must be exported under.
    pub credential: AgentCredential,
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

/// What the agent printed, plus how the process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentReply {
    pub text: String,
    /// False on non-zero exit or timeout. The text is still usable.
    pub exited_cleanly: bool,
    /// Stdout bytes dropped past the output limit.
    pub truncated_bytes: usize,
}

impl AgentReply {
    fn from_output(output: &CommandOutput) -> Self {
        Self {
            text: output.stdout_text(),
            exited_cleanly: output.succeeded(),
            truncated_bytes: output.stdout_truncated,
        }
    }
}

/// Abstraction over agent backends.
pub trait Agent {
    /// Run the agent. `Err` means it could not be started at all.
    fn run(&self, request: &AgentRequest) -> Result<AgentReply>;
}

/// Per-tool permission level in the agent config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Allow,
    Deny,
}

#[derive(Debug, Clone, Serialize)]
pub struct PermissionConfig {
    pub edit: Permission,
    pub bash: Permission,
    pub webfetch: Permission,
}

/// JSON config handed to `opencode` through [`CONFIG_CONTENT_VAR`].
#[derive(Debug, Clone, Serialize)]
pub struct OpencodeConfig {
    #[serde(rename = "$schema")]
    pub schema: &'static str,
    pub model: String,
    pub permission: PermissionConfig,
    pub tools: BTreeMap<&'static str, bool>,
}

impl OpencodeConfig {
    /// Read-only config: reading, listing and searching allowed; editing,
    /// shell execution and network fetches denied.
    pub fn read_only(model: &str) -> Self {
        let tools = BTreeMap::from([
            ("bash", false),
            ("edit", false),
            ("glob", true),
            ("grep", true),
            ("list", true),
            ("patch", false),
            ("read", true),
            ("webfetch", false),
            ("write", false),
        ]);
        Self {
            schema: "https://opencode.ai/config.json",
            model: model.to_string(),
            permission: PermissionConfig {
                edit: Permission::Deny,
                bash: Permission::Deny,
                webfetch: Permission::Deny,
            },
            tools,
        }
    }
}

/// Agent that spawns `opencode run`.
#[derive(Debug, Clone)]
pub struct OpencodeAgent {
    program: String,
}

impl OpencodeAgent {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, request: &AgentRequest) -> Result<Command> {
        let config = serde_json::to_string(&OpencodeConfig::read_only(&request.model))
            .context("serialize agent config")?;

        let mut cmd = Command::new(&self.program);
        cmd.arg("run").arg("--model").arg(&request.model);
        for file in &request.attachments {
            cmd.arg("--file").arg(file);
        }
        cmd.arg(&request.instruction)
            .current_dir(&request.workdir)
            .env(CONFIG_CONTENT_VAR, config)
            .env(request.credential.var, &request.credential.value);
        Ok(cmd)
    }
}

impl Agent for OpencodeAgent {
    #[instrument(skip_all, fields(model = %request.model, timeout_secs = request.timeout.as_secs()))]
    fn run(&self, request: &AgentRequest) -> Result<AgentReply> {
        info!(workdir = %request.workdir.display(), "starting agent");
        let cmd = self.command(request)?;
        let output = run_command(
            cmd,
            None,
            CommandLimits {
                timeout: request.timeout,
                output_limit_bytes: request.output_limit_bytes,
            },
        )
        .with_context(|| format!("run {}", self.program))?;

        if output.timed_out {
            warn!(timeout_secs = request.timeout.as_secs(), "agent timed out");
        } else if !output.status.success() {
            warn!(
                exit_code = ?output.status.code(),
                stderr = %output.stderr_text(),
                "agent exited with failure"
            );
        }
        debug!(bytes = output.stdout.len(), "agent finished");

        Ok(AgentReply::from_output(&output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> AgentRequest {
        AgentRequest {
            workdir: PathBuf::from("."),
            model: "anthropic/claude-sonnet-4-5".to_string(),
            instruction: "review it".to_string(),
            attachments: vec![PathBuf::from("ctx.md"), PathBuf::from("guide.md")],
            credential: AgentCredential {
                var: "ANTHROPIC_API_KEY",
                value: "secret".to_string(),
            },
            timeout: Duration::from_secs(5),
            output_limit_bytes: 1_000,
        }
    }

    #[test]
    fn read_only_config_denies_side_effects() {
        let json = serde_json::to_value(OpencodeConfig::read_only("openai/gpt-5")).expect("json");
        assert_eq!(json["$schema"], "https://opencode.ai/config.json");
        assert_eq!(json["model"], "openai/gpt-5");
        assert_eq!(json["permission"]["edit"], "deny");
        assert_eq!(json["permission"]["bash"], "deny");
        assert_eq!(json["permission"]["webfetch"], "deny");
        for allowed in ["read", "list", "grep", "glob"] {
            assert_eq!(json["tools"][allowed], true, "{allowed} should be enabled");
        }
        for denied in ["write", "edit", "patch", "bash", "webfetch"] {
            assert_eq!(json["tools"][denied], false, "{denied} should be disabled");
        }
    }

    #[test]
    fn command_passes_model_attachments_and_message_last() {
        let cmd = OpencodeAgent::new("opencode")
            .command(&request())
            .expect("command");
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "run",
                "--model",
                "anthropic/claude-sonnet-4-5",
                "--file",
                "ctx.md",
                "--file",
                "guide.md",
                "review it",
            ]
        );
    }

    #[test]
    fn credential_is_set_on_the_child_only() {
        let cmd = OpencodeAgent::new("opencode")
            .command(&request())
            .expect("command");
        let envs: BTreeMap<String, String> = cmd
            .get_envs()
            .filter_map(|(k, v)| {
                Some((
                    k.to_string_lossy().into_owned(),
                    v?.to_string_lossy().into_owned(),
                ))
            })
            .collect();
        assert_eq!(envs.get("ANTHROPIC_API_KEY").map(String::as_str), Some("secret"));
        assert!(envs[CONFIG_CONTENT_VAR].contains("\"edit\":\"deny\""));
        assert!(std::env::var("ANTHROPIC_API_KEY").as_deref() != Ok("secret"));
    }

    #[cfg(unix)]
    #[test]
    fn reply_records_truncation_and_failed_exit() {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg("printf 0123456789; exit 3");
        let output = run_command(
            cmd,
            None,
            CommandLimits {
                timeout: Duration::from_secs(10),
                output_limit_bytes: 4,
            },
        )
        .expect("run");

        let reply = AgentReply::from_output(&output);
        assert_eq!(reply.text, "0123");
        assert_eq!(reply.truncated_bytes, 6);
        assert!(!reply.exited_cleanly);
    }

    #[test]
    fn missing_binary_is_an_error() {
        let err = OpencodeAgent::new("definitely-not-opencode-7f3a")
            .run(&request())
            .unwrap_err();
        assert!(format!("{err:#}").contains("spawn"));
    }
}
