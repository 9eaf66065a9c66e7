//! `pr-review`: post one AI-generated review comment on a pull request.
//!
//! Intended to run inside a GitHub Actions job with `gh` and `opencode` on
//! `PATH` and `GH_TOKEN` set. Inputs come from flags or their environment
//! fallbacks, so a workflow step can pass everything through `env:`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use pr_review::core::inputs::RawInputs;
use pr_review::core::provider::{FALLBACK_KEY_VAR, PROVIDER_KEY_VARS};
use pr_review::core::ticket::KeywordProximity;
use pr_review::exit_codes;
use pr_review::io::agent::OpencodeAgent;
use pr_review::io::config::load_config;
use pr_review::io::gh::GhCli;
use pr_review::logging;
use pr_review::review::{EmptyAgentOutput, run_review};

#[derive(Parser)]
#[command(
    name = "pr-review",
    version,
    about = "Headless AI review for a single pull request"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Review a PR and post the result as a comment (at most once per PR).
    Run(RunArgs),
    /// Print the provider → credential variable table.
    Providers,
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Pull request number.
    #[arg(long, env = "PR_NUMBER")]
    pr_number: Option<String>,
    /// API key for the model provider.
    #[arg(long, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Model identifier (with or without a `provider/` prefix).
    #[arg(long, env = "MODEL")]
    model: Option<String>,
    /// Model provider (anthropic, openai, google, openrouter, ...).
    #[arg(long, env = "PROVIDER")]
    provider: Option<String>,
    /// Path to the review guideline document.
    #[arg(long = "guidelines", env = "GUIDELINES_PATH")]
    guidelines_path: Option<PathBuf>,
    /// Repository as `owner/name`.
    #[arg(long = "repo", env = "GITHUB_REPOSITORY")]
    repository: Option<String>,
    /// Checkout the agent may read. Defaults to the current directory.
    #[arg(long, env = "GITHUB_WORKSPACE")]
    workspace: Option<PathBuf>,
    /// Optional TOML config overriding budgets, timeouts and the ticket keyword.
    #[arg(long)]
    config: Option<PathBuf>,
}

impl RunArgs {
    fn raw_inputs(&self) -> RawInputs {
        RawInputs {
            pr_number: self.pr_number.clone(),
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            provider: self.provider.clone(),
            guidelines_path: self.guidelines_path.clone(),
            repository: self.repository.clone(),
            workspace: self.workspace.clone(),
        }
    }
}

fn main() {
    logging::init();
    let code = match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code_for(&err)
        }
    };
    std::process::exit(code);
}

/// Exit code for a failed run: an empty agent reply is distinct from bad input or a failed post.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    if err.downcast_ref::<EmptyAgentOutput>().is_some() {
        exit_codes::AGENT_FAILED
    } else {
        exit_codes::INVALID
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Run(args) => cmd_run(&args),
        Command::Providers => {
            for (provider, var) in PROVIDER_KEY_VARS {
                println!("{provider}\t{var}");
            }
            println!("*\t{FALLBACK_KEY_VAR}");
            Ok(exit_codes::OK)
        }
    }
}

fn cmd_run(args: &RunArgs) -> Result<i32> {
    let inputs = args.raw_inputs().validate()?;
    let config = load_config(args.config.as_deref())?;

    let host = GhCli::new(Duration::from_secs(config.gh_timeout_secs));
    let agent = OpencodeAgent::new(config.agent.command.clone());
    let tickets = KeywordProximity::new(
        &config.ticket.keyword,
        config.ticket.context_lines,
        config.ticket.max_lines,
    )?;

    let outcome = run_review(&inputs, &config, &host, &agent, &tickets)?;
    println!(
        "review: repo={} pr={} outcome={}",
        inputs.repository,
        inputs.pr_number,
        outcome.as_str()
    );
    Ok(exit_codes::OK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_flags() {
        let cli = Cli::parse_from([
            "pr-review",
            "run",
            "--pr-number",
            "42",
            "--repo",
            "acme/app",
        ]);
        let Command::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.pr_number.as_deref(), Some("42"));
        assert_eq!(args.repository.as_deref(), Some("acme/app"));
    }

    #[test]
    fn empty_agent_output_maps_to_agent_failed() {
        let err = anyhow::Error::new(EmptyAgentOutput);
        assert_eq!(exit_code_for(&err), exit_codes::AGENT_FAILED);

        let wrapped = anyhow::Error::new(EmptyAgentOutput).context("review PR 42");
        assert_eq!(exit_code_for(&wrapped), exit_codes::AGENT_FAILED);

        let other = anyhow::anyhow!("missing required input: PR_NUMBER (--pr-number)");
        assert_eq!(exit_code_for(&other), exit_codes::INVALID);
    }

    #[test]
    fn parse_providers() {
        let cli = Cli::parse_from(["pr-review", "providers"]);
        assert!(matches!(cli.command, Command::Providers));
    }
}
