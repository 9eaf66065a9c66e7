mod build_errors;
mod cli;
mod derived_data;
mod exit_codes;
mod github;
mod logging;
mod test_failures;
mod toolchain;
mod tuist;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::derived_data::Locator;
use crate::github::GITHUB_ENV_VAR;
use crate::toolchain::SystemToolchain;

#[derive(Parser)]
#[command(name = "xcode-ci", version, about = "Xcode cache and result helpers for CI")]
struct Cli {
    /// Directory containing the Xcode project (defaults to the current directory)
    #[arg(long, global = true)]
    workdir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Delete the project's DerivedData, Package.resolved and the SwiftPM cache
    ClearDerivedData {
        /// Locate DerivedData through `xcodebuild -showBuildSettings`
        #[arg(long)]
        query_xcodebuild: bool,
    },
    /// Look for transient failures in log/ and request a retry
    CheckBuildErrors {
        /// Workflow env file that receives RETRY_BUILD=true
        #[arg(long, env = GITHUB_ENV_VAR)]
        github_env: Option<PathBuf>,
    },
    /// Print annotations and a summary for failed tests
    ShowTestFailures {
        /// An .xcresult bundle; when omitted every bundle in log/ is read
        path: Option<PathBuf>,
    },
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(()) => exit_codes::OK,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_codes::FAILED
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<()> {
    let toolchain = SystemToolchain;
    let paths = cli::resolve_paths(cli.workdir)?;
    match cli.command {
        Command::ClearDerivedData { query_xcodebuild } => {
            let locator = if query_xcodebuild {
                Locator::BuildSettings
            } else {
                Locator::ProjectName
            };
            cli::clear_derived_data_cmd(&toolchain, &paths, locator)
        }
        Command::CheckBuildErrors { github_env } => {
            cli::check_build_errors_cmd(&toolchain, paths, github_env)
        }
        Command::ShowTestFailures { path } => {
            cli::show_test_failures_cmd(&toolchain, &paths.workdir, path.as_deref())
        }
    }
}
