//! CLI tests for `pr-review`.
//!
//! Spawns the binary with a scrubbed environment and verifies that input
//! validation fails fast with the documented exit code, before `gh` or the
//! agent could be reached.

use std::process::Command;

use pr_review::exit_codes;

const INPUT_VARS: [&str; 7] = [
    "PR_NUMBER",
    "API_KEY",
    "MODEL",
    "PROVIDER",
    "GUIDELINES_PATH",
    "GITHUB_REPOSITORY",
    "GITHUB_WORKSPACE",
];

fn pr_review() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pr-review"));
    for var in INPUT_VARS {
        cmd.env_remove(var);
    }
    // An empty PATH makes any attempt to reach `gh` or `opencode` fail loudly.
    cmd.env("PATH", "");
    cmd
}

#[test]
fn missing_input_exits_invalid_and_names_it() {
    let output = pr_review()
        .args(["run", "--pr-number", "42", "--model", "m", "--provider", "openai"])
        .output()
        .expect("run pr-review");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("missing required input: API_KEY"),
        "stderr: {stderr}"
    );
    assert!(output.stdout.is_empty());
}

#[test]
fn inputs_are_read_from_environment() {
    let temp = tempfile::tempdir().expect("tempdir");
    let output = pr_review()
        .env("PR_NUMBER", "42")
        .env("API_KEY", "secret")
        .env("MODEL", "m")
        .env("PROVIDER", "openai")
        .env("GUIDELINES_PATH", temp.path().join("missing.md"))
        .env("GITHUB_REPOSITORY", "acme/app")
        .arg("run")
        .output()
        .expect("run pr-review");

    assert_eq!(output.status.code(), Some(exit_codes::INVALID));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("guidelines file not found"), "stderr: {stderr}");
}

#[test]
fn providers_lists_mapping_table() {
    let output = pr_review()
        .arg("providers")
        .output()
        .expect("run pr-review");

    assert_eq!(output.status.code(), Some(exit_codes::OK));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("anthropic\tANTHROPIC_API_KEY"));
    assert!(stdout.contains("*\tAPI_KEY"));
}
