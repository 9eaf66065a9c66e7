//! Required inputs for a review run.
//!
//! Inputs arrive as CLI flags or their environment fallbacks (the workflow
//! sets the env vars). Validation happens before any external call so a
//! misconfigured workflow fails fast with a message naming the missing item.

use std::path::PathBuf;

use anyhow::{Result, anyhow, bail};

/// Inputs as received, before validation. Blank strings count as missing.
#[derive(Debug, Clone, Default)]
pub struct RawInputs {
    pub pr_number: Option<String>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub provider: Option<String>,
    pub guidelines_path: Option<PathBuf>,
    pub repository: Option<String>,
    pub workspace: Option<PathBuf>,
}

/// Validated inputs for one review run.
#[derive(Clone, PartialEq, Eq)]
pub struct ReviewInputs {
    pub pr_number: u64,
    pub api_key: String,
    pub model: String,
    pub provider: String,
    pub guidelines_path: PathBuf,
    /// `owner/name`.
    pub repository: String,
    /// Checkout the agent may read; defaults to the current directory.
    pub workspace: Option<PathBuf>,
}

impl std::fmt::Debug for ReviewInputs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewInputs")
            .field("pr_number", &self.pr_number)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("provider", &self.provider)
            .field("guidelines_path", &self.guidelines_path)
            .field("repository", &self.repository)
            .field("workspace", &self.workspace)
            .finish()
    }
}

/// Environment variable and flag naming one required input, for error messages.
struct InputName {
    env: &'static str,
    flag: &'static str,
}

const PR_NUMBER: InputName = InputName {
    env: "PR_NUMBER",
    flag: "--pr-number",
};
const API_KEY: InputName = InputName {
    env: "API_KEY",
    flag: "--api-key",
};
const MODEL: InputName = InputName {
    env: "MODEL",
    flag: "--model",
};
const PROVIDER: InputName = InputName {
    env: "PROVIDER",
    flag: "--provider",
};
const GUIDELINES: InputName = InputName {
    env: "GUIDELINES_PATH",
    flag: "--guidelines",
};
const REPOSITORY: InputName = InputName {
    env: "GITHUB_REPOSITORY",
    flag: "--repo",
};

fn required(value: Option<String>, name: &InputName) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(anyhow!(
            "missing required input: {} ({})",
            name.env,
            name.flag
        )),
    }
}

impl RawInputs {
    /// Check every required input is present and well-formed.
    ///
    /// Inputs are checked in a fixed order and the first missing one is
    /// reported.
    pub fn validate(self) -> Result<ReviewInputs> {
        let pr_raw = required(self.pr_number, &PR_NUMBER)?;
        let api_key = required(self.api_key, &API_KEY)?;
        let model = required(self.model, &MODEL)?;
        let provider = required(self.provider, &PROVIDER)?;
        let guidelines = required(
            self.guidelines_path.map(|p| p.to_string_lossy().into_owned()),
            &GUIDELINES,
        )?;
        let repository = required(self.repository, &REPOSITORY)?;

        let pr_number: u64 = pr_raw
            .trim_start_matches('#')
            .parse()
            .map_err(|_| anyhow!("invalid {}: {pr_raw:?} is not a PR number", PR_NUMBER.env))?;
        if pr_number == 0 {
            bail!("invalid {}: PR numbers start at 1", PR_NUMBER.env);
        }
        if !repository.contains('/') {
            bail!(
                "invalid {}: {repository:?}, expected owner/name",
                REPOSITORY.env
            );
        }

        Ok(ReviewInputs {
            pr_number,
            api_key,
            model,
            provider,
            guidelines_path: PathBuf::from(guidelines),
            repository,
            workspace: self
                .workspace
                .filter(|p| !p.as_os_str().is_empty()),
        })
    }
}

impl ReviewInputs {
    /// Model identifier in the `provider/model` form the agent expects.
    ///
    /// A model that already carries a provider prefix is used as-is.
    pub fn qualified_model(&self) -> String {
        if self.model.contains('/') {
            self.model.clone()
        } else {
            format!("{}/{}", self.provider.to_ascii_lowercase(), self.model)
        }
    }
}
