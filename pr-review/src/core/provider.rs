//! Provider → credential variable mapping.
//!
//! The agent reads its API key from a provider-specific environment variable.
//! The mapping is a static table; the resulting [`AgentCredential`] is handed
//! to the agent invocation and only ever set on the child process.

use std::fmt;

/// Variable used when the provider is not in [`PROVIDER_KEY_VARS`].
pub const FALLBACK_KEY_VAR: &str = "API_KEY";

/// Known providers and the variable each one reads its key from.
pub const PROVIDER_KEY_VARS: &[(&str, &str)] = &[
    ("anthropic", "ANTHROPIC_API_KEY"),
    ("openai", "OPENAI_API_KEY"),
    ("google", "GOOGLE_GENERATIVE_AI_API_KEY"),
    ("openrouter", "OPENROUTER_API_KEY"),
];

/// An API key bound to the environment variable the agent expects.
#[derive(Clone, PartialEq, Eq)]
pub struct AgentCredential {
    pub var: &'static str,
    pub value: String,
}

// Keep the key out of logs and panic messages.
impl fmt::Debug for AgentCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentCredential")
            .field("var", &self.var)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Result of mapping a provider name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialMapping {
    pub credential: AgentCredential,
    /// False when the provider was unknown and [`FALLBACK_KEY_VAR`] was used.
    pub known_provider: bool,
}

/// Look up the credential variable for `provider` (case-insensitive).
pub fn key_var_for(provider: &str) -> Option<&'static str> {
    let provider = provider.trim();
    PROVIDER_KEY_VARS
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(provider))
        .map(|(_, var)| *var)
}

/// Bind `api_key` to the variable for `provider`, falling back to [`FALLBACK_KEY_VAR`].
pub fn map_credential(provider: &str, api_key: &str) -> CredentialMapping {
    match key_var_for(provider) {
        Some(var) => CredentialMapping {
            credential: AgentCredential {
                var,
                value: api_key.to_string(),
            },
            known_provider: true,
        },
        None => CredentialMapping {
            credential: AgentCredential {
                var: FALLBACK_KEY_VAR,
                value: api_key.to_string(),
            },
            known_provider: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_known_provider_maps_to_its_variable() {
        for (provider, var) in PROVIDER_KEY_VARS {
            let mapping = map_credential(provider, "secret");
            assert!(mapping.known_provider, "{provider} should be known");
            assert_eq!(mapping.credential.var, *var);
            assert_eq!(mapping.credential.value, "secret");
        }
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        assert_eq!(key_var_for(" Anthropic "), Some("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn unknown_provider_falls_back_to_generic_variable() {
        let mapping = map_credential("mistral", "secret");
        assert!(!mapping.known_provider);
        assert_eq!(mapping.credential.var, FALLBACK_KEY_VAR);
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let mapping = map_credential("openai", "sk-very-secret");
        let rendered = format!("{mapping:?}");
        assert!(!rendered.contains("sk-very-secret"));
        assert!(rendered.contains("OPENAI_API_KEY"));
    }
}
