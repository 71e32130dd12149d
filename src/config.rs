//! Engine configuration read from the process environment.
//!
//! `LLM_ONLY` defaults to true: without credentials the engine refuses to
//! plan rather than silently degrading to heuristics. Setting it to
//! "false" makes the heuristic planner an accepted fallback.

use std::env;

use crate::oracle::{OracleConfig, OracleProviderType};

pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

/// Plain-data engine wiring. Construction never fails; bad values fall
/// back to defaults.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub provider: OracleProviderType,
    pub model: String,
    pub api_key: Option<String>,
    /// Planning failures surface as errors instead of heuristic fallbacks.
    pub llm_only: bool,
}

fn provider_from(raw: &str) -> OracleProviderType {
    if raw.trim().eq_ignore_ascii_case("gemini") {
        OracleProviderType::Gemini
    } else {
        OracleProviderType::OpenAI
    }
}

fn llm_only_from(raw: Option<&str>) -> bool {
    !raw.unwrap_or("true").trim().eq_ignore_ascii_case("false")
}

fn default_model(provider: OracleProviderType) -> &'static str {
    match provider {
        OracleProviderType::Gemini => DEFAULT_GEMINI_MODEL,
        _ => DEFAULT_OPENAI_MODEL,
    }
}

impl EngineConfig {
    /// Read `LLM_PROVIDER`, `LLM_ONLY`, `LLM_MODEL`, and the provider's
    /// API key variable.
    pub fn from_env() -> Self {
        let provider = provider_from(&env::var("LLM_PROVIDER").unwrap_or_default());
        let api_key = match provider {
            OracleProviderType::Gemini => env::var("GEMINI_API_KEY").ok(),
            _ => env::var("OPENAI_API_KEY").ok(),
        };
        let model = env::var("LLM_MODEL")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(|| default_model(provider).to_string());

        EngineConfig {
            provider,
            model,
            api_key,
            llm_only: llm_only_from(env::var("LLM_ONLY").ok().as_deref()),
        }
    }

    /// Heuristic-only wiring: no oracle, no enforcement. Used by tests and
    /// offline demos.
    pub fn offline() -> Self {
        EngineConfig {
            provider: OracleProviderType::OpenAI,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            api_key: None,
            llm_only: false,
        }
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key
            .as_deref()
            .map_or(false, |key| !key.trim().is_empty())
    }

    /// Whether a planning failure must surface instead of falling back.
    /// A configured key opts into enforcement even when `LLM_ONLY` is off.
    pub fn oracle_required(&self) -> bool {
        self.llm_only || self.has_credentials()
    }

    pub fn oracle_config(&self) -> OracleConfig {
        OracleConfig {
            provider_type: self.provider,
            model: self.model.clone(),
            api_key: self.api_key.clone(),
            base_url: None,
            timeout_seconds: None,
        }
    }
}
