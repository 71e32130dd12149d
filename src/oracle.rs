//! LLM provider abstraction.
//!
//! One async trait covers every oracle call the engine makes: strict-JSON
//! generation (planner, classifier) and free text (explainer). Providers are
//! deliberately dumb transports; the contract lives in the return type:
//! missing credentials or unparseable content are `Ok(None)` so callers
//! degrade to their heuristics, and only transport-level failures (request
//! errors, non-2xx) surface as `Err`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::OracleError;

/// Supported oracle backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OracleProviderType {
    /// Deterministic canned responses, for tests.
    #[serde(rename = "stub")]
    Stub,
    #[serde(rename = "openai")]
    OpenAI,
    #[serde(rename = "gemini")]
    Gemini,
}

/// Provider wiring; threaded through from `EngineConfig`, never interpreted
/// beyond selection and credentials.
#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub provider_type: OracleProviderType,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl OracleConfig {
    pub fn has_credentials(&self) -> bool {
        self.api_key
            .as_deref()
            .map_or(false, |key| !key.trim().is_empty())
    }
}

/// Information about an oracle provider.
#[derive(Debug, Clone)]
pub struct OracleInfo {
    pub name: String,
    pub model: String,
}

/// Abstract interface for text/JSON oracles.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Request strict JSON. `Ok(None)` means "no usable answer this call".
    async fn generate_json(&self, prompt: &str) -> Result<Option<Value>, OracleError>;

    /// Request free text.
    async fn generate_text(&self, prompt: &str) -> Result<Option<String>, OracleError>;

    fn info(&self) -> OracleInfo;
}

fn content_hash(text: &str) -> String {
    format!("{:x}", Sha256::digest(text.as_bytes()))
}

/// Pull the first JSON object out of a model reply, tolerating markdown
/// fences and prose around it.
fn extract_json(raw: &str) -> Option<Value> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&raw[start..=end]).ok()
}

const JSON_TEMPERATURE: f64 = 0.0;
const TEXT_TEMPERATURE: f64 = 0.2;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

fn build_client(timeout_seconds: Option<u64>) -> Result<reqwest::Client, OracleError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(
            timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS),
        ))
        .build()
        .map_err(|e| OracleError::Transport(format!("failed to create HTTP client: {e}")))
}

async fn failure_from_response(response: reqwest::Response) -> OracleError {
    let status = response.status().as_u16();
    let snippet: String = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown error".to_string())
        .chars()
        .take(200)
        .collect();
    OracleError::Http { status, snippet }
}

#[derive(Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<OpenAIResponseFormat>,
}

#[derive(Serialize)]
struct OpenAIResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
}

/// OpenAI-compatible chat-completions provider (works with any endpoint
/// honoring the same wire shape via `base_url`).
pub struct OpenAILlmProvider {
    config: OracleConfig,
    client: reqwest::Client,
}

impl OpenAILlmProvider {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let client = build_client(config.timeout_seconds)?;
        Ok(Self { config, client })
    }

    async fn request(&self, prompt: &str, json_mode: bool) -> Result<Option<String>, OracleError> {
        let Some(api_key) = self.config.api_key.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if api_key.is_empty() {
            return Ok(None);
        }

        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1");
        let url = format!("{base_url}/chat/completions");

        let request_body = OpenAIRequest {
            model: self.config.model.clone(),
            messages: vec![OpenAIMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: if json_mode { JSON_TEMPERATURE } else { TEXT_TEMPERATURE },
            response_format: json_mode.then(|| OpenAIResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };

        debug!(
            model = %self.config.model,
            json_mode,
            prompt_sha = %content_hash(prompt),
            "openai oracle request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {api_key}"))
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| OracleError::Transport(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }

        let body: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Transport(format!("failed to read response body: {e}")))?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content);
        if let Some(ref text) = content {
            debug!(response_sha = %content_hash(text), "openai oracle response");
        }
        Ok(content)
    }
}

#[async_trait]
impl LlmProvider for OpenAILlmProvider {
    async fn generate_json(&self, prompt: &str) -> Result<Option<Value>, OracleError> {
        Ok(self
            .request(prompt, true)
            .await?
            .as_deref()
            .and_then(extract_json))
    }

    async fn generate_text(&self, prompt: &str) -> Result<Option<String>, OracleError> {
        self.request(prompt, false).await
    }

    fn info(&self) -> OracleInfo {
        OracleInfo {
            name: "OpenAI".to_string(),
            model: self.config.model.clone(),
        }
    }
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Serialize, Deserialize, Default)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Serialize)]
struct GeminiGenerationConfig {
    temperature: f64,
    #[serde(rename = "responseMimeType", skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
}

#[derive(Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: GeminiContent,
}

/// Google Gemini `generateContent` provider. The key travels in the query
/// string, JSON mode via `responseMimeType`.
pub struct GeminiLlmProvider {
    config: OracleConfig,
    client: reqwest::Client,
}

impl GeminiLlmProvider {
    pub fn new(config: OracleConfig) -> Result<Self, OracleError> {
        let client = build_client(config.timeout_seconds)?;
        Ok(Self { config, client })
    }

    async fn request(&self, prompt: &str, json_mode: bool) -> Result<Option<String>, OracleError> {
        let Some(api_key) = self.config.api_key.as_deref().map(str::trim) else {
            return Ok(None);
        };
        if api_key.is_empty() {
            return Ok(None);
        }

        let base_url = self
            .config
            .base_url
            .as_deref()
            .unwrap_or("https://generativelanguage.googleapis.com/v1beta");
        let url = format!(
            "{base_url}/models/{}:generateContent?key={api_key}",
            self.config.model
        );

        let request_body = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: if json_mode { JSON_TEMPERATURE } else { TEXT_TEMPERATURE },
                response_mime_type: json_mode.then(|| "application/json".to_string()),
            },
        };

        debug!(
            model = %self.config.model,
            json_mode,
            prompt_sha = %content_hash(prompt),
            "gemini oracle request"
        );

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&request_body)
            .send()
            .await
            .map_err(|e| OracleError::Transport(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(failure_from_response(response).await);
        }

        let body: GeminiResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Transport(format!("failed to read response body: {e}")))?;

        let content = body
            .candidates
            .into_iter()
            .next()
            .and_then(|candidate| candidate.content.parts.into_iter().next())
            .map(|part| part.text);
        if let Some(ref text) = content {
            debug!(response_sha = %content_hash(text), "gemini oracle response");
        }
        Ok(content)
    }
}

#[async_trait]
impl LlmProvider for GeminiLlmProvider {
    async fn generate_json(&self, prompt: &str) -> Result<Option<Value>, OracleError> {
        Ok(self
            .request(prompt, true)
            .await?
            .as_deref()
            .and_then(extract_json))
    }

    async fn generate_text(&self, prompt: &str) -> Result<Option<String>, OracleError> {
        self.request(prompt, false).await
    }

    fn info(&self) -> OracleInfo {
        OracleInfo {
            name: "Gemini".to_string(),
            model: self.config.model.clone(),
        }
    }
}

/// Canned-response provider for tests and credential-less runs.
#[derive(Default)]
pub struct StubLlmProvider {
    pub json: Option<Value>,
    pub text: Option<String>,
    pub error: Option<String>,
}

impl StubLlmProvider {
    /// Always answers `Ok(None)`, the "oracle absent" shape.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_json(json: Value) -> Self {
        Self {
            json: Some(json),
            ..Self::default()
        }
    }

    pub fn with_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    /// Simulates a transport failure on every call.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }
}

#[async_trait]
impl LlmProvider for StubLlmProvider {
    async fn generate_json(&self, _prompt: &str) -> Result<Option<Value>, OracleError> {
        match &self.error {
            Some(message) => Err(OracleError::Transport(message.clone())),
            None => Ok(self.json.clone()),
        }
    }

    async fn generate_text(&self, _prompt: &str) -> Result<Option<String>, OracleError> {
        match &self.error {
            Some(message) => Err(OracleError::Transport(message.clone())),
            None => Ok(self.text.clone()),
        }
    }

    fn info(&self) -> OracleInfo {
        OracleInfo {
            name: "Stub".to_string(),
            model: "stub-model".to_string(),
        }
    }
}

/// Factory selecting a provider implementation from configuration.
pub struct OracleFactory;

impl OracleFactory {
    pub fn create(config: OracleConfig) -> Result<Box<dyn LlmProvider>, OracleError> {
        match config.provider_type {
            OracleProviderType::Stub => Ok(Box::new(StubLlmProvider::empty())),
            OracleProviderType::OpenAI => Ok(Box::new(OpenAILlmProvider::new(config)?)),
            OracleProviderType::Gemini => Ok(Box::new(GeminiLlmProvider::new(config)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extract_json_reads_plain_objects() {
        let value = extract_json(r#"{"a": 1}"#).unwrap();
        assert_eq!(value, json!({"a": 1}));
    }

    #[test]
    fn extract_json_strips_markdown_fences() {
        let raw = "```json\n{\"intent_type\": \"rollback\"}\n```";
        let value = extract_json(raw).unwrap();
        assert_eq!(value, json!({"intent_type": "rollback"}));
    }

    #[test]
    fn extract_json_tolerates_surrounding_prose() {
        let raw = "Here is the plan:\n{\"operations\": []}\nHope that helps!";
        assert_eq!(extract_json(raw), Some(json!({"operations": []})));
    }

    #[test]
    fn extract_json_rejects_non_json() {
        assert_eq!(extract_json("no braces here"), None);
        assert_eq!(extract_json("} backwards {"), None);
        assert_eq!(extract_json("{not json}"), None);
    }

    #[tokio::test]
    async fn stub_returns_canned_json() {
        let stub = StubLlmProvider::with_json(json!({"title": "X"}));
        let out = stub.generate_json("ignored").await.unwrap();
        assert_eq!(out, Some(json!({"title": "X"})));
        assert_eq!(stub.generate_text("ignored").await.unwrap(), None);
    }

    #[tokio::test]
    async fn stub_empty_behaves_like_missing_credentials() {
        let stub = StubLlmProvider::empty();
        assert_eq!(stub.generate_json("p").await.unwrap(), None);
        assert_eq!(stub.generate_text("p").await.unwrap(), None);
    }

    #[tokio::test]
    async fn stub_failing_surfaces_transport_error() {
        let stub = StubLlmProvider::failing("connection refused");
        let err = stub.generate_json("p").await.unwrap_err();
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn missing_key_means_no_credentials() {
        let config = OracleConfig {
            provider_type: OracleProviderType::OpenAI,
            model: "gpt-4.1-mini".to_string(),
            api_key: Some("   ".to_string()),
            base_url: None,
            timeout_seconds: None,
        };
        assert!(!config.has_credentials());
    }
}
