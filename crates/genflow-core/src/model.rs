// genflow Core - Model invocation contract
//
// A `Model` turns one rendered prompt (plus optional inline media) into one
// `RawResponse`. Implementations are stateless request/response boundaries;
// they never retry and never touch shared state.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::media::DataUri;
use crate::GenflowResult;

/// Supported model providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    Google,
}

impl std::fmt::Display for ModelProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Google => write!(f, "google"),
        }
    }
}

/// Connection settings for a model backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelConfig {
    pub provider: ModelProvider,

    /// Default model id, e.g. `gemini-2.0-flash`
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Override the provider's base URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_timeout_secs() -> u64 {
    60
}

impl ModelConfig {
    pub fn google(model: impl Into<String>) -> Self {
        Self {
            provider: ModelProvider::Google,
            model: model.into(),
            api_key: None,
            endpoint: None,
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_timeout_secs(),
            headers: HashMap::new(),
        }
    }
}

/// Output modality a flow asks the model for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Modality {
    Text,
    Image,
}

/// Per-flow generation settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_modalities: Vec<Modality>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    pub fn with_modalities(mut self, modalities: &[Modality]) -> Self {
        self.response_modalities = modalities.to_vec();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn wants_image(&self) -> bool {
        self.response_modalities.contains(&Modality::Image)
    }
}

/// One request to a model backend
#[derive(Debug, Clone, Default)]
pub struct ModelRequest {
    pub prompt: String,
    pub media: Vec<DataUri>,

    /// Overrides the backend's default model id
    pub model: Option<String>,
    pub system: Option<String>,

    /// JSON Schema the response must follow; `None` for free text or media
    pub response_schema: Option<Value>,
    pub generation: GenerationConfig,
}

impl ModelRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn wants_structured(&self) -> bool {
        self.response_schema.is_some()
    }
}

/// What a model sent back, before any schema checks
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    Text(String),
    Structured(Value),
    Media(DataUri),
}

impl RawResponse {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Structured(_) => "structured",
            Self::Media(_) => "media",
        }
    }
}

/// Pull a JSON document out of model text, tolerating markdown code fences
/// and prose around a single top-level object or array
pub fn parse_json_payload(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```JSON"))
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.trim_end().strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();

    if let Ok(value) = serde_json::from_str(unfenced) {
        return Some(value);
    }

    let start = unfenced.find(['{', '['])?;
    let end = unfenced.rfind(['}', ']'])?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&unfenced[start..=end]).ok()
}

/// Generative model backend
#[async_trait]
pub trait Model: Send + Sync {
    /// Execute one request
    async fn generate(&self, request: &ModelRequest) -> GenflowResult<RawResponse>;

    fn config(&self) -> &ModelConfig;

    fn provider(&self) -> ModelProvider {
        self.config().provider
    }
}
