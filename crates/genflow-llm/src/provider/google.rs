//! Google Gemini provider
//!
//! Calls `models/{model}:generateContent` on the Generative Language API.
//! Structured output uses `responseMimeType: application/json` plus a
//! `responseSchema`; image output asks for the `IMAGE` response modality and
//! returns the first inline image as a data URI.

use async_trait::async_trait;
use genflow_core::{
    parse_json_payload, DataUri, GenflowError, GenflowResult, Model, ModelConfig, ModelProvider,
    ModelRequest, RawResponse,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_KEY_ENV_VARS: &[&str] = &["GOOGLE_API_KEY", "GEMINI_API_KEY"];

/// Gemini model backend
pub struct GoogleProvider {
    config: ModelConfig,
    client: Client,
    api_key: String,
    endpoint: String,
}

impl GoogleProvider {
    /// Build a provider; the API key comes from config or `GOOGLE_API_KEY`
    pub fn create(config: ModelConfig) -> GenflowResult<Self> {
        let api_key = config
            .api_key
            .clone()
            .or_else(|| API_KEY_ENV_VARS.iter().find_map(|v| std::env::var(v).ok()))
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                GenflowError::config("Google API key not set (apiKey or GOOGLE_API_KEY)")
            })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenflowError::config(format!("Failed to build HTTP client: {}", e)))?;

        let endpoint = config
            .endpoint
            .clone()
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            config,
            client,
            api_key,
            endpoint,
        })
    }

    fn build_body(&self, request: &ModelRequest) -> GenerateContentRequest {
        let mut parts = vec![Part::text(request.prompt.clone())];
        for media in &request.media {
            parts.push(Part::inline(media));
        }

        let generation = &request.generation;
        let mut generation_config = GenerationSettings {
            temperature: Some(generation.temperature.unwrap_or(self.config.temperature)),
            max_output_tokens: generation.max_output_tokens.or(self.config.max_tokens),
            response_mime_type: None,
            response_schema: None,
            response_modalities: None,
        };

        if !generation.response_modalities.is_empty() {
            generation_config.response_modalities = Some(
                generation
                    .response_modalities
                    .iter()
                    .map(|m| match m {
                        genflow_core::Modality::Text => "TEXT".to_string(),
                        genflow_core::Modality::Image => "IMAGE".to_string(),
                    })
                    .collect(),
            );
        }

        if let Some(schema) = &request.response_schema {
            generation_config.response_mime_type = Some("application/json".to_string());
            generation_config.response_schema = Some(to_gemini_schema(schema));
        }

        GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            system_instruction: request.system.as_ref().map(|s| Content {
                role: None,
                parts: vec![Part::text(s.clone())],
            }),
            generation_config,
        }
    }
}

#[async_trait]
impl Model for GoogleProvider {
    async fn generate(&self, request: &ModelRequest) -> GenflowResult<RawResponse> {
        let model = request.model.as_deref().unwrap_or(&self.config.model);
        let url = format!("{}/models/{}:generateContent", self.endpoint, model);
        let body = self.build_body(request);

        debug!(
            "Gemini request: model={} media={} structured={}",
            model,
            request.media.len(),
            request.wants_structured()
        );

        let mut http = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body);
        for (name, value) in &self.config.headers {
            http = http.header(name.as_str(), value.as_str());
        }

        let response = http
            .send()
            .await
            .map_err(|e| GenflowError::backend(format!("request to {} failed: {}", model, e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GenflowError::backend(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(GenflowError::backend(format!(
                "Gemini returned {}: {}",
                status,
                truncate(&text, 500)
            )));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| GenflowError::malformed(format!("undecodable Gemini response: {}", e)))?;

        interpret(parsed, request)
    }

    fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn provider(&self) -> ModelProvider {
        ModelProvider::Google
    }
}

/// Map a decoded Gemini response onto the requested response kind
fn interpret(response: GenerateContentResponse, request: &ModelRequest) -> GenflowResult<RawResponse> {
    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "no candidates".to_string());
        return Err(GenflowError::empty(reason));
    };

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    let mut text = String::new();
    let mut images = Vec::new();
    for part in parts {
        if let Some(t) = part.text {
            text.push_str(&t);
        }
        if let Some(blob) = part.inline_data {
            images.push(blob);
        }
    }

    if request.generation.wants_image() {
        let blob = images.into_iter().next().ok_or_else(|| {
            GenflowError::empty(format!(
                "no image in response (finishReason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ))
        })?;
        let uri = DataUri::from_base64(blob.mime_type, &blob.data)
            .map_err(|e| GenflowError::malformed(e.to_string()))?;
        return Ok(RawResponse::Media(uri));
    }

    if text.trim().is_empty() {
        return Err(GenflowError::empty(format!(
            "blank text (finishReason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    if request.wants_structured() {
        return parse_json_payload(&text)
            .map(RawResponse::Structured)
            .ok_or_else(|| GenflowError::malformed(format!("expected JSON, got: {}", truncate(&text, 200))));
    }

    Ok(RawResponse::Text(text))
}

/// Gemini's schema dialect: upper-case type names, no empty schemas
pub fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) if map.is_empty() => serde_json::json!({ "type": "STRING" }),
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                let converted = match key.as_str() {
                    "type" => Value::String(value.as_str().unwrap_or("string").to_uppercase()),
                    "items" => to_gemini_schema(value),
                    "properties" => match value {
                        Value::Object(props) => Value::Object(
                            props
                                .iter()
                                .map(|(k, v)| (k.clone(), to_gemini_schema(v)))
                                .collect(),
                        ),
                        other => other.clone(),
                    },
                    _ => value.clone(),
                };
                out.insert(key.clone(), converted);
            }
            Value::Object(out)
        }
        other => other.clone(),
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

// Wire types

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    generation_config: GenerationSettings,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<Blob>,
}

impl Part {
    fn text(text: String) -> Self {
        Self {
            text: Some(text),
            inline_data: None,
        }
    }

    fn inline(media: &DataUri) -> Self {
        Self {
            text: None,
            inline_data: Some(Blob {
                mime_type: media.mime_type().to_string(),
                data: media.base64_payload(),
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use genflow_core::{GenerationConfig, Modality};
    use serde_json::json;

    fn provider() -> GoogleProvider {
        let mut config = ModelConfig::google("gemini-2.0-flash");
        config.api_key = Some("test-api-key".to_string());
        GoogleProvider::create(config).unwrap()
    }

    fn response(value: Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_body_carries_media_and_schema() {
        let request = ModelRequest {
            prompt: "What is in this photo?".to_string(),
            media: vec![DataUri::new("image/png", b"png".to_vec())],
            system: Some("Be brief.".to_string()),
            response_schema: Some(json!({
                "type": "object",
                "properties": {"objects": {"type": "array", "items": {"type": "string"}}},
                "required": ["objects"]
            })),
            ..Default::default()
        };

        let body = serde_json::to_value(provider().build_body(&request)).unwrap();
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "What is in this photo?");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "cG5n");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "Be brief.");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(body["generationConfig"]["responseSchema"]["type"], "OBJECT");
        assert_eq!(
            body["generationConfig"]["responseSchema"]["properties"]["objects"]["items"]["type"],
            "STRING"
        );
        assert!(body["generationConfig"].get("responseModalities").is_none());
    }

    #[test]
    fn test_body_requests_image_modality() {
        let request = ModelRequest {
            prompt: "a red bicycle".to_string(),
            generation: GenerationConfig::default()
                .with_modalities(&[Modality::Text, Modality::Image])
                .with_temperature(0.2),
            ..Default::default()
        };
        let body = serde_json::to_value(provider().build_body(&request)).unwrap();
        assert_eq!(body["generationConfig"]["responseModalities"], json!(["TEXT", "IMAGE"]));
        let temperature = body["generationConfig"]["temperature"].as_f64().unwrap();
        assert!((temperature - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_interpret_structured() {
        let request = ModelRequest {
            response_schema: Some(json!({"type": "object"})),
            ..ModelRequest::new("x")
        };
        let raw = interpret(
            response(json!({
                "candidates": [{
                    "content": {"parts": [{"text": "```json\n{\"title\": \"Farm\"}\n```"}]},
                    "finishReason": "STOP"
                }]
            })),
            &request,
        )
        .unwrap();
        assert_eq!(raw, RawResponse::Structured(json!({"title": "Farm"})));
    }

    #[test]
    fn test_interpret_malformed_json() {
        let request = ModelRequest {
            response_schema: Some(json!({"type": "object"})),
            ..ModelRequest::new("x")
        };
        let err = interpret(
            response(json!({"candidates": [{"content": {"parts": [{"text": "sorry, no"}]}}]})),
            &request,
        )
        .unwrap_err();
        assert!(matches!(err, GenflowError::MalformedResponse(_)));
    }

    #[test]
    fn test_interpret_empty() {
        let request = ModelRequest::new("x");
        let err = interpret(
            response(json!({"promptFeedback": {"blockReason": "SAFETY"}})),
            &request,
        )
        .unwrap_err();
        assert!(matches!(err, GenflowError::EmptyResponse(ref m) if m == "SAFETY"));

        let err = interpret(
            response(json!({"candidates": [{"content": {"parts": [{"text": "  "}]}}]})),
            &request,
        )
        .unwrap_err();
        assert!(matches!(err, GenflowError::EmptyResponse(_)));
    }

    #[test]
    fn test_interpret_image() {
        let request = ModelRequest {
            generation: GenerationConfig::default().with_modalities(&[Modality::Image]),
            ..ModelRequest::new("x")
        };
        let raw = interpret(
            response(json!({"candidates": [{"content": {"parts": [
                {"text": "Here is your image"},
                {"inlineData": {"mimeType": "image/png", "data": "aGVsbG8="}}
            ]}}]})),
            &request,
        )
        .unwrap();
        match raw {
            RawResponse::Media(uri) => assert_eq!(uri.to_string(), "data:image/png;base64,aGVsbG8="),
            other => panic!("expected media, got {:?}", other),
        }

        let err = interpret(
            response(json!({"candidates": [{"content": {"parts": [{"text": "no can do"}]}}]})),
            &request,
        )
        .unwrap_err();
        assert!(matches!(err, GenflowError::EmptyResponse(_)));
    }

    #[test]
    fn test_gemini_schema_replaces_empty() {
        let converted = to_gemini_schema(&json!({
            "type": "object",
            "properties": {"anything": {}},
            "required": ["anything"]
        }));
        assert_eq!(converted["properties"]["anything"]["type"], "STRING");
        assert_eq!(converted["required"], json!(["anything"]));
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("供应商分析", 2), "供应");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
