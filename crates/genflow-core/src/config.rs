// genflow Core - Runtime configuration
//
// Loaded from a YAML resource:
//
//   apiVersion: genflow.dev/v1
//   kind: FlowConfig
//   metadata:
//     name: local
//   spec:
//     model: { provider: google, model: gemini-2.0-flash, apiKey: "${GOOGLE_API_KEY}" }
//     store: { backend: file, path: ./prompts.json }
//     defaultMode: live
//     flows:
//       generateImage: { mode: stubbed }
//
// `${VAR}` references are expanded from the process environment.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GenflowError, GenflowResult};
use crate::model::ModelConfig;

pub const API_VERSION: &str = "genflow.dev/v1";
pub const CONFIG_KIND: &str = "FlowConfig";

/// Whether a flow talks to its backend or answers with a fixed placeholder
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowMode {
    #[default]
    Live,
    Stubbed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Memory,
    File,
    /// Accepts and logs writes without persisting anything
    Simulated,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Document file for the `file` backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

/// Per-flow overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<FlowMode>,

    /// Model id used instead of the flow's own / the backend default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Placeholder returned in stubbed mode, replacing the flow's built-in one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stub_output: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenflowSpec {
    /// Model backend; absent means no live backend is configured
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelConfig>,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub default_mode: FlowMode,

    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub flows: HashMap<String, FlowOverride>,
}

/// Top-level configuration resource
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenflowConfig {
    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_kind")]
    pub kind: String,

    #[serde(default)]
    pub metadata: ConfigMetadata,

    #[serde(default)]
    pub spec: GenflowSpec,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    CONFIG_KIND.to_string()
}

impl Default for GenflowConfig {
    fn default() -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: ConfigMetadata::default(),
            spec: GenflowSpec::default(),
        }
    }
}

impl GenflowConfig {
    /// Parse YAML, expand `${VAR}` references and validate
    pub fn from_yaml(content: &str) -> GenflowResult<Self> {
        let deserializer = serde_yaml::Deserializer::from_str(content);
        let mut config: GenflowConfig = serde_path_to_error::deserialize(deserializer)
            .map_err(|e| GenflowError::config(format!("invalid config at '{}': {}", e.path(), e.inner())))?;

        config.expand_env_vars();
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: impl AsRef<Path>) -> GenflowResult<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            GenflowError::config(format!("failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&content)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Expand environment variables in configuration values
    pub fn expand_env_vars(&mut self) {
        if let Some(model) = self.spec.model.as_mut() {
            model.model = expand_env_var(&model.model);
            model.endpoint = model.endpoint.as_deref().map(expand_env_var);
            model.api_key = model.api_key.as_deref().map(expand_env_var).filter(|key| {
                let resolved = !key.contains("${") && !key.is_empty();
                if !resolved {
                    tracing::warn!("Model apiKey references an unset environment variable");
                }
                resolved
            });
            for value in model.headers.values_mut() {
                *value = expand_env_var(value);
            }
        }

        if let Some(path) = self.spec.store.path.as_ref() {
            let expanded = expand_env_var(&path.to_string_lossy());
            self.spec.store.path = Some(PathBuf::from(expanded));
        }
    }

    pub fn validate(&self) -> GenflowResult<()> {
        if self.kind != CONFIG_KIND {
            return Err(GenflowError::config(format!(
                "expected kind '{}', got '{}'",
                CONFIG_KIND, self.kind
            )));
        }

        if let Some(model) = &self.spec.model {
            if model.model.trim().is_empty() {
                return Err(GenflowError::config("spec.model.model must not be empty"));
            }
            if model.timeout_secs == 0 {
                return Err(GenflowError::config("spec.model.timeoutSecs must be greater than 0"));
            }
        }

        if self.spec.store.backend == StoreBackend::File && self.spec.store.path.is_none() {
            return Err(GenflowError::config("spec.store.path is required for the file backend"));
        }

        for (name, flow) in &self.spec.flows {
            if let Some(model) = &flow.model {
                if model.trim().is_empty() {
                    return Err(GenflowError::config(format!(
                        "spec.flows.{}.model must not be empty",
                        name
                    )));
                }
            }
        }

        Ok(())
    }

    /// Reject overrides for flows the registry does not know
    pub fn check_flow_names<'a>(&self, known: impl IntoIterator<Item = &'a str>) -> GenflowResult<()> {
        let known: Vec<&str> = known.into_iter().collect();
        let mut unknown: Vec<&str> = self
            .spec
            .flows
            .keys()
            .map(String::as_str)
            .filter(|name| !known.contains(name))
            .collect();
        unknown.sort_unstable();

        if unknown.is_empty() {
            Ok(())
        } else {
            Err(GenflowError::config(format!(
                "overrides name unknown flows: {}",
                unknown.join(", ")
            )))
        }
    }

    pub fn flow_override(&self, name: &str) -> Option<&FlowOverride> {
        self.spec.flows.get(name)
    }

    /// Effective mode for a flow
    pub fn mode_for(&self, name: &str) -> FlowMode {
        self.flow_override(name)
            .and_then(|o| o.mode)
            .unwrap_or(self.spec.default_mode)
    }
}

/// `${NAME}` with a shell-style variable name
fn env_reference() -> Option<&'static Regex> {
    static ENV_REFERENCE: OnceLock<Option<Regex>> = OnceLock::new();
    ENV_REFERENCE
        .get_or_init(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").ok())
        .as_ref()
}

/// Substitute set variables in one pass; unset references stay verbatim
fn expand_env_var(value: &str) -> String {
    let Some(re) = env_reference() else {
        return value.to_string();
    };

    re.replace_all(value, |caps: &Captures| {
        std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
    })
    .into_owned()
}
