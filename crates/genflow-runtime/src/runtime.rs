//! Runtime - flows, model backend and store assembled from configuration

use std::sync::Arc;

use genflow_core::{FlowMode, GenflowConfig, GenflowError, GenflowResult, Model, PromptStore};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::engine::{Flow, FlowContext, FlowShape};
use crate::flows::builtin_flows;
use crate::registry::FlowRegistry;

/// Store connectivity, as printed by `genflowctl health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub store: String,
    pub connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Default model id, absent when no live backend is configured
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

pub struct Runtime {
    registry: FlowRegistry,
    context: FlowContext,
}

impl Runtime {
    /// Build the model backend, store and flow catalog described by `config`
    pub async fn from_config(config: &GenflowConfig) -> GenflowResult<Self> {
        let model = match config.spec.model.clone() {
            Some(model_config) => Some(genflow_llm::create_model(model_config)?),
            None => {
                info!("No model backend configured; live generative flows will fail");
                None
            }
        };
        let store = genflow_store::create_store(&config.spec.store).await?;

        let flows = builtin_flows()?;
        config.check_flow_names(flows.iter().map(Flow::name))?;

        let registry = FlowRegistry::new();
        for flow in flows {
            registry.define(configure(flow, config)?)?;
        }

        Ok(Self::new(registry, FlowContext::new(model, store)))
    }

    pub fn new(registry: FlowRegistry, context: FlowContext) -> Self {
        Self { registry, context }
    }

    /// Built-in catalog over explicit collaborators, all flows live
    pub fn with_backends(
        model: Option<Arc<dyn Model>>,
        store: Arc<dyn PromptStore>,
    ) -> GenflowResult<Self> {
        let registry = FlowRegistry::new();
        for flow in builtin_flows()? {
            registry.define(flow)?;
        }
        Ok(Self::new(registry, FlowContext::new(model, store)))
    }

    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    pub fn context(&self) -> &FlowContext {
        &self.context
    }

    pub fn flow(&self, name: &str) -> GenflowResult<Arc<Flow>> {
        self.registry.get(name)
    }

    /// Invoke a flow by name
    pub async fn call(&self, name: &str, input: Value) -> GenflowResult<Value> {
        self.registry.get(name)?.call(&self.context, input).await
    }

    pub async fn call_typed<I, O>(&self, name: &str, input: &I) -> GenflowResult<O>
    where
        I: Serialize + Sync,
        O: DeserializeOwned,
    {
        self.registry.get(name)?.call_typed(&self.context, input).await
    }

    pub async fn health(&self) -> HealthReport {
        let store = self.context.store();
        let (connected, error) = match store.ping().await {
            Ok(()) => (true, None),
            Err(e) => {
                warn!("Store health check failed: {}", e);
                (false, Some(e.to_string()))
            }
        };

        HealthReport {
            store: store.backend_name().to_string(),
            connected,
            error,
            model: self.context.model().map(|m| m.config().model.clone()),
        }
    }
}

/// Apply mode and model overrides from configuration to one flow
///
/// Record flows always reach the store; they ignore the default mode and
/// reject an explicit stubbed override.
fn configure(flow: Flow, config: &GenflowConfig) -> GenflowResult<Flow> {
    let name = flow.name().to_string();
    let overrides = config.flow_override(&name).cloned().unwrap_or_default();

    if flow.shape() == FlowShape::Record {
        if overrides.mode == Some(FlowMode::Stubbed) {
            return Err(GenflowError::config(format!(
                "record flow '{}' cannot be stubbed; use the simulated store backend",
                name
            )));
        }
        return Ok(flow);
    }

    flow.with_mode(config.mode_for(&name), overrides.stub_output)
        .map(|flow| flow.with_model_override(overrides.model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::{GENERATE_IMAGE, LIST_PROMPTS, SAVE_PROMPT};
    use serde_json::json;

    #[tokio::test]
    async fn test_from_default_config() {
        let runtime = Runtime::from_config(&GenflowConfig::default()).await.unwrap();
        assert_eq!(runtime.registry().len(), 10);
        assert!(runtime.context().model().is_none());

        let health = runtime.health().await;
        assert!(health.connected);
        assert_eq!(health.store, "memory");
        assert!(health.model.is_none());
    }

    #[tokio::test]
    async fn test_stubbed_default_mode_skips_record_flows() {
        let config = GenflowConfig::from_yaml(
            "kind: FlowConfig\nspec:\n  defaultMode: stubbed\n  flows:\n    generateImage:\n      model: gemini-2.0-flash-exp\n",
        )
        .unwrap();
        let runtime = Runtime::from_config(&config).await.unwrap();

        assert_eq!(runtime.flow(GENERATE_IMAGE).unwrap().mode(), FlowMode::Stubbed);
        assert_eq!(
            runtime.flow(GENERATE_IMAGE).unwrap().target_model(),
            Some("gemini-2.0-flash-exp")
        );
        assert_eq!(runtime.flow(LIST_PROMPTS).unwrap().mode(), FlowMode::Live);

        let saved = runtime
            .call(SAVE_PROMPT, json!({"name": "A", "userPrompt": "hi"}))
            .await
            .unwrap();
        assert_eq!(saved["success"], true);
    }

    #[tokio::test]
    async fn test_stubbing_record_flow_is_config_error() {
        let config = GenflowConfig::from_yaml(
            "kind: FlowConfig\nspec:\n  flows:\n    savePrompt:\n      mode: stubbed\n",
        )
        .unwrap();
        let result = Runtime::from_config(&config).await;
        assert!(matches!(result, Err(GenflowError::Config(_))));
    }

    #[tokio::test]
    async fn test_unknown_override_is_config_error() {
        let config = GenflowConfig::from_yaml(
            "kind: FlowConfig\nspec:\n  flows:\n    generateVideo:\n      mode: stubbed\n",
        )
        .unwrap();
        let result = Runtime::from_config(&config).await;
        assert!(matches!(result, Err(GenflowError::Config(ref m)) if m.contains("generateVideo")));
    }

    #[tokio::test]
    async fn test_unknown_flow_call() {
        let runtime = Runtime::from_config(&GenflowConfig::default()).await.unwrap();
        let err = runtime.call("generateVideo", json!({})).await.unwrap_err();
        assert!(matches!(err, GenflowError::UnknownFlow(_)));
    }
}
