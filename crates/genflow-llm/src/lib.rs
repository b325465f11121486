//! genflow LLM - Model invokers
//!
//! Adapters from the provider-neutral [`genflow_core::Model`] contract to
//! concrete generative backends.

pub mod provider;

use std::sync::Arc;

use genflow_core::{GenflowError, GenflowResult, Model, ModelConfig, ModelProvider};

/// Build a model backend for the configured provider
pub fn create_model(config: ModelConfig) -> GenflowResult<Arc<dyn Model>> {
    tracing::debug!("Creating {} model backend for {}", config.provider, config.model);
    match config.provider {
        #[cfg(feature = "google")]
        ModelProvider::Google => Ok(Arc::new(provider::google::GoogleProvider::create(config)?)),
        #[allow(unreachable_patterns)]
        other => Err(GenflowError::config(format!(
            "provider '{}' is not enabled in this build",
            other
        ))),
    }
}
