//! Simulated prompt store: accepts every write, keeps nothing

use async_trait::async_trait;
use genflow_core::{GenflowResult, PromptPatch, PromptRecord, PromptStore};
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Default)]
pub struct SimulatedStore;

impl SimulatedStore {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PromptStore for SimulatedStore {
    async fn list(&self) -> GenflowResult<Vec<PromptRecord>> {
        Ok(Vec::new())
    }

    async fn save(&self, patch: PromptPatch) -> GenflowResult<String> {
        let id = patch.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        info!(
            "Simulated save of prompt {} (name: {})",
            id,
            patch.name.as_deref().unwrap_or("")
        );
        Ok(id)
    }

    async fn archive(&self, id: &str) -> GenflowResult<()> {
        info!("Simulated archive of prompt {}", id);
        Ok(())
    }

    async fn ping(&self) -> GenflowResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "simulated"
    }
}
