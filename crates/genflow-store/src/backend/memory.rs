//! In-memory prompt store

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use genflow_core::{
    visible_in_order, GenflowError, GenflowResult, PromptPatch, PromptRecord, PromptStore,
};
use std::sync::Arc;
use tracing::debug;

/// Ephemeral store over a concurrent map, keyed by record id
#[derive(Clone, Default)]
pub struct InMemoryStore {
    records: Arc<DashMap<String, PromptRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total records, archived ones included
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Raw lookup that ignores the archived flag
    pub fn get(&self, id: &str) -> Option<PromptRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }
}

#[async_trait]
impl PromptStore for InMemoryStore {
    async fn list(&self) -> GenflowResult<Vec<PromptRecord>> {
        Ok(visible_in_order(
            self.records.iter().map(|entry| entry.value().clone()),
        ))
    }

    async fn save(&self, patch: PromptPatch) -> GenflowResult<String> {
        let now = Utc::now();
        match patch.id.clone() {
            Some(id) => {
                let mut record = self
                    .records
                    .get_mut(&id)
                    .ok_or_else(|| GenflowError::not_found(id.clone()))?;
                record.apply(patch, now);
                debug!("Updated prompt {}", id);
                Ok(id)
            }
            None => {
                let record = PromptRecord::create(patch, now);
                let id = record.id.clone();
                self.records.insert(id.clone(), record);
                debug!("Created prompt {}", id);
                Ok(id)
            }
        }
    }

    async fn archive(&self, id: &str) -> GenflowResult<()> {
        let mut record = self
            .records
            .get_mut(id)
            .ok_or_else(|| GenflowError::not_found(id))?;
        record.archive(Utc::now());
        Ok(())
    }

    async fn ping(&self) -> GenflowResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
