//! FlowRegistry - process-wide set of named flows
//!
//! Built once at startup; names are unique.

use std::sync::Arc;

use dashmap::DashMap;
use genflow_core::{GenflowError, GenflowResult};
use tracing::info;

use crate::engine::Flow;

#[derive(Default)]
pub struct FlowRegistry {
    flows: DashMap<String, Arc<Flow>>,
}

impl FlowRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a flow; a name that is already taken is a `DuplicateFlow` error
    pub fn define(&self, flow: Flow) -> GenflowResult<Arc<Flow>> {
        let name = flow.name().to_string();
        match self.flows.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(GenflowError::DuplicateFlow(name)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                let flow = Arc::new(flow);
                slot.insert(flow.clone());
                info!("Registered flow: {} ({}, {:?})", name, flow.shape(), flow.mode());
                Ok(flow)
            }
        }
    }

    /// Look up a flow by name
    pub fn get(&self, name: &str) -> GenflowResult<Arc<Flow>> {
        self.flows
            .get(name)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| GenflowError::UnknownFlow(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.flows.contains_key(name)
    }

    /// All flow names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.flows.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// All flows, sorted by name
    pub fn list(&self) -> Vec<Arc<Flow>> {
        let mut flows: Vec<Arc<Flow>> = self.flows.iter().map(|e| e.value().clone()).collect();
        flows.sort_by(|a, b| a.name().cmp(b.name()));
        flows
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}
