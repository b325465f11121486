//! genflow Store - Prompt record backends
//!
//! Implementations of [`genflow_core::PromptStore`]:
//!
//! - **InMemoryStore**: DashMap-backed, cleared on restart (default)
//! - **FileStore**: one JSON document file, rewritten on every write
//! - **SimulatedStore**: accepts and logs writes without persisting anything
//!
//! ```rust,no_run
//! use genflow_core::{StoreBackend, StoreConfig};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = genflow_store::create_store(&StoreConfig {
//!     backend: StoreBackend::File,
//!     path: Some("./prompts.json".into()),
//! })
//! .await?;
//! let prompts = store.list().await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;

use std::sync::Arc;

use genflow_core::{GenflowError, GenflowResult, PromptStore, StoreBackend, StoreConfig};

pub use backend::file::FileStore;
pub use backend::memory::InMemoryStore;
pub use backend::simulated::SimulatedStore;

/// Open the backend named by `config`
pub async fn create_store(config: &StoreConfig) -> GenflowResult<Arc<dyn PromptStore>> {
    let store: Arc<dyn PromptStore> = match config.backend {
        StoreBackend::Memory => Arc::new(InMemoryStore::new()),
        StoreBackend::File => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| GenflowError::config("file store requires a path"))?;
            Arc::new(FileStore::open(path).await?)
        }
        StoreBackend::Simulated => Arc::new(SimulatedStore::new()),
    };
    tracing::info!("Using {} prompt store", store.backend_name());
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_store_per_backend() {
        let memory = create_store(&StoreConfig::default()).await.unwrap();
        assert_eq!(memory.backend_name(), "memory");

        let simulated = create_store(&StoreConfig {
            backend: StoreBackend::Simulated,
            path: None,
        })
        .await
        .unwrap();
        assert_eq!(simulated.backend_name(), "simulated");

        let dir = tempfile::tempdir().unwrap();
        let file = create_store(&StoreConfig {
            backend: StoreBackend::File,
            path: Some(dir.path().join("prompts.json")),
        })
        .await
        .unwrap();
        assert_eq!(file.backend_name(), "file");
    }

    #[tokio::test]
    async fn test_file_backend_without_path() {
        let result = create_store(&StoreConfig {
            backend: StoreBackend::File,
            path: None,
        })
        .await;
        assert!(matches!(result, Err(GenflowError::Config(_))));
    }
}
