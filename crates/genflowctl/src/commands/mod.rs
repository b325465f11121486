pub mod describe;
pub mod flows;
pub mod health;
pub mod prompts;
pub mod run;

use anyhow::{Context, Result};
use genflow_core::GenflowConfig;
use genflow_runtime::Runtime;
use serde_json::Value;
use std::path::Path;
use tracing::debug;

/// Build the runtime from a config file, or from defaults when none is given
pub async fn load_runtime(config: Option<&Path>) -> Result<Runtime> {
    let config = match config {
        Some(path) => {
            debug!("Loading config from {}", path.display());
            GenflowConfig::load(path)
                .await
                .with_context(|| format!("Failed to load config {}", path.display()))?
        }
        None => {
            debug!("No config given; using in-memory store and no model backend");
            GenflowConfig::default()
        }
    };

    Runtime::from_config(&config)
        .await
        .context("Failed to initialize flows")
}

pub(crate) fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse JSON from inline text or a file; no input means `{}`
pub(crate) async fn read_json(inline: Option<&str>, file: Option<&Path>) -> Result<Value> {
    if let Some(text) = inline {
        return serde_json::from_str(text).context("--input is not valid JSON");
    }
    if let Some(path) = file {
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        return serde_json::from_str(&text)
            .with_context(|| format!("{} is not valid JSON", path.display()));
    }
    Ok(Value::Object(Default::default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_json_sources() {
        assert_eq!(read_json(None, None).await.unwrap(), json!({}));
        assert_eq!(read_json(Some(r#"{"a":1}"#), None).await.unwrap(), json!({"a": 1}));
        assert!(read_json(Some("{oops"), None).await.is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.json");
        std::fs::write(&path, r#"{"query": "pumps"}"#).unwrap();
        assert_eq!(
            read_json(None, Some(&path)).await.unwrap(),
            json!({"query": "pumps"})
        );
        assert!(read_json(None, Some(&dir.path().join("missing.json"))).await.is_err());
    }

    #[tokio::test]
    async fn test_load_runtime_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = dir.path().join("prompts.json");
        let config = dir.path().join("genflow.yaml");
        std::fs::write(
            &config,
            format!(
                "apiVersion: genflow.dev/v1\nkind: FlowConfig\nspec:\n  store:\n    backend: file\n    path: {}\n  defaultMode: stubbed\n",
                store.display()
            ),
        )
        .unwrap();

        let runtime = load_runtime(Some(&config)).await.unwrap();
        assert_eq!(runtime.health().await.store, "file");
        assert!(load_runtime(Some(&dir.path().join("nope.yaml"))).await.is_err());
    }
}
