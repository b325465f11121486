use anyhow::{bail, Result};
use genflow_runtime::Runtime;

use super::print_json;

/// Print store connectivity; fails when the store is unreachable
pub async fn execute(runtime: &Runtime) -> Result<()> {
    let report = runtime.health().await;
    print_json(&report)?;
    if !report.connected {
        bail!("store '{}' is not reachable", report.store);
    }
    Ok(())
}
