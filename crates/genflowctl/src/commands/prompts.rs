use anyhow::Result;
use genflow_runtime::flows::{ARCHIVE_PROMPT, LIST_PROMPTS, SAVE_PROMPT};
use genflow_runtime::Runtime;
use serde_json::{json, Value};

use super::{print_json, read_json};
use crate::cli::PromptsCommands;

pub async fn execute(runtime: &Runtime, command: PromptsCommands) -> Result<()> {
    let output = dispatch(runtime, command).await?;
    print_json(&output)
}

async fn dispatch(runtime: &Runtime, command: PromptsCommands) -> Result<Value> {
    let output = match command {
        PromptsCommands::List => runtime.call(LIST_PROMPTS, json!({})).await?,
        PromptsCommands::Save { file } => {
            let patch = read_json(None, Some(&file)).await?;
            runtime.call(SAVE_PROMPT, patch).await?
        }
        PromptsCommands::Archive { id } => runtime.call(ARCHIVE_PROMPT, json!({ "id": id })).await?,
    };
    Ok(output)
}
