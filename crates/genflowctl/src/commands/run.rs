use anyhow::Result;
use genflow_runtime::Runtime;
use std::path::Path;

use super::{print_json, read_json};

pub async fn execute(
    runtime: &Runtime,
    flow: &str,
    input: Option<&str>,
    input_file: Option<&Path>,
) -> Result<()> {
    let input = read_json(input, input_file).await?;
    let output = runtime.call(flow, input).await?;
    print_json(&output)
}
