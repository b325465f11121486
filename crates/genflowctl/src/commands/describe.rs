use anyhow::Result;
use genflow_runtime::Runtime;

use super::print_json;

/// Print a flow definition: schemas, template, model and binding
pub fn execute(runtime: &Runtime, name: &str) -> Result<()> {
    let flow = runtime.flow(name)?;
    let mut description = serde_json::to_value(flow.definition())?;
    if let Some(object) = description.as_object_mut() {
        object.insert("shape".to_string(), serde_json::to_value(flow.shape())?);
        object.insert("mode".to_string(), serde_json::to_value(flow.mode())?);
        if let Some(model) = flow.target_model() {
            object.insert("model".to_string(), model.into());
        }
    }
    print_json(&description)
}
