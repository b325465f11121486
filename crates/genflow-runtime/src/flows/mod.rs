//! Built-in flow catalog

pub mod generative;
pub mod prompts;
pub mod suppliers;

use genflow_core::GenflowResult;

use crate::engine::Flow;

pub const GENERATE_SCENARIO_ARCHITECTURE: &str = "generateScenarioArchitecture";
pub const IDENTIFY_OBJECTS: &str = "identifyObjects";
pub const INTELLIGENT_SEARCH: &str = "intelligentSearch";
pub const ANALYZE_SUPPLIERS: &str = "analyzeSuppliers";
pub const GENERATE_IMAGE: &str = "generateImage";
pub const GENERATE_3D_MODEL: &str = "generate3DModel";
pub const GENERATE_PROMPT: &str = "generatePrompt";
pub const LIST_PROMPTS: &str = "listPrompts";
pub const SAVE_PROMPT: &str = "savePrompt";
pub const ARCHIVE_PROMPT: &str = "archivePrompt";

/// 1x1 transparent PNG answered by stubbed image flows
pub(crate) const PLACEHOLDER_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

/// Every built-in flow, in catalog order
pub fn builtin_flows() -> GenflowResult<Vec<Flow>> {
    Ok(vec![
        generative::scenario_architecture()?,
        generative::identify_objects()?,
        generative::intelligent_search()?,
        suppliers::analyze_suppliers()?,
        generative::generate_image()?,
        generative::generate_3d_model()?,
        generative::generate_prompt()?,
        prompts::list_prompts()?,
        prompts::save_prompt()?,
        prompts::archive_prompt()?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FlowShape;

    #[test]
    fn test_catalog_builds() {
        let flows = builtin_flows().unwrap();
        let names: Vec<&str> = flows.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            vec![
                GENERATE_SCENARIO_ARCHITECTURE,
                IDENTIFY_OBJECTS,
                INTELLIGENT_SEARCH,
                ANALYZE_SUPPLIERS,
                GENERATE_IMAGE,
                GENERATE_3D_MODEL,
                GENERATE_PROMPT,
                LIST_PROMPTS,
                SAVE_PROMPT,
                ARCHIVE_PROMPT,
            ]
        );

        let records = flows.iter().filter(|f| f.shape() == FlowShape::Record).count();
        assert_eq!(records, 3);
        assert_eq!(flows[3].shape(), FlowShape::Custom);
    }

    #[test]
    fn test_non_record_flows_have_stubs() {
        for flow in builtin_flows().unwrap() {
            let stubbed = flow.definition().stub_output.is_some();
            assert_eq!(stubbed, flow.shape() != FlowShape::Record, "{}", flow.name());
        }
    }
}
