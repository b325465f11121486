//! Template-to-model flows

use genflow_core::{FieldType, GenerationConfig, GenflowResult, Modality, ObjectSchema};
use serde_json::json;

use super::{
    GENERATE_3D_MODEL, GENERATE_IMAGE, GENERATE_PROMPT, GENERATE_SCENARIO_ARCHITECTURE,
    IDENTIFY_OBJECTS, INTELLIGENT_SEARCH, PLACEHOLDER_PNG,
};
use crate::engine::{define_flow, Flow, FlowBody, FlowDefinition, OutputBinding};

const IMAGE_MODEL: &str = "gemini-2.0-flash-preview-image-generation";

pub fn scenario_architecture() -> GenflowResult<Flow> {
    let input = ObjectSchema::new()
        .required("scenario", FieldType::string())
        .optional("industry", FieldType::string());

    let module = ObjectSchema::new()
        .required("name", FieldType::string())
        .required("description", FieldType::string())
        .optional("capabilities", FieldType::array_of(FieldType::string()));
    let output = ObjectSchema::new()
        .required("title", FieldType::string())
        .required("summary", FieldType::string())
        .required("modules", FieldType::array_of(FieldType::object(module)));

    let definition = FlowDefinition::new(GENERATE_SCENARIO_ARCHITECTURE, input, output)
        .with_description("Break a business scenario into a solution architecture")
        .with_system("You are a solution architect who designs AI-assisted business systems.")
        .with_template(
            "Design a solution architecture for the following business scenario.\n\n\
             Scenario: {{scenario}}\n\
             Industry: {{industry}}\n\n\
             Give the architecture a short title, a one-paragraph summary, and split it \
             into functional modules. Describe what each module does and list its key \
             capabilities.",
        )?
        .with_stub(json!({
            "title": "示例场景架构",
            "summary": "未配置模型后端，返回占位架构。",
            "modules": [
                {"name": "数据接入", "description": "收集并清洗业务数据", "capabilities": ["导入", "校验"]},
                {"name": "智能分析", "description": "对业务数据进行模型分析"},
                {"name": "结果展示", "description": "以报表形式呈现分析结果"}
            ]
        }));

    define_flow(definition, FlowBody::Generate)
}

pub fn identify_objects() -> GenflowResult<Flow> {
    let input = ObjectSchema::new()
        .required("photoDataUri", FieldType::data_uri())
        .optional("hint", FieldType::string());

    let object = ObjectSchema::new()
        .required("name", FieldType::string())
        .required("confidence", FieldType::number_range(0.0, 1.0))
        .optional("description", FieldType::string());
    let output = ObjectSchema::new().required("objects", FieldType::array_of(FieldType::object(object)));

    let definition = FlowDefinition::new(IDENTIFY_OBJECTS, input, output)
        .with_description("List the objects visible in a photo")
        .with_template(
            "Identify every distinct object in this photo. For each object give its name, \
             a confidence between 0 and 1, and a short description.\n\
             {{hint}}\n\
             {{media url=photoDataUri}}",
        )?
        .with_stub(json!({
            "objects": [{"name": "placeholder", "confidence": 0.0}]
        }));

    define_flow(definition, FlowBody::Generate)
}

pub fn intelligent_search() -> GenflowResult<Flow> {
    let input = ObjectSchema::new()
        .required("query", FieldType::string())
        .optional("limit", FieldType::integer_range(1, 20));

    let result = ObjectSchema::new()
        .required("title", FieldType::string())
        .required("snippet", FieldType::string())
        .required("relevance", FieldType::number_range(0.0, 1.0))
        .optional("url", FieldType::string());
    let output = ObjectSchema::new().required("results", FieldType::array_of(FieldType::object(result)));

    let definition = FlowDefinition::new(INTELLIGENT_SEARCH, input, output)
        .with_description("Answer a search query with ranked results")
        .with_template(
            "Search for: {{query}}\n\n\
             Return at most {{limit}} results (10 if no number is given), most relevant \
             first. Each result needs a title, a short snippet and a relevance score \
             between 0 and 1.",
        )?
        .with_stub(json!({ "results": [] }));

    define_flow(definition, FlowBody::Generate)
}

pub fn generate_image() -> GenflowResult<Flow> {
    let input = ObjectSchema::new()
        .required("prompt", FieldType::string())
        .optional("style", FieldType::string())
        .optional("negativePrompt", FieldType::string());
    let output = ObjectSchema::new().required("imageDataUri", FieldType::data_uri());

    let definition = FlowDefinition::new(GENERATE_IMAGE, input, output)
        .with_description("Generate an image from a text prompt")
        .with_template(
            "Generate an image: {{prompt}}\n\
             Style: {{style}}\n\
             Avoid: {{negativePrompt}}",
        )?
        .with_model(IMAGE_MODEL)
        .with_generation(GenerationConfig::default().with_modalities(&[Modality::Text, Modality::Image]))
        .with_binding(OutputBinding::MediaField("imageDataUri".to_string()))
        .with_stub(json!({ "imageDataUri": PLACEHOLDER_PNG }));

    define_flow(definition, FlowBody::Generate)
}

pub fn generate_3d_model() -> GenflowResult<Flow> {
    let input = ObjectSchema::new()
        .required("description", FieldType::string())
        .optional("referenceImageDataUri", FieldType::data_uri());
    let output = ObjectSchema::new().required("previewDataUri", FieldType::data_uri());

    let definition = FlowDefinition::new(GENERATE_3D_MODEL, input, output)
        .with_description("Render a preview image of a 3D model")
        .with_template(
            "Render a studio preview of a 3D model: {{description}}\n\
             Show the model at a three-quarter angle on a neutral background.\n\
             {{media url=referenceImageDataUri}}",
        )?
        .with_model(IMAGE_MODEL)
        .with_generation(GenerationConfig::default().with_modalities(&[Modality::Text, Modality::Image]))
        .with_binding(OutputBinding::MediaField("previewDataUri".to_string()))
        .with_stub(json!({ "previewDataUri": PLACEHOLDER_PNG }));

    define_flow(definition, FlowBody::Generate)
}

pub fn generate_prompt() -> GenflowResult<Flow> {
    let input = ObjectSchema::new()
        .required("goal", FieldType::string())
        .optional("scenario", FieldType::string())
        .optional("targetModel", FieldType::string());

    let output = ObjectSchema::new()
        .required("name", FieldType::string())
        .required("userPrompt", FieldType::string())
        .optional("systemInstructions", FieldType::string())
        .optional("negativePrompt", FieldType::string())
        .optional("recommendedModel", FieldType::string());

    let definition = FlowDefinition::new(GENERATE_PROMPT, input, output)
        .with_description("Draft a reusable prompt for a goal")
        .with_system("You write clear, reusable prompts for generative models.")
        .with_template(
            "Write a reusable prompt that achieves this goal: {{goal}}\n\
             Scenario: {{scenario}}\n\
             Target model: {{targetModel}}\n\n\
             Give the prompt a short name. Add system instructions and a negative \
             prompt when they help.",
        )?
        .with_generation(GenerationConfig::default().with_temperature(0.9))
        .with_stub(json!({
            "name": "示例提示词",
            "userPrompt": "未配置模型后端，返回占位提示词。"
        }));

    define_flow(definition, FlowBody::Generate)
}
