//! Flow engine
//!
//! A [`Flow`] wires one [`FlowDefinition`] to a body and runs the call
//! pipeline: validate input, short-circuit when stubbed, render and invoke the
//! model (or run a custom body), coerce and validate the output.
//!
//! Input validation failures surface as bare `SchemaValidation` errors.
//! Everything after that point is wrapped in `FlowExecution { flow, cause }`.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use genflow_core::{
    parse_json_payload, FlowMode, GenerationConfig, GenflowError, GenflowResult, Model,
    ModelRequest, ObjectSchema, PromptStore, PromptTemplate, RawResponse,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// How a raw model response maps onto the output schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "field")]
pub enum OutputBinding {
    /// The response is the output object
    Structured,
    /// Free text lands in the named string field
    TextField(String),
    /// A generated image lands in the named data-URI field
    MediaField(String),
}

/// Broad category of a flow, reported by `genflowctl flows`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowShape {
    Generative,
    Custom,
    Record,
}

impl fmt::Display for FlowShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generative => write!(f, "generative"),
            Self::Custom => write!(f, "custom"),
            Self::Record => write!(f, "record"),
        }
    }
}

/// Immutable description of a named flow
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlowDefinition {
    pub name: String,
    pub description: String,
    pub input: ObjectSchema,
    pub output: ObjectSchema,

    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "template_source")]
    pub template: Option<PromptTemplate>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    /// Model id for this flow; the backend default applies when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    pub generation: GenerationConfig,
    pub binding: OutputBinding,

    /// Placeholder answered in stubbed mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stub_output: Option<Value>,
}

fn template_source<S: serde::Serializer>(
    template: &Option<PromptTemplate>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match template {
        Some(t) => serializer.serialize_str(t.source()),
        None => serializer.serialize_none(),
    }
}

impl FlowDefinition {
    pub fn new(name: impl Into<String>, input: ObjectSchema, output: ObjectSchema) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            input,
            output,
            template: None,
            system: None,
            model: None,
            generation: GenerationConfig::default(),
            binding: OutputBinding::Structured,
            stub_output: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Compile `source` against the input schema
    pub fn with_template(mut self, source: &str) -> GenflowResult<Self> {
        let template = PromptTemplate::compile(source, &self.input).map_err(|e| match e {
            GenflowError::Template(msg) => {
                GenflowError::template(format!("flow '{}': {}", self.name, msg))
            }
            other => other,
        })?;
        self.template = Some(template);
        Ok(self)
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_generation(mut self, generation: GenerationConfig) -> Self {
        self.generation = generation;
        self
    }

    pub fn with_binding(mut self, binding: OutputBinding) -> Self {
        self.binding = binding;
        self
    }

    pub fn with_stub(mut self, stub: Value) -> Self {
        self.stub_output = Some(stub);
        self
    }
}

/// Shared collaborators handed to every call
#[derive(Clone)]
pub struct FlowContext {
    model: Option<Arc<dyn Model>>,
    store: Arc<dyn PromptStore>,
}

impl FlowContext {
    pub fn new(model: Option<Arc<dyn Model>>, store: Arc<dyn PromptStore>) -> Self {
        Self { model, store }
    }

    pub fn model(&self) -> Option<&Arc<dyn Model>> {
        self.model.as_ref()
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    pub fn store(&self) -> &Arc<dyn PromptStore> {
        &self.store
    }
}

impl fmt::Debug for FlowContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowContext")
            .field("model", &self.model.as_ref().map(|m| m.config().model.clone()))
            .field("store", &self.store.backend_name())
            .finish()
    }
}

/// Custom flow body, used instead of the template-to-model step
#[async_trait]
pub trait FlowHandler: Send + Sync {
    /// Produce the raw output for already-validated input
    async fn run(&self, flow: &Flow, ctx: &FlowContext, input: Value) -> GenflowResult<Value>;

    fn shape(&self) -> FlowShape {
        FlowShape::Custom
    }
}

#[derive(Clone)]
pub enum FlowBody {
    /// Render the template and invoke the model
    Generate,
    Custom(Arc<dyn FlowHandler>),
}

impl FlowBody {
    pub fn custom(handler: impl FlowHandler + 'static) -> Self {
        Self::Custom(Arc::new(handler))
    }
}

/// A callable, registered flow
#[derive(Clone)]
pub struct Flow {
    definition: Arc<FlowDefinition>,
    body: FlowBody,
    mode: FlowMode,
    model_override: Option<String>,
}

/// Bind a definition to its body
///
/// Generative bodies need a template. A built-in stub output must satisfy the
/// output schema so stubbed mode can never return an invalid value.
pub fn define_flow(definition: FlowDefinition, body: FlowBody) -> GenflowResult<Flow> {
    if matches!(body, FlowBody::Generate) && definition.template.is_none() {
        return Err(GenflowError::template(format!(
            "generative flow '{}' declares no prompt template",
            definition.name
        )));
    }

    if let Some(stub) = &definition.stub_output {
        definition.output.validate(stub).map_err(|e| {
            GenflowError::config(format!("stub output for '{}' is invalid: {}", definition.name, e))
        })?;
    }

    Ok(Flow {
        definition: Arc::new(definition),
        body,
        mode: FlowMode::Live,
        model_override: None,
    })
}

impl Flow {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub fn definition(&self) -> &FlowDefinition {
        &self.definition
    }

    pub fn mode(&self) -> FlowMode {
        self.mode
    }

    pub fn shape(&self) -> FlowShape {
        match &self.body {
            FlowBody::Generate => FlowShape::Generative,
            FlowBody::Custom(handler) => handler.shape(),
        }
    }

    /// Switch mode; stubbed needs a placeholder from the definition or `stub`
    pub fn with_mode(mut self, mode: FlowMode, stub: Option<Value>) -> GenflowResult<Self> {
        if let Some(stub) = stub {
            self.definition.output.validate(&stub).map_err(|e| {
                GenflowError::config(format!("stubOutput for '{}' is invalid: {}", self.name(), e))
            })?;
            Arc::make_mut(&mut self.definition).stub_output = Some(stub);
        }

        if mode == FlowMode::Stubbed && self.definition.stub_output.is_none() {
            return Err(GenflowError::config(format!(
                "flow '{}' has no stub output and cannot run stubbed",
                self.name()
            )));
        }

        self.mode = mode;
        Ok(self)
    }

    /// Replace the model id used for this flow
    pub fn with_model_override(mut self, model: Option<String>) -> Self {
        self.model_override = model;
        self
    }

    /// Model id sent with requests, if any
    pub fn target_model(&self) -> Option<&str> {
        self.model_override
            .as_deref()
            .or(self.definition.model.as_deref())
    }

    /// Run one invocation
    pub async fn call(&self, ctx: &FlowContext, input: Value) -> GenflowResult<Value> {
        let invocation = Uuid::new_v4();
        let span = info_span!("flow", name = %self.name(), invocation = %invocation);
        self.execute(ctx, input).instrument(span).await
    }

    /// Typed wrapper over [`call`](Self::call)
    pub async fn call_typed<I, O>(&self, ctx: &FlowContext, input: &I) -> GenflowResult<O>
    where
        I: Serialize + Sync,
        O: DeserializeOwned,
    {
        let output = self.call(ctx, serde_json::to_value(input)?).await?;
        serde_json::from_value(output).map_err(|e| {
            GenflowError::flow(self.name(), GenflowError::malformed(e.to_string()))
        })
    }

    async fn execute(&self, ctx: &FlowContext, input: Value) -> GenflowResult<Value> {
        if let Err(e) = self.definition.input.validate(&input) {
            info!("Rejected input: {}", e);
            return Err(e);
        }

        if self.mode == FlowMode::Stubbed {
            info!("Answering with stub output");
            return self
                .definition
                .stub_output
                .clone()
                .ok_or_else(|| GenflowError::flow(self.name(), GenflowError::config("missing stub")));
        }

        let raw = match &self.body {
            FlowBody::Generate => self.generate(ctx, &input).await,
            FlowBody::Custom(handler) => handler.run(self, ctx, input).await,
        };

        let raw = match raw {
            Ok(raw) => raw,
            Err(e @ GenflowError::FlowExecution { .. }) => return Err(e),
            Err(e) => {
                warn!("Flow failed: {}", e);
                return Err(GenflowError::flow(self.name(), e));
            }
        };

        let output = self.definition.output.coerce(raw);
        if let Err(e) = self.definition.output.validate(&output) {
            warn!("Output failed schema validation: {}", e);
            return Err(GenflowError::flow(self.name(), e));
        }

        info!("Flow completed");
        Ok(output)
    }

    /// Render the template, call the model and bind the response
    ///
    /// Custom bodies use this to reach the model with the flow's own template.
    pub async fn generate(&self, ctx: &FlowContext, input: &Value) -> GenflowResult<Value> {
        let definition = &self.definition;
        let template = definition.template.as_ref().ok_or_else(|| {
            GenflowError::template(format!("flow '{}' declares no prompt template", definition.name))
        })?;
        let model = ctx
            .model()
            .ok_or_else(|| GenflowError::backend("no model backend is configured"))?;

        let rendered = template.render(input)?;
        debug!(
            "Rendered prompt: {} chars, {} media part(s)",
            rendered.text.len(),
            rendered.media.len()
        );

        let structured = definition.binding == OutputBinding::Structured;
        let system = match (&definition.system, structured) {
            (Some(system), true) => Some(format!(
                "{}\n\n{}",
                system,
                definition.output.to_system_instructions()
            )),
            (None, true) => Some(definition.output.to_system_instructions()),
            (system, false) => system.clone(),
        };

        let request = ModelRequest {
            prompt: rendered.text,
            media: rendered.media,
            model: self.target_model().map(str::to_string),
            system,
            response_schema: structured.then(|| definition.output.to_json_schema()),
            generation: definition.generation.clone(),
        };

        let raw = model.generate(&request).await?;
        debug!("Model answered with {} response", raw.kind());
        bind_response(&definition.binding, raw)
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.definition.name)
            .field("shape", &self.shape())
            .field("mode", &self.mode)
            .finish()
    }
}

/// Map a raw response onto an output value according to the binding
pub fn bind_response(binding: &OutputBinding, raw: RawResponse) -> GenflowResult<Value> {
    match (binding, raw) {
        (OutputBinding::Structured, RawResponse::Structured(value)) => Ok(value),
        (OutputBinding::Structured, RawResponse::Text(text)) => parse_json_payload(&text)
            .ok_or_else(|| GenflowError::malformed("expected a JSON object in the response")),
        (OutputBinding::TextField(field), RawResponse::Text(text)) => {
            Ok(single_field(field, Value::String(text)))
        }
        (OutputBinding::MediaField(field), RawResponse::Media(uri)) => {
            Ok(single_field(field, Value::String(uri.to_string())))
        }
        (binding, raw) => Err(GenflowError::malformed(format!(
            "{} response does not fit {:?} output",
            raw.kind(),
            binding
        ))),
    }
}

fn single_field(name: &str, value: Value) -> Value {
    let mut object = Map::new();
    object.insert(name.to_string(), value);
    Value::Object(object)
}
