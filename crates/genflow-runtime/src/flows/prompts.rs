//! Prompt record flows
//!
//! These bypass the model and talk to the [`PromptStore`](genflow_core::PromptStore).
//! Save and archive always answer `{success, message}`; listing raises
//! store failures because it has no sensible fallback value.

use async_trait::async_trait;
use genflow_core::{
    FieldType, FieldViolation, GenflowError, GenflowResult, ObjectSchema, PromptPatch,
};
use serde_json::{json, Value};

use super::{ARCHIVE_PROMPT, LIST_PROMPTS, SAVE_PROMPT};
use crate::engine::{
    define_flow, Flow, FlowBody, FlowContext, FlowDefinition, FlowHandler, FlowShape,
};

const SCOPES: &[&str] = &["general", "exclusive"];

fn metadata_schema() -> ObjectSchema {
    ObjectSchema::new()
        .optional("recommendedModel", FieldType::string())
        .optional("constraints", FieldType::string())
        .optional("scenario", FieldType::string())
}

fn record_schema() -> ObjectSchema {
    ObjectSchema::new()
        .required("id", FieldType::string())
        .required("name", FieldType::string())
        .required("scope", FieldType::enumeration(SCOPES))
        .optional("tenantId", FieldType::string())
        .optional("systemInstructions", FieldType::string())
        .required("userPrompt", FieldType::string())
        .optional("context", FieldType::string())
        .optional("negativePrompt", FieldType::string())
        .optional("metadata", FieldType::object(metadata_schema()))
        .required("createdAt", FieldType::string())
        .required("updatedAt", FieldType::string())
        .optional("archived", FieldType::boolean())
}

fn patch_schema() -> ObjectSchema {
    ObjectSchema::new()
        .optional("id", FieldType::string())
        .optional("name", FieldType::string())
        .optional("scope", FieldType::enumeration(SCOPES))
        .optional("tenantId", FieldType::string())
        .optional("systemInstructions", FieldType::string())
        .optional("userPrompt", FieldType::string())
        .optional("context", FieldType::string())
        .optional("negativePrompt", FieldType::string())
        .optional("metadata", FieldType::object(metadata_schema()))
}

fn action_schema() -> ObjectSchema {
    ObjectSchema::new()
        .required("success", FieldType::boolean())
        .required("message", FieldType::string())
}

pub fn list_prompts() -> GenflowResult<Flow> {
    let definition = FlowDefinition::new(
        LIST_PROMPTS,
        ObjectSchema::new(),
        ObjectSchema::new().required("prompts", FieldType::array_of(FieldType::object(record_schema()))),
    )
    .with_description("List unarchived prompts, most recently updated first");

    define_flow(definition, FlowBody::custom(ListPrompts))
}

pub fn save_prompt() -> GenflowResult<Flow> {
    let definition = FlowDefinition::new(
        SAVE_PROMPT,
        patch_schema(),
        action_schema().optional("id", FieldType::string()),
    )
    .with_description("Create a prompt, or update the supplied fields of an existing one");

    define_flow(definition, FlowBody::custom(SavePrompt))
}

pub fn archive_prompt() -> GenflowResult<Flow> {
    let definition = FlowDefinition::new(
        ARCHIVE_PROMPT,
        ObjectSchema::new().required("id", FieldType::string()),
        action_schema(),
    )
    .with_description("Archive a prompt so it no longer appears in listings");

    define_flow(definition, FlowBody::custom(ArchivePrompt))
}

struct ListPrompts;

#[async_trait]
impl FlowHandler for ListPrompts {
    async fn run(&self, _flow: &Flow, ctx: &FlowContext, _input: Value) -> GenflowResult<Value> {
        let prompts = ctx.store().list().await?;
        Ok(json!({ "prompts": prompts }))
    }

    fn shape(&self) -> FlowShape {
        FlowShape::Record
    }
}

struct SavePrompt;

#[async_trait]
impl FlowHandler for SavePrompt {
    async fn run(&self, _flow: &Flow, ctx: &FlowContext, input: Value) -> GenflowResult<Value> {
        let patch: PromptPatch = serde_json::from_value(input).map_err(|e| {
            GenflowError::SchemaValidation(vec![FieldViolation::new("$", e.to_string())])
        })?;
        let outcome = ctx.store().save_record(patch).await;
        Ok(serde_json::to_value(outcome)?)
    }

    fn shape(&self) -> FlowShape {
        FlowShape::Record
    }
}

struct ArchivePrompt;

#[async_trait]
impl FlowHandler for ArchivePrompt {
    async fn run(&self, _flow: &Flow, ctx: &FlowContext, input: Value) -> GenflowResult<Value> {
        let id = input.get("id").and_then(Value::as_str).unwrap_or_default();
        let outcome = ctx.store().archive_record(id).await;
        Ok(serde_json::to_value(outcome)?)
    }

    fn shape(&self) -> FlowShape {
        FlowShape::Record
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use genflow_core::{MSG_ARCHIVED, MSG_NOT_FOUND, MSG_SAVED};
    use genflow_store::InMemoryStore;
    use std::sync::Arc;

    fn context() -> FlowContext {
        FlowContext::new(None, Arc::new(InMemoryStore::new()))
    }

    #[tokio::test]
    async fn test_save_list_archive() {
        let ctx = context();
        let saved = save_prompt()
            .unwrap()
            .call(&ctx, json!({"name": "A", "scope": "general", "userPrompt": "hi"}))
            .await
            .unwrap();
        assert_eq!(saved["success"], true);
        assert_eq!(saved["message"], MSG_SAVED);
        let id = saved["id"].as_str().unwrap().to_string();

        let listed = list_prompts().unwrap().call(&ctx, json!({})).await.unwrap();
        let prompts = listed["prompts"].as_array().unwrap();
        assert_eq!(prompts.len(), 1);
        assert_eq!(prompts[0]["name"], "A");
        assert_eq!(prompts[0]["archived"], false);

        let archived = archive_prompt().unwrap().call(&ctx, json!({"id": id})).await.unwrap();
        assert_eq!(archived, json!({"success": true, "message": MSG_ARCHIVED}));

        let listed = list_prompts().unwrap().call(&ctx, json!({})).await.unwrap();
        assert_eq!(listed, json!({"prompts": []}));
    }

    #[tokio::test]
    async fn test_archive_unknown_is_result_not_error() {
        let ctx = context();
        let result = archive_prompt()
            .unwrap()
            .call(&ctx, json!({"id": "missing"}))
            .await
            .unwrap();
        assert_eq!(result, json!({"success": false, "message": MSG_NOT_FOUND}));
    }

    #[tokio::test]
    async fn test_save_rejects_unknown_scope() {
        let ctx = context();
        let err = save_prompt()
            .unwrap()
            .call(&ctx, json!({"name": "A", "scope": "private"}))
            .await
            .unwrap_err();
        assert_eq!(err.violated_fields(), vec!["scope"]);
        assert!(ctx.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_save_creates_record() {
        let ctx = context();
        let saved = save_prompt().unwrap().call(&ctx, json!({})).await.unwrap();
        assert_eq!(saved["success"], true);
        assert!(saved["id"].as_str().is_some());
    }
}
