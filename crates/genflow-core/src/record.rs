//! Prompt records and the store contract that persists them
//!
//! A [`PromptRecord`] is a reusable prompt definition. Records are created and
//! updated through [`PromptStore::save`] and soft-deleted with
//! [`PromptStore::archive`]; nothing in the flow layer deletes them physically.
//! Listing never returns archived records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{GenflowError, GenflowResult};

pub const MSG_SAVED: &str = "提示词保存成功";
pub const MSG_ARCHIVED: &str = "提示词已归档";
pub const MSG_NOT_FOUND: &str = "未找到指定的提示词";
pub const MSG_SAVE_FAILED: &str = "保存提示词失败";
pub const MSG_ARCHIVE_FAILED: &str = "归档提示词失败";

/// Who a prompt is available to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptScope {
    #[default]
    General,
    /// Bound to a single tenant, see [`PromptRecord::tenant_id`]
    Exclusive,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_model: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scenario: Option<String>,
}

impl PromptMetadata {
    fn merge(&mut self, patch: PromptMetadata) {
        if patch.recommended_model.is_some() {
            self.recommended_model = patch.recommended_model;
        }
        if patch.constraints.is_some() {
            self.constraints = patch.constraints;
        }
        if patch.scenario.is_some() {
            self.scenario = patch.scenario;
        }
    }
}

/// Stored, reusable prompt definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptRecord {
    pub id: String,
    pub name: String,
    pub scope: PromptScope,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instructions: Option<String>,

    pub user_prompt: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PromptMetadata>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[serde(default)]
    pub archived: bool,
}

impl PromptRecord {
    /// Build a fresh record from a patch; missing fields take their defaults
    pub fn create(patch: PromptPatch, now: DateTime<Utc>) -> Self {
        let mut record = Self {
            id: patch
                .id
                .clone()
                .unwrap_or_else(|| Uuid::new_v4().to_string()),
            name: String::new(),
            scope: PromptScope::General,
            tenant_id: None,
            system_instructions: None,
            user_prompt: String::new(),
            context: None,
            negative_prompt: None,
            metadata: None,
            created_at: now,
            updated_at: now,
            archived: false,
        };
        record.apply(patch, now);
        record
    }

    /// Apply only the fields present in `patch` and refresh `updated_at`
    pub fn apply(&mut self, patch: PromptPatch, now: DateTime<Utc>) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(scope) = patch.scope {
            self.scope = scope;
        }
        if patch.tenant_id.is_some() {
            self.tenant_id = patch.tenant_id;
        }
        if patch.system_instructions.is_some() {
            self.system_instructions = patch.system_instructions;
        }
        if let Some(user_prompt) = patch.user_prompt {
            self.user_prompt = user_prompt;
        }
        if patch.context.is_some() {
            self.context = patch.context;
        }
        if patch.negative_prompt.is_some() {
            self.negative_prompt = patch.negative_prompt;
        }
        if let Some(metadata) = patch.metadata {
            self.metadata.get_or_insert_with(PromptMetadata::default).merge(metadata);
        }
        if self.scope == PromptScope::General {
            self.tenant_id = None;
        }
        self.updated_at = now;
    }

    pub fn archive(&mut self, now: DateTime<Utc>) {
        self.archived = true;
        self.updated_at = now;
    }
}

/// Save input: every field optional, only supplied fields are written
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<PromptScope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instructions: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negative_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<PromptMetadata>,
}

impl PromptPatch {
    pub fn new(name: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            user_prompt: Some(user_prompt.into()),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_scope(mut self, scope: PromptScope) -> Self {
        self.scope = Some(scope);
        self
    }
}

/// `{id, success, message}` returned by the save path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub success: bool,
    pub message: String,
}

/// `{success, message}` returned by the archive path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
}

/// Records visible to `list`: unarchived, newest update first, ties by id
pub fn visible_in_order(records: impl IntoIterator<Item = PromptRecord>) -> Vec<PromptRecord> {
    let mut visible: Vec<PromptRecord> = records.into_iter().filter(|r| !r.archived).collect();
    visible.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then_with(|| a.id.cmp(&b.id)));
    visible
}

/// Persistence for the `prompts` collection
///
/// Backends provide per-write atomicity only; two saves racing on the same id
/// resolve last-write-wins.
#[async_trait]
pub trait PromptStore: Send + Sync {
    /// Unarchived records ordered by `updated_at` descending
    async fn list(&self) -> GenflowResult<Vec<PromptRecord>>;

    /// Create (no id) or partially update (existing id) a record, returning its id
    ///
    /// Fails with [`GenflowError::NotFound`] when `patch.id` names no record.
    async fn save(&self, patch: PromptPatch) -> GenflowResult<String>;

    /// Mark a record archived; [`GenflowError::NotFound`] if it does not exist
    async fn archive(&self, id: &str) -> GenflowResult<()>;

    /// Connectivity check
    async fn ping(&self) -> GenflowResult<()>;

    fn backend_name(&self) -> &'static str;

    /// `save` translated into the `{id, success, message}` result shape
    async fn save_record(&self, patch: PromptPatch) -> SaveOutcome {
        match self.save(patch).await {
            Ok(id) => SaveOutcome {
                id: Some(id),
                success: true,
                message: MSG_SAVED.to_string(),
            },
            Err(GenflowError::NotFound(id)) => {
                tracing::warn!("save on missing prompt {}", id);
                SaveOutcome {
                    id: None,
                    success: false,
                    message: format!("{}：{}", MSG_SAVE_FAILED, MSG_NOT_FOUND),
                }
            }
            Err(e) => {
                tracing::warn!("prompt save failed: {}", e);
                SaveOutcome {
                    id: None,
                    success: false,
                    message: format!("{}：{}", MSG_SAVE_FAILED, e),
                }
            }
        }
    }

    /// `archive` translated into the `{success, message}` result shape
    async fn archive_record(&self, id: &str) -> ActionOutcome {
        match self.archive(id).await {
            Ok(()) => ActionOutcome {
                success: true,
                message: MSG_ARCHIVED.to_string(),
            },
            Err(GenflowError::NotFound(_)) => ActionOutcome {
                success: false,
                message: MSG_NOT_FOUND.to_string(),
            },
            Err(e) => {
                tracing::warn!("prompt archive failed for {}: {}", id, e);
                ActionOutcome {
                    success: false,
                    message: format!("{}：{}", MSG_ARCHIVE_FAILED, e),
                }
            }
        }
    }
}
