// genflow Core - Foundation types and contracts
//
// Schemas, templates, media, model and store contracts shared by the
// invoker, store and runtime crates.

pub mod config;
pub mod error;
pub mod media;
pub mod model;
pub mod record;
pub mod schema;
pub mod supplier;
pub mod template;

pub use config::{
    ConfigMetadata, FlowMode, FlowOverride, GenflowConfig, GenflowSpec, StoreBackend, StoreConfig,
};
pub use error::{FieldViolation, GenflowError, GenflowResult};
pub use media::{DataUri, DataUriError};
pub use model::{
    parse_json_payload, GenerationConfig, Modality, Model, ModelConfig, ModelProvider, ModelRequest,
    RawResponse,
};
pub use record::{
    visible_in_order, ActionOutcome, PromptMetadata, PromptPatch, PromptRecord, PromptScope,
    PromptStore, SaveOutcome, MSG_ARCHIVED, MSG_ARCHIVE_FAILED, MSG_NOT_FOUND, MSG_SAVED,
    MSG_SAVE_FAILED,
};
pub use schema::{Field, FieldType, ObjectSchema};
pub use supplier::{CategoryClass, SupplierRecord, SupplierRow};
pub use template::{PromptTemplate, RenderedPrompt};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
