// genflow Core - Error types
//
// One error enum shared by every crate in the workspace. Generative flows
// surface model failures as `FlowExecution`; record flows translate store
// failures into `{success, message}` results before they reach the caller.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result alias used across genflow
pub type GenflowResult<T> = Result<T, GenflowError>;

/// A single schema violation, addressed by its field path (`modules[1].name`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldViolation {
    pub path: String,
    pub reason: String,
}

impl FieldViolation {
    pub fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for FieldViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.reason)
    }
}

fn join_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum GenflowError {
    /// Caller-supplied value does not match a declared schema
    #[error("schema validation failed: {}", join_violations(.0))]
    SchemaValidation(Vec<FieldViolation>),

    /// Prompt template references something the flow input does not declare
    #[error("template error: {0}")]
    Template(String),

    #[error("model backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("model returned an empty response: {0}")]
    EmptyResponse(String),

    #[error("model returned a malformed response: {0}")]
    MalformedResponse(String),

    #[error("flow '{flow}' failed: {cause}")]
    FlowExecution {
        flow: String,
        #[source]
        cause: Box<GenflowError>,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("flow '{0}' is already defined")]
    DuplicateFlow(String),

    #[error("unknown flow: {0}")]
    UnknownFlow(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GenflowError {
    pub fn template(msg: impl Into<String>) -> Self {
        Self::Template(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::BackendUnavailable(msg.into())
    }

    pub fn empty(msg: impl Into<String>) -> Self {
        Self::EmptyResponse(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Wrap a failure that happened inside a flow body
    pub fn flow(flow: impl Into<String>, cause: GenflowError) -> Self {
        Self::FlowExecution {
            flow: flow.into(),
            cause: Box::new(cause),
        }
    }

    /// Field paths named by a schema validation failure, looking through `FlowExecution`
    pub fn violated_fields(&self) -> Vec<&str> {
        match self.root_cause() {
            Self::SchemaValidation(violations) => {
                violations.iter().map(|v| v.path.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }

    /// Innermost cause, unwrapping `FlowExecution`
    pub fn root_cause(&self) -> &GenflowError {
        match self {
            Self::FlowExecution { cause, .. } => cause.root_cause(),
            other => other,
        }
    }

    /// Whether a caller-side retry could succeed. This layer never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.root_cause(),
            Self::BackendUnavailable(_) | Self::StoreUnavailable(_)
        )
    }
}
