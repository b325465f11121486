//! genflow Runtime - Flow engine and built-in catalog
//!
//! ```rust,no_run
//! use genflow_core::GenflowConfig;
//! use genflow_runtime::Runtime;
//! use serde_json::json;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GenflowConfig::load("genflow.yaml").await?;
//! let runtime = Runtime::from_config(&config).await?;
//! let output = runtime
//!     .call("intelligentSearch", json!({ "query": "solar inverters" }))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod flows;
pub mod registry;
pub mod runtime;

pub use engine::{
    bind_response, define_flow, Flow, FlowBody, FlowContext, FlowDefinition, FlowHandler,
    FlowShape, OutputBinding,
};
pub use flows::builtin_flows;
pub use registry::FlowRegistry;
pub use runtime::{HealthReport, Runtime};
