//! Supplier analysis
//!
//! Scores a CSV supplier dataset. With a live model backend the model ranks
//! the rows; without one the fixed rule table in
//! [`genflow_core::supplier`] does, so results keep their category buckets.

use async_trait::async_trait;
use genflow_core::supplier::{parse_dataset, score_rows};
use genflow_core::{FieldType, GenflowResult, ObjectSchema};
use serde_json::{json, Value};
use tracing::info;

use super::ANALYZE_SUPPLIERS;
use crate::engine::{define_flow, Flow, FlowBody, FlowContext, FlowDefinition, FlowHandler};

pub fn analyze_suppliers() -> GenflowResult<Flow> {
    let input = ObjectSchema::new()
        .required("dataset", FieldType::string())
        .optional("criteria", FieldType::string());

    let supplier = ObjectSchema::new()
        .required("supplier", FieldType::string())
        .required("category", FieldType::string())
        .optional("product", FieldType::string())
        .required("score", FieldType::integer_range(0, 100))
        .optional("date", FieldType::string());
    let output = ObjectSchema::new()
        .required("suppliers", FieldType::array_of(FieldType::object(supplier)))
        .optional("summary", FieldType::string());

    let definition = FlowDefinition::new(ANALYZE_SUPPLIERS, input, output)
        .with_description("Score suppliers in a CSV dataset by category match")
        .with_template(
            "Score each supplier in this CSV dataset from 0 to 100 for how well it \
             matches our sourcing needs.\n\
             Criteria: {{criteria}}\n\n\
             Electronics, software and technology suppliers score 70-95, home \
             appliances and related services 50-70, everything else 10-40. \
             Normalize dates to YYYY-MM-DD.\n\n\
             {{dataset}}",
        )?
        .with_stub(json!({ "suppliers": [] }));

    define_flow(definition, FlowBody::custom(SupplierAnalysis))
}

struct SupplierAnalysis;

#[async_trait]
impl FlowHandler for SupplierAnalysis {
    async fn run(&self, flow: &Flow, ctx: &FlowContext, input: Value) -> GenflowResult<Value> {
        let dataset = input.get("dataset").and_then(Value::as_str).unwrap_or_default();
        let rows = parse_dataset(dataset)?;

        if ctx.has_model() {
            info!("Scoring {} suppliers with the model", rows.len());
            return flow.generate(ctx, &input).await;
        }

        info!("Scoring {} suppliers with the rule table", rows.len());
        let scored = score_rows(rows);
        let summary = format!("按规则表评分 {} 家供应商", scored.len());
        Ok(json!({ "suppliers": scored, "summary": summary }))
    }
}
