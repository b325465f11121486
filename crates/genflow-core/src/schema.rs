//! Schema declarations for flow inputs and outputs
//!
//! Every flow declares an [`ObjectSchema`] for its input and one for its
//! output. A schema is a list of named fields, each with a [`FieldType`]
//! and an optional marker. Schemas can:
//!
//! - validate a JSON value, aggregating every violation into one
//!   [`GenflowError::SchemaValidation`]
//! - coerce a loosely shaped model response towards the declared shape
//! - render themselves as JSON Schema for structured model output
//!
//! # Examples
//!
//! ```rust
//! use genflow_core::schema::{FieldType, ObjectSchema};
//! use serde_json::json;
//!
//! let schema = ObjectSchema::new()
//!     .required("query", FieldType::string())
//!     .optional("maxResults", FieldType::integer_range(1, 20));
//!
//! assert!(schema.validate(&json!({"query": "solar panels"})).is_ok());
//! assert!(schema.validate(&json!({"maxResults": 50})).is_err());
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{FieldViolation, GenflowError, GenflowResult};
use crate::media::DataUri;

/// Type of a single schema field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FieldType {
    String,
    /// String holding a `data:<mime>;base64,<payload>` URI
    DataUri,
    Number {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    Boolean,
    Enum {
        values: Vec<String>,
    },
    Array {
        items: Box<FieldType>,
    },
    Object(ObjectSchema),
    /// Anything goes; passed through untouched
    Any,
}

impl FieldType {
    pub fn string() -> Self {
        Self::String
    }

    pub fn data_uri() -> Self {
        Self::DataUri
    }

    pub fn number() -> Self {
        Self::Number { min: None, max: None }
    }

    pub fn number_range(min: f64, max: f64) -> Self {
        Self::Number {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn integer() -> Self {
        Self::Integer { min: None, max: None }
    }

    pub fn integer_range(min: i64, max: i64) -> Self {
        Self::Integer {
            min: Some(min),
            max: Some(max),
        }
    }

    pub fn boolean() -> Self {
        Self::Boolean
    }

    pub fn enumeration<S: AsRef<str>>(values: &[S]) -> Self {
        Self::Enum {
            values: values.iter().map(|v| v.as_ref().to_string()).collect(),
        }
    }

    pub fn array_of(items: FieldType) -> Self {
        Self::Array {
            items: Box::new(items),
        }
    }

    pub fn object(schema: ObjectSchema) -> Self {
        Self::Object(schema)
    }

    pub fn any() -> Self {
        Self::Any
    }

    /// Short name used in violation messages and `describe` output
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::DataUri => "data-uri",
            Self::Number { .. } => "number",
            Self::Integer { .. } => "integer",
            Self::Boolean => "boolean",
            Self::Enum { .. } => "enum",
            Self::Array { .. } => "array",
            Self::Object(_) => "object",
            Self::Any => "any",
        }
    }

    fn check(&self, value: &Value, path: &str, out: &mut Vec<FieldViolation>) {
        match self {
            Self::Any => {}
            Self::String => {
                if !value.is_string() {
                    out.push(mismatch(path, "string", value));
                }
            }
            Self::DataUri => match value.as_str() {
                Some(s) => {
                    if let Err(e) = DataUri::parse(s) {
                        out.push(FieldViolation::new(path, e.to_string()));
                    }
                }
                None => out.push(mismatch(path, "data URI string", value)),
            },
            Self::Boolean => {
                if !value.is_boolean() {
                    out.push(mismatch(path, "boolean", value));
                }
            }
            Self::Number { min, max } => match value.as_f64() {
                Some(n) => check_range(n, *min, *max, path, out),
                None => out.push(mismatch(path, "number", value)),
            },
            Self::Integer { min, max } => match as_integer(value) {
                Some(n) => check_range(
                    n as f64,
                    min.map(|m| m as f64),
                    max.map(|m| m as f64),
                    path,
                    out,
                ),
                None => out.push(mismatch(path, "integer", value)),
            },
            Self::Enum { values } => match value.as_str() {
                Some(s) if values.iter().any(|v| v == s) => {}
                Some(s) => out.push(FieldViolation::new(
                    path,
                    format!("'{}' is not one of [{}]", s, values.join(", ")),
                )),
                None => out.push(mismatch(path, "enum string", value)),
            },
            Self::Array { items } => match value.as_array() {
                Some(elements) => {
                    for (i, element) in elements.iter().enumerate() {
                        items.check(element, &format!("{}[{}]", path, i), out);
                    }
                }
                None => out.push(mismatch(path, "array", value)),
            },
            Self::Object(schema) => schema.check(value, path, out),
        }
    }

    fn coerce(&self, value: Value) -> Value {
        match (self, value) {
            (Self::String, Value::Number(n)) => Value::String(n.to_string()),
            (Self::String, Value::Bool(b)) => Value::String(b.to_string()),
            (Self::Number { .. }, Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(n) => Number::from_f64(n).map(Value::Number).unwrap_or(Value::String(s)),
                Err(_) => Value::String(s),
            },
            (Self::Integer { .. }, Value::String(s)) => match s.trim().parse::<i64>() {
                Ok(n) => Value::from(n),
                Err(_) => Value::String(s),
            },
            (Self::Integer { .. }, Value::Number(n)) => match n.as_f64() {
                Some(f) if n.as_i64().is_none() && f.fract() == 0.0 => Value::from(f as i64),
                _ => Value::Number(n),
            },
            (Self::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Value::Bool(true),
                "false" => Value::Bool(false),
                _ => Value::String(s),
            },
            (Self::Enum { values }, Value::String(s)) => {
                let trimmed = s.trim();
                values
                    .iter()
                    .find(|v| v.eq_ignore_ascii_case(trimmed))
                    .map(|v| Value::String(v.clone()))
                    .unwrap_or(Value::String(s))
            }
            (Self::Array { items }, Value::Array(elements)) => {
                Value::Array(elements.into_iter().map(|e| items.coerce(e)).collect())
            }
            (Self::Array { items }, scalar) if !scalar.is_null() => {
                Value::Array(vec![items.coerce(scalar)])
            }
            (Self::Object(schema), value) => schema.coerce(value),
            (_, value) => value,
        }
    }

    fn to_json_schema(&self) -> Value {
        match self {
            Self::String => serde_json::json!({ "type": "string" }),
            Self::DataUri => serde_json::json!({
                "type": "string",
                "description": "data URI: data:<mime-type>;base64,<payload>"
            }),
            Self::Number { min, max } => {
                let mut schema = serde_json::json!({ "type": "number" });
                if let Some(min) = min {
                    schema["minimum"] = serde_json::json!(min);
                }
                if let Some(max) = max {
                    schema["maximum"] = serde_json::json!(max);
                }
                schema
            }
            Self::Integer { min, max } => {
                let mut schema = serde_json::json!({ "type": "integer" });
                if let Some(min) = min {
                    schema["minimum"] = serde_json::json!(min);
                }
                if let Some(max) = max {
                    schema["maximum"] = serde_json::json!(max);
                }
                schema
            }
            Self::Boolean => serde_json::json!({ "type": "boolean" }),
            Self::Enum { values } => serde_json::json!({ "type": "string", "enum": values }),
            Self::Array { items } => serde_json::json!({
                "type": "array",
                "items": items.to_json_schema()
            }),
            Self::Object(schema) => schema.to_json_schema(),
            Self::Any => serde_json::json!({}),
        }
    }
}

/// A named field of an object schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,

    #[serde(flatten)]
    pub field_type: FieldType,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Field {
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            optional: false,
            description: None,
        }
    }

    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            optional: true,
            ..Self::required(name, field_type)
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Ordered set of named fields describing a JSON object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectSchema {
    #[serde(default)]
    pub fields: Vec<Field>,
}

impl ObjectSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    pub fn required(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field(Field::required(name, field_type))
    }

    pub fn optional(self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.field(Field::optional(name, field_type))
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Validate a value, reporting every offending field at once
    pub fn validate(&self, value: &Value) -> GenflowResult<()> {
        let mut violations = Vec::new();
        self.check(value, "", &mut violations);

        if violations.is_empty() {
            Ok(())
        } else {
            Err(GenflowError::SchemaValidation(violations))
        }
    }

    fn check(&self, value: &Value, path: &str, out: &mut Vec<FieldViolation>) {
        let Some(object) = value.as_object() else {
            let at = if path.is_empty() { "$" } else { path };
            out.push(mismatch(at, "object", value));
            return;
        };

        for field in &self.fields {
            let field_path = join_path(path, &field.name);
            match object.get(&field.name) {
                None | Some(Value::Null) => {
                    if !field.optional {
                        out.push(FieldViolation::new(field_path, "required field is missing"));
                    }
                }
                Some(v) => field.field_type.check(v, &field_path, out),
            }
        }
    }

    /// Nudge a model response towards this schema
    ///
    /// Numeric and boolean strings become numbers and booleans, enum values
    /// are matched case-insensitively, a scalar where an array is declared is
    /// wrapped, and `null` optional fields are dropped. Required fields are
    /// never invented; run [`validate`](Self::validate) afterwards.
    pub fn coerce(&self, value: Value) -> Value {
        let Value::Object(mut object) = value else {
            return value;
        };

        for field in &self.fields {
            match object.remove(&field.name) {
                Some(Value::Null) if field.optional => {}
                Some(v) => {
                    object.insert(field.name.clone(), field.field_type.coerce(v));
                }
                None => {}
            }
        }

        Value::Object(object)
    }

    /// JSON Schema rendition, used as the model's response schema
    pub fn to_json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for field in &self.fields {
            let mut property = field.field_type.to_json_schema();
            if let (Some(desc), Some(obj)) = (&field.description, property.as_object_mut()) {
                obj.insert("description".to_string(), Value::String(desc.clone()));
            }
            properties.insert(field.name.clone(), property);
            if !field.optional {
                required.push(Value::String(field.name.clone()));
            }
        }

        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required
        })
    }

    /// System prompt instructions asking for JSON shaped like this schema
    pub fn to_system_instructions(&self) -> String {
        let mut instructions = String::from(
            "You MUST format your response as structured JSON matching this schema:\n\n",
        );

        instructions.push_str(&format!(
            "Schema:\n{}\n\n",
            serde_json::to_string_pretty(&self.to_json_schema()).unwrap_or_default()
        ));

        instructions.push_str(
            "Respond ONLY with valid JSON matching this schema. Do not include any explanation or markdown formatting.",
        );

        instructions
    }
}

fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", parent, name)
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(path: &str, expected: &str, value: &Value) -> FieldViolation {
    FieldViolation::new(
        path,
        format!("expected {}, got {}", expected, json_type(value)),
    )
}

fn as_integer(value: &Value) -> Option<i64> {
    value.as_i64().or_else(|| {
        value
            .as_f64()
            .filter(|f| f.fract() == 0.0 && f.is_finite())
            .map(|f| f as i64)
    })
}

fn check_range(n: f64, min: Option<f64>, max: Option<f64>, path: &str, out: &mut Vec<FieldViolation>) {
    if let Some(min) = min {
        if n < min {
            out.push(FieldViolation::new(path, format!("{} is below minimum {}", n, min)));
            return;
        }
    }
    if let Some(max) = max {
        if n > max {
            out.push(FieldViolation::new(path, format!("{} is above maximum {}", n, max)));
        }
    }
}
