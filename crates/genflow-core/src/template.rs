//! Prompt templates with flat variable substitution
//!
//! Two placeholder forms are understood:
//!
//! - `{{name}}` substitutes the top-level input field `name`
//! - `{{media url=name}}` attaches the data URI held in `name` as an inline
//!   media part instead of interpolating it as text
//!
//! Templates are compiled against the flow's input schema, so a placeholder
//! naming an undeclared field fails when the flow is defined, never at call
//! time.

use regex::Regex;
use serde_json::Value;

use crate::error::{FieldViolation, GenflowError, GenflowResult};
use crate::media::DataUri;
use crate::schema::{FieldType, ObjectSchema};

const PLACEHOLDER: &str = r"\{\{(.*?)\}\}";
const VARIABLE: &str = r"^\s*([A-Za-z_][A-Za-z0-9_]*)\s*$";
const MEDIA: &str = r"^\s*media\s+url\s*=\s*([A-Za-z_][A-Za-z0-9_]*)\s*$";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Text(String),
    Variable(String),
    Media(String),
}

/// A compiled prompt template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

/// Output of rendering: prompt text plus media parts in template order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub text: String,
    pub media: Vec<DataUri>,
}

impl PromptTemplate {
    /// Parse `source` and check every placeholder against `input`
    pub fn compile(source: impl Into<String>, input: &ObjectSchema) -> GenflowResult<Self> {
        let source = source.into();
        let placeholder = compile_regex(PLACEHOLDER)?;
        let variable = compile_regex(VARIABLE)?;
        let media = compile_regex(MEDIA)?;

        let mut segments = Vec::new();
        let mut cursor = 0;

        for caps in placeholder.captures_iter(&source) {
            let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if whole.start() > cursor {
                segments.push(Segment::Text(source[cursor..whole.start()].to_string()));
            }
            cursor = whole.end();

            let inner = inner.as_str();
            if let Some(name) = media.captures(inner).and_then(|c| c.get(1)) {
                let name = name.as_str();
                match input.get(name) {
                    Some(field) if field.field_type == FieldType::DataUri => {
                        segments.push(Segment::Media(name.to_string()));
                    }
                    Some(field) => {
                        return Err(GenflowError::template(format!(
                            "media placeholder '{}' refers to a {} field, expected data-uri",
                            name,
                            field.field_type.type_name()
                        )));
                    }
                    None => return Err(undefined(name)),
                }
            } else if let Some(name) = variable.captures(inner).and_then(|c| c.get(1)) {
                let name = name.as_str();
                if input.get(name).is_none() {
                    return Err(undefined(name));
                }
                segments.push(Segment::Variable(name.to_string()));
            } else {
                return Err(GenflowError::template(format!(
                    "unsupported placeholder '{{{{{}}}}}'",
                    inner
                )));
            }
        }

        if cursor < source.len() {
            segments.push(Segment::Text(source[cursor..].to_string()));
        }

        Ok(Self { source, segments })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Names of every input field the template reads
    pub fn variables(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Variable(name) | Segment::Media(name) => Some(name.as_str()),
                Segment::Text(_) => None,
            })
            .collect()
    }

    /// Substitute `input` into the template
    pub fn render(&self, input: &Value) -> GenflowResult<RenderedPrompt> {
        let mut text = String::with_capacity(self.source.len());
        let mut media = Vec::new();

        for segment in &self.segments {
            match segment {
                Segment::Text(t) => text.push_str(t),
                Segment::Variable(name) => {
                    if let Some(value) = input.get(name) {
                        push_value(&mut text, value);
                    }
                }
                Segment::Media(name) => match input.get(name).and_then(Value::as_str) {
                    Some(uri) => {
                        let parsed = DataUri::parse(uri).map_err(|e| {
                            GenflowError::SchemaValidation(vec![FieldViolation::new(
                                name.as_str(),
                                e.to_string(),
                            )])
                        })?;
                        media.push(parsed);
                    }
                    None => {}
                },
            }
        }

        Ok(RenderedPrompt { text, media })
    }
}

fn compile_regex(pattern: &str) -> GenflowResult<Regex> {
    Regex::new(pattern).map_err(|e| GenflowError::template(e.to_string()))
}

fn undefined(name: &str) -> GenflowError {
    GenflowError::template(format!(
        "placeholder '{}' is not declared in the flow input",
        name
    ))
}

fn push_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => {}
        Value::String(s) => out.push_str(s),
        Value::Bool(b) => out.push_str(&b.to_string()),
        Value::Number(n) => out.push_str(&n.to_string()),
        other => out.push_str(&other.to_string()),
    }
}
