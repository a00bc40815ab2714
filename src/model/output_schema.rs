use crate::model::schema::PrimitiveType;
use crate::model::InputVariables;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Computes a field value from the decoded raw object, bypassing path
/// resolution entirely. Only available to code-registered queries.
pub type GenerateFn = Arc<dyn Fn(&Value) -> Value + Send + Sync>;

/// Post-processes a resolved field value.
pub type FormatFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Preprocesses the deserialized response before it reaches the parser.
pub type PreprocessFn = Arc<dyn Fn(Value, &InputVariables) -> Value + Send + Sync>;

/// Declarative description of the shape to extract from a response: a
/// JSONPath selecting the raw value(s) and either a primitive leaf or a map
/// of named fields.
///
/// Serialized form matches the config DSL consumed over REST:
/// `{ "is_collection": bool, "path": "$...", "type": "string" | { ... } }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSchema {
    #[serde(default)]
    pub is_collection: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "type")]
    pub kind: OutputKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputKind {
    Primitive(PrimitiveType),
    Object(BTreeMap<String, FieldSchema>),
}

/// One declared output field. `type` is either a primitive name or a nested
/// output schema for object/collection values.
#[derive(Clone, Serialize, Deserialize)]
pub struct FieldSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(skip)]
    pub generate: Option<GenerateFn>,
    #[serde(skip)]
    pub format: Option<FormatFn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldType {
    Primitive(PrimitiveType),
    Nested(Box<OutputSchema>),
}

impl Default for FieldType {
    fn default() -> Self {
        FieldType::Primitive(PrimitiveType::String)
    }
}

impl OutputSchema {
    pub fn collection(path: &str, fields: BTreeMap<String, FieldSchema>) -> Self {
        Self {
            is_collection: true,
            path: Some(path.to_string()),
            kind: OutputKind::Object(fields),
        }
    }

    pub fn single(fields: BTreeMap<String, FieldSchema>) -> Self {
        Self {
            is_collection: false,
            path: None,
            kind: OutputKind::Object(fields),
        }
    }

    /// The effective path: `$[*]` for collections, `$` otherwise.
    pub fn effective_path(&self) -> &str {
        match &self.path {
            Some(path) => path,
            None if self.is_collection => "$[*]",
            None => "$",
        }
    }
}

impl FieldSchema {
    pub fn new(name: &str, path: &str, field_type: PrimitiveType) -> Self {
        Self {
            name: Some(name.to_string()),
            path: Some(path.to_string()),
            field_type: FieldType::Primitive(field_type),
            default_value: None,
            generate: None,
            format: None,
        }
    }

    pub fn with_generate(mut self, generate: GenerateFn) -> Self {
        self.generate = Some(generate);
        self
    }

    pub fn with_format(mut self, format: FormatFn) -> Self {
        self.format = Some(format);
        self
    }

    /// The type name reported to the caller in the `{name, type, value}`
    /// tuple. Complex types coerce to the literal string "object".
    pub fn type_name(&self) -> &'static str {
        match &self.field_type {
            FieldType::Primitive(p) => p.as_str(),
            FieldType::Nested(_) => "object",
        }
    }
}

impl std::fmt::Debug for FieldSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldSchema")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("field_type", &self.field_type)
            .field("default_value", &self.default_value)
            .field("generate", &self.generate.as_ref().map(|_| "<fn>"))
            .field("format", &self.format.as_ref().map(|_| "<fn>"))
            .finish()
    }
}
