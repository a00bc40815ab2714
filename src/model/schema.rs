use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Primitive leaves of the validation/sanitization schema. Extended string
/// types (`id`, `markdown`, `image_url`, ...) carry semantic meaning for the
/// response parser and the editor UI but all bottom out in JSON scalars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveType {
    Any,
    Boolean,
    Integer,
    Null,
    Number,
    String,
    ButtonText,
    ButtonUrl,
    CurrencyInCurrentLocale,
    EmailAddress,
    Html,
    Id,
    ImageAlt,
    ImageUrl,
    JsonPath,
    Markdown,
    Title,
    Url,
    Uuid,
}

impl PrimitiveType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimitiveType::Any => "any",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Integer => "integer",
            PrimitiveType::Null => "null",
            PrimitiveType::Number => "number",
            PrimitiveType::String => "string",
            PrimitiveType::ButtonText => "button_text",
            PrimitiveType::ButtonUrl => "button_url",
            PrimitiveType::CurrencyInCurrentLocale => "currency_in_current_locale",
            PrimitiveType::EmailAddress => "email_address",
            PrimitiveType::Html => "html",
            PrimitiveType::Id => "id",
            PrimitiveType::ImageAlt => "image_alt",
            PrimitiveType::ImageUrl => "image_url",
            PrimitiveType::JsonPath => "json_path",
            PrimitiveType::Markdown => "markdown",
            PrimitiveType::Title => "title",
            PrimitiveType::Url => "url",
            PrimitiveType::Uuid => "uuid",
        }
    }
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The non-flag portion of a schema node. Every non-primitive kind recursively
/// bottoms out in primitives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "args", rename_all = "snake_case")]
pub enum SchemaKind {
    Primitive(PrimitiveType),
    Const(Value),
    Enum(Vec<String>),
    ListOf(Box<SchemaType>),
    Object(BTreeMap<String, SchemaType>),
    OneOf(Vec<SchemaType>),
    Record {
        key: PrimitiveType,
        value: Box<SchemaType>,
    },
    StringMatching(String),
}

/// A node in the declarative schema tree used to validate and sanitize
/// configuration and API responses.
///
/// All types are required by default; `nullable()` makes a node optional.
/// Data is sanitized according to its type unless `skip_sanitize()` exempts
/// it (used for secrets that must round-trip byte-for-byte).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaType {
    #[serde(flatten)]
    pub kind: SchemaKind,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_sanitize: bool,
}

impl SchemaType {
    fn of(kind: SchemaKind) -> Self {
        Self {
            kind,
            nullable: false,
            skip_sanitize: false,
        }
    }

    pub fn primitive(p: PrimitiveType) -> Self {
        Self::of(SchemaKind::Primitive(p))
    }

    pub fn any() -> Self {
        // `any` accepts everything, so sanitizing it would be meaningless.
        Self::primitive(PrimitiveType::Any).skip_sanitize()
    }

    pub fn boolean() -> Self {
        Self::primitive(PrimitiveType::Boolean)
    }

    pub fn integer() -> Self {
        Self::primitive(PrimitiveType::Integer)
    }

    pub fn number() -> Self {
        Self::primitive(PrimitiveType::Number)
    }

    pub fn string() -> Self {
        Self::primitive(PrimitiveType::String)
    }

    pub fn email_address() -> Self {
        Self::primitive(PrimitiveType::EmailAddress)
    }

    pub fn html() -> Self {
        Self::primitive(PrimitiveType::Html)
    }

    pub fn id() -> Self {
        Self::primitive(PrimitiveType::Id)
    }

    pub fn image_url() -> Self {
        Self::primitive(PrimitiveType::ImageUrl)
    }

    pub fn json_path() -> Self {
        Self::primitive(PrimitiveType::JsonPath)
    }

    pub fn url() -> Self {
        Self::primitive(PrimitiveType::Url)
    }

    pub fn uuid() -> Self {
        Self::primitive(PrimitiveType::Uuid)
    }

    pub fn const_value(value: Value) -> Self {
        Self::of(SchemaKind::Const(value))
    }

    pub fn enum_of(values: &[&str]) -> Self {
        Self::of(SchemaKind::Enum(
            values.iter().map(|v| v.to_string()).collect(),
        ))
    }

    pub fn list_of(member: SchemaType) -> Self {
        Self::of(SchemaKind::ListOf(Box::new(member)))
    }

    pub fn object(properties: Vec<(&str, SchemaType)>) -> Self {
        Self::of(SchemaKind::Object(
            properties
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        ))
    }

    pub fn one_of(members: Vec<SchemaType>) -> Self {
        Self::of(SchemaKind::OneOf(members))
    }

    pub fn record(key: PrimitiveType, value: SchemaType) -> Self {
        Self::of(SchemaKind::Record {
            key,
            value: Box::new(value),
        })
    }

    pub fn string_matching(regex: &str) -> Self {
        Self::of(SchemaKind::StringMatching(regex.to_string()))
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn skip_sanitize(mut self) -> Self {
        self.skip_sanitize = true;
        self
    }

    pub fn as_primitive(&self) -> Option<PrimitiveType> {
        match &self.kind {
            SchemaKind::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    /// Merge the property maps of two object schemas, right-hand side winning.
    pub fn merge_objects(left: &SchemaType, right: &SchemaType) -> Option<SchemaType> {
        match (&left.kind, &right.kind) {
            (SchemaKind::Object(a), SchemaKind::Object(b)) => {
                let mut merged = a.clone();
                for (k, v) in b {
                    merged.insert(k.clone(), v.clone());
                }
                Some(Self::of(SchemaKind::Object(merged)))
            }
            _ => None,
        }
    }
}
