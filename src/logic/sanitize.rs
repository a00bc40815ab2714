use crate::logic::validate::{check_primitive_type, is_email, is_url};
use crate::model::{is_uuid, PrimitiveType, SchemaKind, SchemaType};
use serde_json::{Map, Value};

/// Coerces values into their declared shapes without ever failing loudly:
/// unrecognized or malformed inputs degrade to `null`, `0`, `""`, or an
/// empty collection. Malformed third-party API responses must not take down
/// rendering.
pub struct Sanitizer;

impl Sanitizer {
    pub fn sanitize(value: &Value, schema: &SchemaType) -> Value {
        if schema.nullable && is_empty(value) {
            return Value::Null;
        }

        if let Some(primitive) = schema.as_primitive() {
            if schema.skip_sanitize {
                return value.clone();
            }
            return Self::sanitize_primitive(primitive, value);
        }

        match &schema.kind {
            SchemaKind::ListOf(member_type) => match value.as_array() {
                Some(items) => Value::Array(
                    items
                        .iter()
                        .map(|item| Self::sanitize(item, member_type))
                        .collect(),
                ),
                // Fail-safe, not fail-fast: a scalar where a list was
                // expected becomes an empty list.
                None => Value::Array(Vec::new()),
            },
            SchemaKind::Object(properties) => match value.as_object() {
                Some(map) => {
                    let mut sanitized = Map::new();
                    for (key, property_type) in properties {
                        let property_value = map.get(key).unwrap_or(&Value::Null);
                        sanitized.insert(key.clone(), Self::sanitize(property_value, property_type));
                    }
                    Value::Object(sanitized)
                }
                None => Value::Object(Map::new()),
            },
            SchemaKind::Record {
                value: value_type, ..
            } => match value.as_object() {
                Some(map) => {
                    let mut sanitized = Map::new();
                    for (key, record_value) in map {
                        sanitized.insert(key.clone(), Self::sanitize(record_value, value_type));
                    }
                    Value::Object(sanitized)
                }
                None => Value::Object(Map::new()),
            },
            SchemaKind::Const(expected) => {
                if value == expected {
                    value.clone()
                } else {
                    Value::Null
                }
            }
            SchemaKind::Enum(members) => match value.as_str() {
                Some(s) if members.iter().any(|m| m == s) => value.clone(),
                _ => Value::Null,
            },
            SchemaKind::OneOf(member_types) => {
                // First member that validates wins; otherwise degrade.
                for member_type in member_types {
                    let validates = match member_type.as_primitive() {
                        Some(p) => check_primitive_type(p, value),
                        None => crate::logic::Validator::new(member_type.clone(), "one_of")
                            .validate(value)
                            .is_ok(),
                    };
                    if validates {
                        return Self::sanitize(value, member_type);
                    }
                }
                Value::Null
            }
            SchemaKind::StringMatching(pattern) => {
                let matches = match (value.as_str(), regex::Regex::new(pattern)) {
                    (Some(s), Ok(re)) => re.is_match(s),
                    _ => false,
                };
                if matches {
                    value.clone()
                } else {
                    Value::Null
                }
            }
            SchemaKind::Primitive(_) => unreachable!("handled above"),
        }
    }

    /// Primitive sanitization uses cast semantics, not validation:
    /// `integer` of `"abc"` is `0`, not an error.
    ///
    /// An array value for a scalar-typed field sanitizes only the first
    /// element. This leniency for singleton-array API quirks is preserved
    /// as-is; callers relying on full-array handling must declare `list_of`.
    pub fn sanitize_primitive(primitive: PrimitiveType, value: &Value) -> Value {
        if let Some(items) = value.as_array() {
            return match items.first() {
                Some(first) => Self::sanitize_primitive(primitive, first),
                None => Value::Null,
            };
        }

        match primitive {
            PrimitiveType::Any => value.clone(),
            PrimitiveType::Null => Value::Null,
            PrimitiveType::Boolean => Value::Bool(cast_bool(value)),
            PrimitiveType::Integer => Value::from(cast_i64(value)),
            PrimitiveType::Number => cast_number(value),
            PrimitiveType::String
            | PrimitiveType::Title
            | PrimitiveType::ImageAlt
            | PrimitiveType::ButtonText
            | PrimitiveType::Id => Value::String(sanitize_text(&cast_string(value))),
            // Rich-content types pass through unmodified; stripping tags
            // would destroy the payload.
            PrimitiveType::Html | PrimitiveType::Markdown => Value::String(cast_string(value)),
            PrimitiveType::EmailAddress => {
                let candidate = cast_string(value).trim().to_lowercase();
                if is_email(&candidate) {
                    Value::String(candidate)
                } else {
                    Value::String(String::new())
                }
            }
            PrimitiveType::Url | PrimitiveType::ImageUrl | PrimitiveType::ButtonUrl => {
                let candidate = cast_string(value).trim().to_string();
                if is_url(&candidate) {
                    Value::String(candidate)
                } else {
                    Value::String(String::new())
                }
            }
            PrimitiveType::JsonPath => {
                let candidate = cast_string(value);
                if candidate.starts_with('$') {
                    Value::String(candidate)
                } else {
                    Value::String(String::new())
                }
            }
            PrimitiveType::Uuid => {
                let candidate = cast_string(value);
                if is_uuid(&candidate) {
                    Value::String(candidate)
                } else {
                    Value::String(String::new())
                }
            }
            PrimitiveType::CurrencyInCurrentLocale => match value {
                Value::String(_) | Value::Number(_) => value.clone(),
                _ => Value::String(String::new()),
            },
        }
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn cast_bool(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty() && s != "0" && s != "false",
        _ => false,
    }
}

fn cast_i64(value: &Value) -> i64 {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .unwrap_or(0),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .or_else(|_| s.trim().parse::<f64>().map(|f| f as i64))
            .unwrap_or(0),
        Value::Bool(true) => 1,
        _ => 0,
    }
}

fn cast_number(value: &Value) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(0)),
        Value::Bool(true) => Value::from(1),
        _ => Value::from(0),
    }
}

fn cast_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Plain-text sanitization: strip tags, collapse control characters, trim.
fn sanitize_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;

    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if in_tag => {}
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_cast_of_non_numeric_string_is_zero() {
        assert_eq!(
            Sanitizer::sanitize_primitive(PrimitiveType::Integer, &json!("abc")),
            json!(0)
        );
        assert_eq!(
            Sanitizer::sanitize_primitive(PrimitiveType::Integer, &json!("42")),
            json!(42)
        );
        assert_eq!(
            Sanitizer::sanitize_primitive(PrimitiveType::Integer, &json!(3.7)),
            json!(3)
        );
    }

    #[test]
    fn test_array_value_for_scalar_field_sanitizes_first_element_only() {
        assert_eq!(
            Sanitizer::sanitize_primitive(PrimitiveType::String, &json!(["first", "second"])),
            json!("first")
        );
        assert_eq!(
            Sanitizer::sanitize_primitive(PrimitiveType::String, &json!([])),
            Value::Null
        );
    }

    #[test]
    fn test_scalar_where_collection_expected_degrades_to_empty() {
        let list = SchemaType::list_of(SchemaType::string());
        assert_eq!(Sanitizer::sanitize(&json!("scalar"), &list), json!([]));

        let object = SchemaType::object(vec![("a", SchemaType::string())]);
        assert_eq!(Sanitizer::sanitize(&json!(5), &object), json!({}));
    }

    #[test]
    fn test_nullable_empty_input_short_circuits_to_null() {
        let schema = SchemaType::string().nullable();
        assert_eq!(Sanitizer::sanitize(&json!(""), &schema), Value::Null);
        assert_eq!(Sanitizer::sanitize(&Value::Null, &schema), Value::Null);
        assert_eq!(Sanitizer::sanitize(&json!("x"), &schema), json!("x"));
    }

    #[test]
    fn test_string_matching_mismatch_returns_null() {
        let schema = SchemaType::string_matching("^ok-");
        assert_eq!(Sanitizer::sanitize(&json!("ok-1"), &schema), json!("ok-1"));
        assert_eq!(Sanitizer::sanitize(&json!("nope"), &schema), Value::Null);
    }

    #[test]
    fn test_text_sanitization_strips_tags_and_trims() {
        assert_eq!(
            Sanitizer::sanitize_primitive(PrimitiveType::String, &json!("  <b>Hi</b> there ")),
            json!("Hi there")
        );
    }

    #[test]
    fn test_html_and_markdown_pass_through() {
        assert_eq!(
            Sanitizer::sanitize_primitive(PrimitiveType::Html, &json!("<p>Hi</p>")),
            json!("<p>Hi</p>")
        );
    }

    #[test]
    fn test_url_sanitization_blanks_invalid_urls() {
        assert_eq!(
            Sanitizer::sanitize_primitive(PrimitiveType::Url, &json!("https://x.test/a")),
            json!("https://x.test/a")
        );
        assert_eq!(
            Sanitizer::sanitize_primitive(PrimitiveType::Url, &json!("not a url")),
            json!("")
        );
    }

    #[test]
    fn test_skip_sanitize_preserves_value_exactly() {
        let schema = SchemaType::string().skip_sanitize();
        assert_eq!(
            Sanitizer::sanitize(&json!("  <raw>  "), &schema),
            json!("  <raw>  ")
        );
    }

    #[test]
    fn test_object_sanitizes_declared_properties_recursively() {
        let schema = SchemaType::object(vec![
            ("count", SchemaType::integer()),
            ("name", SchemaType::string()),
        ]);
        let sanitized = Sanitizer::sanitize(&json!({"count": "9", "name": "<i>x</i>", "extra": 1}), &schema);
        assert_eq!(sanitized, json!({"count": 9, "name": "x"}));
    }
}
