use crate::logic::json_path::JsonPathExpr;
use crate::logic::sanitize::Sanitizer;
use crate::model::{
    generate_uuid, FieldSchema, FieldType, OutputKind, OutputSchema, PrimitiveType,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Walks a declarative output schema to extract and coerce fields from an
/// arbitrary nested JSON response into a flat typed result set.
pub struct QueryResponseParser;

impl QueryResponseParser {
    /// Parse a response against an output schema.
    ///
    /// Collections return a list of `{result, uuid}` tuples; singular schemas
    /// return the first tuple or `null` when the resolved set is empty. The
    /// `uuid` exists purely to give the UI a stable per-row key and carries
    /// no domain meaning.
    pub fn parse(data: &Value, schema: &OutputSchema) -> Value {
        let path = match JsonPathExpr::parse(schema.effective_path()) {
            Ok(path) => path,
            Err(error) => {
                log::warn!("Invalid output schema path: {}", error);
                return if schema.is_collection {
                    Value::Array(Vec::new())
                } else {
                    Value::Null
                };
            }
        };

        let resolved = path.resolve(data);

        match &schema.kind {
            OutputKind::Object(fields) => {
                let objects = Self::parse_response_objects(&resolved, fields);
                if schema.is_collection {
                    Value::Array(objects)
                } else {
                    objects.into_iter().next().unwrap_or(Value::Null)
                }
            }
            OutputKind::Primitive(primitive) => {
                let values: Vec<Value> = resolved
                    .iter()
                    .map(|raw| {
                        format_primitive(*primitive, Sanitizer::sanitize_primitive(*primitive, raw))
                    })
                    .collect();

                if schema.is_collection {
                    Value::Array(values)
                } else {
                    values.into_iter().next().unwrap_or(Value::Null)
                }
            }
        }
    }

    /// Resolve each declared field of each raw object into a
    /// `{name, type, value}` tuple and wrap the object as `{result, uuid}`.
    fn parse_response_objects(
        raw_objects: &[Value],
        fields: &BTreeMap<String, FieldSchema>,
    ) -> Vec<Value> {
        raw_objects
            .iter()
            .map(|raw| {
                let mut result = Map::new();

                for (key, field) in fields {
                    let value = Self::resolve_field(raw, key, field);

                    result.insert(
                        key.clone(),
                        json!({
                            "name": field.name.clone().unwrap_or_else(|| key.clone()),
                            "type": field.type_name(),
                            "value": value,
                        }),
                    );
                }

                json!({
                    "result": Value::Object(result),
                    "uuid": generate_uuid(),
                })
            })
            .collect()
    }

    fn resolve_field(raw: &Value, key: &str, field: &FieldSchema) -> Value {
        // A generate callable wins over path resolution.
        let resolved = if let Some(generate) = &field.generate {
            generate(raw)
        } else {
            let path = field
                .path
                .clone()
                .unwrap_or_else(|| format!("$.{}", key));

            match JsonPathExpr::parse(&path) {
                Ok(expr) if expr.has_wildcard() => Value::Array(expr.resolve(raw)),
                Ok(expr) => expr.resolve_one(raw).unwrap_or(Value::Null),
                Err(error) => {
                    log::warn!("Invalid field path for '{}': {}", key, error);
                    Value::Null
                }
            }
        };

        let resolved = if resolved.is_null() {
            field.default_value.clone().unwrap_or(Value::Null)
        } else {
            resolved
        };

        let value = match &field.field_type {
            FieldType::Primitive(primitive) => format_primitive(
                *primitive,
                Sanitizer::sanitize_primitive(*primitive, &resolved),
            ),
            FieldType::Nested(nested) => Self::parse(&resolved, nested),
        };

        match &field.format {
            Some(format) => format(value),
            None => value,
        }
    }
}

/// Additional per-type formatting applied after generic sanitization.
fn format_primitive(primitive: PrimitiveType, value: Value) -> Value {
    match primitive {
        PrimitiveType::CurrencyInCurrentLocale => match &value {
            Value::Number(n) => n
                .as_f64()
                .map(|f| Value::String(format!("{:.2}", f)))
                .unwrap_or(value),
            _ => value,
        },
        PrimitiveType::Markdown => match &value {
            Value::String(s) => Value::String(s.replace("\r\n", "\n")),
            _ => value,
        },
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn record_fields() -> BTreeMap<String, FieldSchema> {
        let mut fields = BTreeMap::new();
        fields.insert(
            "title".to_string(),
            FieldSchema::new("Title", "$.title", PrimitiveType::String),
        );
        fields.insert(
            "price".to_string(),
            FieldSchema::new("Price", "$.price", PrimitiveType::CurrencyInCurrentLocale),
        );
        fields
    }

    #[test]
    fn test_collection_parse_returns_one_tuple_per_element() {
        let schema = OutputSchema::collection("$.records[*]", record_fields());
        let data = json!({"records": [
            {"title": "A", "price": 10},
            {"title": "B", "price": 20.5},
            {"title": "C", "price": 3},
        ]});

        let parsed = QueryResponseParser::parse(&data, &schema);
        let rows = parsed.as_array().unwrap();
        assert_eq!(rows.len(), 3);

        assert_eq!(rows[0]["result"]["title"]["value"], json!("A"));
        assert_eq!(rows[0]["result"]["title"]["type"], json!("string"));
        assert_eq!(rows[0]["result"]["title"]["name"], json!("Title"));
        assert_eq!(rows[1]["result"]["price"]["value"], json!("20.50"));
    }

    #[test]
    fn test_collection_parse_generates_pairwise_distinct_uuids() {
        let schema = OutputSchema::collection("$[*]", record_fields());
        let data = json!([{"title": "A"}, {"title": "B"}, {"title": "C"}, {"title": "D"}]);

        let parsed = QueryResponseParser::parse(&data, &schema);
        let uuids: HashSet<String> = parsed
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row["uuid"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(uuids.len(), 4);
    }

    #[test]
    fn test_singular_parse_of_empty_set_returns_null() {
        let schema = OutputSchema::single(record_fields());
        let parsed = QueryResponseParser::parse(&json!({"other": []}), &{
            let mut s = schema;
            s.path = Some("$.records[*]".to_string());
            s
        });
        assert_eq!(parsed, Value::Null);
    }

    #[test]
    fn test_field_path_defaults_to_dotted_field_key() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "title".to_string(),
            FieldSchema {
                name: None,
                path: None,
                field_type: FieldType::Primitive(PrimitiveType::String),
                default_value: None,
                generate: None,
                format: None,
            },
        );

        let schema = OutputSchema::single(fields);
        let parsed = QueryResponseParser::parse(&json!({"title": "Implicit"}), &schema);
        assert_eq!(parsed["result"]["title"]["value"], json!("Implicit"));
        // Name falls back to the field key.
        assert_eq!(parsed["result"]["title"]["name"], json!("title"));
    }

    #[test]
    fn test_generate_callable_wins_over_path_resolution() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "slug".to_string(),
            FieldSchema::new("Slug", "$.ignored", PrimitiveType::String).with_generate(
                std::sync::Arc::new(|raw: &Value| {
                    json!(format!("item-{}", raw["id"].as_i64().unwrap_or(0)))
                }),
            ),
        );

        let schema = OutputSchema::single(fields);
        let parsed = QueryResponseParser::parse(&json!({"id": 7, "ignored": "x"}), &schema);
        assert_eq!(parsed["result"]["slug"]["value"], json!("item-7"));
    }

    #[test]
    fn test_format_callable_applies_after_sanitization() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "title".to_string(),
            FieldSchema::new("Title", "$.title", PrimitiveType::String).with_format(
                std::sync::Arc::new(|value: Value| {
                    json!(value.as_str().unwrap_or_default().to_uppercase())
                }),
            ),
        );

        let schema = OutputSchema::single(fields);
        let parsed = QueryResponseParser::parse(&json!({"title": "quiet"}), &schema);
        assert_eq!(parsed["result"]["title"]["value"], json!("QUIET"));
    }

    #[test]
    fn test_default_value_fills_missing_fields() {
        let mut fields = BTreeMap::new();
        fields.insert(
            "status".to_string(),
            FieldSchema {
                name: Some("Status".to_string()),
                path: Some("$.status".to_string()),
                field_type: FieldType::Primitive(PrimitiveType::String),
                default_value: Some(json!("unknown")),
                generate: None,
                format: None,
            },
        );

        let schema = OutputSchema::single(fields);
        let parsed = QueryResponseParser::parse(&json!({}), &schema);
        assert_eq!(parsed["result"]["status"]["value"], json!("unknown"));
    }

    #[test]
    fn test_nested_object_field_reports_object_type() {
        let mut inner = BTreeMap::new();
        inner.insert(
            "url".to_string(),
            FieldSchema::new("Url", "$.url", PrimitiveType::ImageUrl),
        );

        let mut fields = BTreeMap::new();
        fields.insert(
            "image".to_string(),
            FieldSchema {
                name: Some("Image".to_string()),
                path: Some("$.image".to_string()),
                field_type: FieldType::Nested(Box::new(OutputSchema::single(inner))),
                default_value: None,
                generate: None,
                format: None,
            },
        );

        let schema = OutputSchema::single(fields);
        let parsed = QueryResponseParser::parse(
            &json!({"image": {"url": "https://img.test/a.png"}}),
            &schema,
        );

        assert_eq!(parsed["result"]["image"]["type"], json!("object"));
        assert_eq!(
            parsed["result"]["image"]["value"]["result"]["url"]["value"],
            json!("https://img.test/a.png")
        );
    }

    #[test]
    fn test_primitive_leaf_schema_with_collection_path() {
        let schema = OutputSchema {
            is_collection: true,
            path: Some("$.tags[*]".to_string()),
            kind: OutputKind::Primitive(PrimitiveType::String),
        };
        let parsed = QueryResponseParser::parse(&json!({"tags": ["a", "b"]}), &schema);
        assert_eq!(parsed, json!(["a", "b"]));
    }
}
