use crate::model::{is_uuid, EngineError, PrimitiveType, SchemaKind, SchemaType};
use serde_json::Value;

/// Validates arbitrary input against a schema tree.
///
/// Failures identify the offending property and expected type, chaining the
/// nested cause into a single message. The validated value is never mutated;
/// coercion is the sanitizer's job.
pub struct Validator {
    schema: SchemaType,
    description: String,
}

impl Validator {
    pub fn new(schema: SchemaType, description: &str) -> Self {
        Self {
            schema,
            description: description.to_string(),
        }
    }

    pub fn validate(&self, data: &Value) -> Result<(), EngineError> {
        if let Err(error) = self.check_type(&self.schema, data) {
            let message = format!("[{}] {}", self.description, error.message);
            log::error!("{}", message);
            return Err(EngineError::validation(message));
        }

        Ok(())
    }

    fn check_type(&self, schema: &SchemaType, value: &Value) -> Result<(), EngineError> {
        if schema.nullable && value.is_null() {
            return Ok(());
        }

        match &schema.kind {
            SchemaKind::Primitive(primitive) => {
                if check_primitive_type(*primitive, value) {
                    Ok(())
                } else {
                    Err(create_error(
                        &format!("Value must be a {}", primitive),
                        value,
                        None,
                    ))
                }
            }
            SchemaKind::Const(expected) => {
                if value == expected {
                    Ok(())
                } else {
                    Err(create_error("Value must be the constant", value, None))
                }
            }
            SchemaKind::Enum(members) => {
                let matches = value
                    .as_str()
                    .map(|s| members.iter().any(|m| m == s))
                    .unwrap_or(false);
                if matches {
                    Ok(())
                } else {
                    Err(create_error(
                        "Value must be one of the enumerated values",
                        value,
                        None,
                    ))
                }
            }
            SchemaKind::ListOf(member_type) => {
                let Some(items) = value.as_array() else {
                    return Err(create_error("Value must be a list", value, None));
                };

                for item in items {
                    if let Err(error) = self.check_type(member_type, item) {
                        return Err(create_error(
                            "Value must be a list of the specified type",
                            item,
                            Some(error),
                        ));
                    }
                }

                Ok(())
            }
            SchemaKind::Object(properties) => {
                let Some(map) = value.as_object() else {
                    return Err(create_error("Value must be an object", value, None));
                };

                for (key, property_type) in properties {
                    let property_value = map.get(key).unwrap_or(&Value::Null);
                    if let Err(error) = self.check_type(property_type, property_value) {
                        return Err(create_error(
                            "Object must have valid property",
                            &Value::String(key.clone()),
                            Some(error),
                        ));
                    }
                }

                Ok(())
            }
            SchemaKind::OneOf(member_types) => {
                // Union type: collect every member failure so the caller can
                // inspect each of them.
                let mut failures = Vec::new();

                for member_type in member_types {
                    match self.check_type(member_type, value) {
                        Ok(()) => return Ok(()),
                        Err(error) => failures.push(error.message),
                    }
                }

                Err(create_error(
                    &format!(
                        "Value must be one of the specified types ({})",
                        failures.join(" / ")
                    ),
                    value,
                    None,
                ))
            }
            SchemaKind::Record {
                key,
                value: value_type,
            } => {
                let Some(map) = value.as_object() else {
                    return Err(create_error("Value must be an object", value, None));
                };

                for (record_key, record_value) in map {
                    if !check_primitive_type(*key, &Value::String(record_key.clone())) {
                        return Err(create_error(
                            "Record must have valid key",
                            &Value::String(record_key.clone()),
                            None,
                        ));
                    }

                    if let Err(error) = self.check_type(value_type, record_value) {
                        return Err(create_error(
                            "Record must have valid value",
                            record_value,
                            Some(error),
                        ));
                    }
                }

                Ok(())
            }
            SchemaKind::StringMatching(pattern) => {
                let matches = match (value.as_str(), regex::Regex::new(pattern)) {
                    (Some(s), Ok(re)) => re.is_match(s),
                    _ => false,
                };

                if matches {
                    Ok(())
                } else {
                    Err(create_error(
                        "Value must match the specified regex",
                        value,
                        None,
                    ))
                }
            }
        }
    }
}

pub fn check_primitive_type(primitive: PrimitiveType, value: &Value) -> bool {
    match primitive {
        PrimitiveType::Any => true,
        PrimitiveType::Boolean => value.is_boolean(),
        PrimitiveType::Integer => value.is_i64() || value.is_u64(),
        PrimitiveType::Null => value.is_null(),
        // Numeric strings are accepted for compatibility with loosely typed
        // upstream APIs.
        PrimitiveType::Number => {
            value.is_number()
                || value
                    .as_str()
                    .map(|s| s.parse::<f64>().is_ok())
                    .unwrap_or(false)
        }
        PrimitiveType::String => value.is_string(),
        PrimitiveType::CurrencyInCurrentLocale => value.is_string() || value.is_number(),
        PrimitiveType::EmailAddress => value.as_str().map(is_email).unwrap_or(false),
        PrimitiveType::Html
        | PrimitiveType::ImageAlt
        | PrimitiveType::Markdown
        | PrimitiveType::Title => value.is_string(),
        PrimitiveType::ButtonText | PrimitiveType::Id => {
            value.as_str().map(|s| !s.is_empty()).unwrap_or(false)
        }
        PrimitiveType::JsonPath => value.as_str().map(|s| s.starts_with('$')).unwrap_or(false),
        PrimitiveType::ButtonUrl | PrimitiveType::ImageUrl | PrimitiveType::Url => {
            value.as_str().map(is_url).unwrap_or(false)
        }
        PrimitiveType::Uuid => value.as_str().map(is_uuid).unwrap_or(false),
    }
}

pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.contains(char::is_whitespace)
}

pub fn is_url(value: &str) -> bool {
    url::Url::parse(value).is_ok()
}

fn create_error(message: &str, value: &Value, child: Option<EngineError>) -> EngineError {
    let serialized = match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    let mut full = format!("{}: {}", message, serialized);
    if let Some(child) = child {
        full.push_str("; ");
        full.push_str(&child.message);
    }

    EngineError::validation(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator(schema: SchemaType) -> Validator {
        Validator::new(schema, "test")
    }

    #[test]
    fn test_primitive_types_accept_matching_values() {
        assert!(validator(SchemaType::string()).validate(&json!("x")).is_ok());
        assert!(validator(SchemaType::integer()).validate(&json!(7)).is_ok());
        assert!(validator(SchemaType::boolean())
            .validate(&json!(true))
            .is_ok());
        assert!(validator(SchemaType::url())
            .validate(&json!("https://example.com/a"))
            .is_ok());
        assert!(validator(SchemaType::email_address())
            .validate(&json!("a@example.com"))
            .is_ok());
        assert!(validator(SchemaType::json_path())
            .validate(&json!("$.a[*]"))
            .is_ok());
    }

    #[test]
    fn test_primitive_types_reject_mismatches() {
        assert!(validator(SchemaType::string()).validate(&json!(7)).is_err());
        assert!(validator(SchemaType::integer()).validate(&json!("7")).is_err());
        assert!(validator(SchemaType::url())
            .validate(&json!("not a url"))
            .is_err());
        assert!(validator(SchemaType::email_address())
            .validate(&json!("nope"))
            .is_err());
        assert!(validator(SchemaType::id()).validate(&json!("")).is_err());
    }

    #[test]
    fn test_nullable_short_circuits_on_null() {
        assert!(validator(SchemaType::string().nullable())
            .validate(&Value::Null)
            .is_ok());
        assert!(validator(SchemaType::string())
            .validate(&Value::Null)
            .is_err());
    }

    #[test]
    fn test_object_validation_names_the_offending_property() {
        let schema = SchemaType::object(vec![
            ("display_name", SchemaType::string()),
            ("endpoint", SchemaType::url()),
        ]);

        let error = validator(schema)
            .validate(&json!({"display_name": "Ok", "endpoint": "bogus"}))
            .unwrap_err();

        assert!(error.message.contains("endpoint"), "{}", error.message);
        assert!(error.message.contains("url"), "{}", error.message);
    }

    #[test]
    fn test_missing_required_property_fails() {
        let schema = SchemaType::object(vec![("display_name", SchemaType::string())]);
        assert!(validator(schema).validate(&json!({})).is_err());
    }

    #[test]
    fn test_list_of_checks_each_member() {
        let schema = SchemaType::list_of(SchemaType::integer());
        assert!(validator(schema.clone()).validate(&json!([1, 2, 3])).is_ok());
        assert!(validator(schema.clone()).validate(&json!([1, "x"])).is_err());
        assert!(validator(schema).validate(&json!("scalar")).is_err());
    }

    #[test]
    fn test_enum_requires_membership() {
        let schema = SchemaType::enum_of(&["basic", "bearer"]);
        assert!(validator(schema.clone()).validate(&json!("bearer")).is_ok());
        assert!(validator(schema).validate(&json!("digest")).is_err());
    }

    #[test]
    fn test_one_of_accepts_any_member_and_reports_all_failures() {
        let schema = SchemaType::one_of(vec![SchemaType::integer(), SchemaType::string()]);
        assert!(validator(schema.clone()).validate(&json!(1)).is_ok());
        assert!(validator(schema.clone()).validate(&json!("x")).is_ok());

        let error = validator(schema).validate(&json!(true)).unwrap_err();
        assert!(error.message.contains("integer"), "{}", error.message);
        assert!(error.message.contains("string"), "{}", error.message);
    }

    #[test]
    fn test_record_checks_keys_and_values() {
        let schema = SchemaType::record(PrimitiveType::String, SchemaType::string());
        assert!(validator(schema.clone())
            .validate(&json!({"Authorization": "Bearer x"}))
            .is_ok());
        assert!(validator(schema).validate(&json!({"a": 1})).is_err());
    }

    #[test]
    fn test_string_matching_requires_regex_match() {
        let schema = SchemaType::string_matching("^[a-z-]+$");
        assert!(validator(schema.clone())
            .validate(&json!("my-store"))
            .is_ok());
        assert!(validator(schema).validate(&json!("My Store")).is_err());
    }

    #[test]
    fn test_const_requires_exact_equality() {
        let schema = SchemaType::const_value(json!("service_account"));
        assert!(validator(schema.clone())
            .validate(&json!("service_account"))
            .is_ok());
        assert!(validator(schema).validate(&json!("user_account")).is_err());
    }
}
