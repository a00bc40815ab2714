use crate::model::{
    DataSourceKind, EngineError, HeaderSource, MappedConfig, SchemaType, ServiceName,
};
use base64::Engine as _;
use serde::Deserialize;
use serde_json::{json, Value};

/// Plain HTTP endpoint with optional basic/bearer/api-key auth.
pub struct GenericHttpKind;

#[derive(Debug, Deserialize)]
struct GenericHttpConfig {
    display_name: String,
    endpoint: String,
    #[serde(default)]
    auth: Option<AuthConfig>,
}

#[derive(Debug, Deserialize)]
struct AuthConfig {
    #[serde(rename = "type")]
    auth_type: String,
    #[serde(default)]
    value: String,
    /// For `api-key` auth: `header` or `queryparams`.
    #[serde(default)]
    add_to: Option<String>,
    /// Header or query parameter name for `api-key` auth.
    #[serde(default)]
    key: Option<String>,
}

impl DataSourceKind for GenericHttpKind {
    fn service_name(&self) -> ServiceName {
        ServiceName::GenericHttp
    }

    fn config_schema(&self) -> SchemaType {
        SchemaType::object(vec![
            ("display_name", SchemaType::string()),
            ("endpoint", SchemaType::url()),
            (
                "auth",
                SchemaType::object(vec![
                    (
                        "type",
                        SchemaType::enum_of(&["basic", "bearer", "api-key", "none"]),
                    ),
                    ("value", SchemaType::string().skip_sanitize()),
                    (
                        "add_to",
                        SchemaType::enum_of(&["header", "queryparams"]).nullable(),
                    ),
                    ("key", SchemaType::string().nullable()),
                ])
                .nullable(),
            ),
        ])
    }

    fn map_config(&self, service_config: &Value) -> Result<MappedConfig, EngineError> {
        let config: GenericHttpConfig = serde_json::from_value(service_config.clone())
            .map_err(|e| EngineError::validation(format!("Invalid generic-http config: {}", e)))?;

        let mut endpoint = config.endpoint;
        let mut headers = Vec::new();

        if let Some(auth) = &config.auth {
            match auth.auth_type.as_str() {
                "basic" => {
                    let encoded =
                        base64::engine::general_purpose::STANDARD.encode(auth.value.as_bytes());
                    headers.push(("Authorization", format!("Basic {}", encoded)));
                }
                "bearer" => {
                    headers.push(("Authorization", format!("Bearer {}", auth.value)));
                }
                "api-key" => {
                    let key = auth.key.clone().unwrap_or_default();
                    if key.is_empty() {
                        return Err(EngineError::validation(
                            "api-key auth requires a key name",
                        ));
                    }

                    if auth.add_to.as_deref() == Some("queryparams") {
                        let mut url = url::Url::parse(&endpoint).map_err(|_| {
                            EngineError::validation(format!("Invalid endpoint URL: {}", endpoint))
                        })?;
                        url.query_pairs_mut().append_pair(&key, &auth.value);
                        endpoint = url.to_string();
                    } else {
                        return Ok(MappedConfig {
                            display_name: config.display_name,
                            endpoint,
                            request_headers: HeaderSource::Literal(
                                [(key, auth.value.clone())].into_iter().collect(),
                            ),
                        });
                    }
                }
                _ => {}
            }
        }

        Ok(MappedConfig {
            display_name: config.display_name,
            endpoint,
            request_headers: HeaderSource::literal(headers),
        })
    }
}

/// Convenience constructor for a bearer-token config.
pub fn bearer_config(display_name: &str, endpoint: &str, token: &str) -> Value {
    json!({
        "display_name": display_name,
        "endpoint": endpoint,
        "auth": {"type": "bearer", "value": token},
    })
}
