use crate::model::{
    DataSourceKind, EngineError, FieldSchema, HeaderSource, HttpDataSource, HttpQuery, InputField,
    InputVariables, MappedConfig, OutputKind, OutputSchema, PrimitiveType, SchemaType, ServiceName,
    INPUT_TYPE_ID_LIST,
};
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

const AIRTABLE_API_BASE: &str = "https://api.airtable.com/v0";

/// Airtable base with a static access token.
pub struct AirtableKind;

#[derive(Debug, Clone, Deserialize)]
pub struct AirtableConfig {
    pub display_name: String,
    pub access_token: String,
    pub base: AirtableBaseRef,
    #[serde(default)]
    pub tables: Vec<TableConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AirtableBaseRef {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub output_query_mappings: Vec<TableMapping>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TableMapping {
    pub key: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub path: Option<String>,
    #[serde(rename = "type", default)]
    pub field_type: Option<String>,
}

impl AirtableConfig {
    pub fn from_value(service_config: &Value) -> Result<Self, EngineError> {
        serde_json::from_value(service_config.clone())
            .map_err(|e| EngineError::validation(format!("Invalid airtable config: {}", e)))
    }
}

impl DataSourceKind for AirtableKind {
    fn service_name(&self) -> ServiceName {
        ServiceName::Airtable
    }

    fn config_schema(&self) -> SchemaType {
        SchemaType::object(vec![
            ("display_name", SchemaType::string()),
            ("access_token", SchemaType::string().skip_sanitize()),
            (
                "base",
                SchemaType::object(vec![
                    ("id", SchemaType::id()),
                    ("name", SchemaType::string().nullable()),
                ]),
            ),
            (
                "tables",
                SchemaType::list_of(SchemaType::object(vec![
                    ("id", SchemaType::id()),
                    ("name", SchemaType::string()),
                    (
                        "output_query_mappings",
                        SchemaType::list_of(SchemaType::object(vec![
                            ("key", SchemaType::string()),
                            ("name", SchemaType::string().nullable()),
                            ("path", SchemaType::json_path().nullable()),
                            ("type", SchemaType::string().nullable()),
                        ])),
                    ),
                ])),
            ),
        ])
    }

    fn map_config(&self, service_config: &Value) -> Result<MappedConfig, EngineError> {
        let config = AirtableConfig::from_value(service_config)?;

        Ok(MappedConfig {
            display_name: config.display_name,
            endpoint: format!("{}/{}", AIRTABLE_API_BASE, config.base.id),
            request_headers: HeaderSource::literal(vec![
                ("Authorization", format!("Bearer {}", config.access_token)),
                ("Content-Type", "application/json".to_string()),
            ]),
        })
    }
}

fn output_schema_fields(table: &TableConfig) -> BTreeMap<String, FieldSchema> {
    let mut fields = BTreeMap::new();
    fields.insert(
        "record_id".to_string(),
        FieldSchema::new("Record ID", "$[\"id\"]", PrimitiveType::Id),
    );

    for mapping in &table.output_query_mappings {
        let name = mapping.name.clone().unwrap_or_else(|| mapping.key.clone());
        let path = mapping
            .path
            .clone()
            .unwrap_or_else(|| format!("$.fields[\"{}\"]", mapping.key));
        let field_type = mapping
            .field_type
            .as_deref()
            .and_then(|t| serde_json::from_value(Value::String(t.to_string())).ok())
            .unwrap_or(PrimitiveType::String);

        fields.insert(
            mapping.key.clone(),
            FieldSchema::new(&name, &path, field_type),
        );
    }

    fields
}

/// Build the `filterByFormula` expression selecting a set of record ids.
fn record_id_formula(record_ids: &[Value]) -> String {
    let parts: Vec<String> = record_ids
        .iter()
        .map(|id| {
            let id = id.as_str().map(str::to_string).unwrap_or_else(|| id.to_string());
            format!("RECORD_ID()=\"{}\"", id.replace('"', "\\\""))
        })
        .collect();

    if parts.len() == 1 {
        parts.into_iter().next().unwrap_or_default()
    } else {
        format!("OR({})", parts.join(","))
    }
}

/// Item query fetching one or more records by id through `filterByFormula`.
/// Declares a single `id:list` input so batches consolidate into one request.
pub fn get_item_query(data_source: &HttpDataSource, table: &TableConfig) -> HttpQuery {
    let output_schema = OutputSchema {
        is_collection: true,
        path: Some("$.records[*]".to_string()),
        kind: OutputKind::Object(output_schema_fields(table)),
    };

    let base_endpoint = format!("{}/{}", data_source.endpoint(), table.id);

    HttpQuery::new(data_source.clone(), output_schema)
        .with_dynamic_endpoint(Arc::new(move |inputs: &InputVariables| {
            let ids = match inputs.get("record_id") {
                Some(Value::Array(items)) => items.clone(),
                Some(value) => vec![value.clone()],
                None => Vec::new(),
            };

            let mut url = match url::Url::parse(&base_endpoint) {
                Ok(url) => url,
                Err(_) => return base_endpoint.clone(),
            };
            url.query_pairs_mut()
                .append_pair("filterByFormula", &record_id_formula(&ids));
            url.to_string()
        }))
        .with_input_schema(vec![(
            "record_id",
            InputField::new("Record ID", INPUT_TYPE_ID_LIST),
        )])
}

/// Cursor-paginated list query over one table.
pub fn get_list_query(data_source: &HttpDataSource, table: &TableConfig) -> HttpQuery {
    let output_schema = OutputSchema {
        is_collection: true,
        path: Some("$.records[*]".to_string()),
        kind: OutputKind::Object(output_schema_fields(table)),
    };

    let base_endpoint = format!("{}/{}", data_source.endpoint(), table.id);

    let mut pagination_fields = BTreeMap::new();
    // Named "offset" by the API but implemented as a string cursor.
    pagination_fields.insert(
        "cursor_next".to_string(),
        FieldSchema::new("Next page cursor", "$.offset", PrimitiveType::String),
    );

    HttpQuery::new(data_source.clone(), output_schema)
        .with_dynamic_endpoint(Arc::new(move |inputs: &InputVariables| {
            let mut url = match url::Url::parse(&base_endpoint) {
                Ok(url) => url,
                Err(_) => return base_endpoint.clone(),
            };

            if let Some(cursor) = inputs.get("cursor").and_then(Value::as_str) {
                url.query_pairs_mut().append_pair("offset", cursor);
            }
            if let Some(page_size) = inputs.get("page_size") {
                let page_size = match page_size {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                url.query_pairs_mut().append_pair("pageSize", &page_size);
            }

            url.to_string()
        }))
        .with_input_schema(vec![
            (
                "cursor",
                InputField::new("Pagination cursor", "ui:pagination_cursor"),
            ),
            (
                "page_size",
                InputField::new("Page Size", "ui:pagination_per_page")
                    .with_default(Value::from(20)),
            ),
        ])
        .with_pagination_schema(pagination_fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataSourceConfig;
    use serde_json::json;

    fn config() -> Value {
        json!({
            "display_name": "Inventory",
            "access_token": "pat-123",
            "base": {"id": "appXYZ"},
            "tables": [{"id": "tbl1", "name": "Items", "output_query_mappings": [
                {"key": "title", "name": "Title", "type": "title"},
            ]}],
        })
    }

    fn data_source() -> HttpDataSource {
        let config = DataSourceConfig::new(ServiceName::Airtable, config());
        HttpDataSource::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn test_config_maps_to_base_endpoint_and_token_header() {
        let data_source = data_source();
        assert_eq!(data_source.endpoint(), "https://api.airtable.com/v0/appXYZ");

        let headers = data_source.resolve_headers().await.unwrap();
        assert_eq!(headers["Authorization"], "Bearer pat-123");
    }

    #[test]
    fn test_record_id_formula_or_joins_multiple_ids() {
        assert_eq!(record_id_formula(&[json!("rec1")]), "RECORD_ID()=\"rec1\"");
        assert_eq!(
            record_id_formula(&[json!("rec1"), json!("rec2")]),
            "OR(RECORD_ID()=\"rec1\",RECORD_ID()=\"rec2\")"
        );
    }

    #[test]
    fn test_item_query_builds_filter_by_formula_endpoint() {
        let data_source = data_source();
        let tables = AirtableConfig::from_value(data_source.service_config())
            .unwrap()
            .tables;
        let query = get_item_query(&data_source, &tables[0]);

        let mut inputs = InputVariables::new();
        inputs.insert("record_id".to_string(), json!(["rec1"]));

        let endpoint = query.endpoint(&inputs);
        assert!(endpoint.starts_with("https://api.airtable.com/v0/appXYZ/tbl1?filterByFormula="));
        assert!(endpoint.contains("RECORD_ID"));

        let slugs: Vec<&str> = query.id_list_inputs().iter().map(|s| s.as_str()).collect();
        assert_eq!(slugs, vec!["record_id"]);
    }

    #[test]
    fn test_list_query_appends_cursor_and_page_size() {
        let data_source = data_source();
        let tables = AirtableConfig::from_value(data_source.service_config())
            .unwrap()
            .tables;
        let query = get_list_query(&data_source, &tables[0]);

        let mut inputs = InputVariables::new();
        inputs.insert("cursor".to_string(), json!("itrAbc"));
        inputs.insert("page_size".to_string(), json!(50));

        let endpoint = query.endpoint(&inputs);
        assert!(endpoint.contains("offset=itrAbc"));
        assert!(endpoint.contains("pageSize=50"));
        assert!(query.pagination_schema.is_some());
    }

    #[test]
    fn test_mapped_fields_include_record_id() {
        let tables = AirtableConfig::from_value(&config()).unwrap().tables;
        let fields = output_schema_fields(&tables[0]);
        assert_eq!(fields["record_id"].path.as_deref(), Some("$[\"id\"]"));
        assert_eq!(fields["title"].type_name(), "title");
    }
}
