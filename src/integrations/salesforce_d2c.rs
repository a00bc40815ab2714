use crate::integrations::TokenCache;
use crate::model::{
    DataSourceKind, EngineError, FieldSchema, HeaderResolver, HeaderSource, HttpDataSource,
    HttpQuery, InputField, InputVariables, MappedConfig, OutputKind, OutputSchema, PrimitiveType,
    SchemaType, ServiceName,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

const COMMERCE_API_VERSION: &str = "v63.0";

/// Salesforce D2C commerce API using a client-credentials token exchange.
pub struct SalesforceD2cKind;

#[derive(Debug, Clone, Deserialize)]
pub struct SalesforceD2cConfig {
    pub display_name: String,
    pub shop_url: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub store_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WebStore {
    pub id: String,
    pub name: String,
}

impl SalesforceD2cConfig {
    pub fn from_value(service_config: &Value) -> Result<Self, EngineError> {
        serde_json::from_value(service_config.clone())
            .map_err(|e| EngineError::validation(format!("Invalid salesforce-d2c config: {}", e)))
    }
}

impl DataSourceKind for SalesforceD2cKind {
    fn service_name(&self) -> ServiceName {
        ServiceName::SalesforceD2c
    }

    fn config_schema(&self) -> SchemaType {
        SchemaType::object(vec![
            ("display_name", SchemaType::string()),
            ("shop_url", SchemaType::url()),
            ("client_id", SchemaType::string().skip_sanitize()),
            ("client_secret", SchemaType::string().skip_sanitize()),
            ("store_id", SchemaType::string().nullable()),
        ])
    }

    fn map_config(&self, service_config: &Value) -> Result<MappedConfig, EngineError> {
        let config = SalesforceD2cConfig::from_value(service_config)?;

        let resolver = SalesforceHeaderResolver {
            http: reqwest::Client::new(),
            base_endpoint: config.shop_url.clone(),
            client_id: config.client_id,
            client_secret: config.client_secret,
            token_cache: TokenCache::new(std::time::Duration::from_secs(25 * 60)),
        };

        Ok(MappedConfig {
            display_name: config.display_name,
            endpoint: config.shop_url,
            request_headers: HeaderSource::Deferred(Arc::new(resolver)),
        })
    }
}

struct SalesforceHeaderResolver {
    http: reqwest::Client,
    base_endpoint: String,
    client_id: String,
    client_secret: String,
    token_cache: TokenCache,
}

#[async_trait::async_trait]
impl HeaderResolver for SalesforceHeaderResolver {
    async fn resolve_headers(&self) -> Result<BTreeMap<String, String>, EngineError> {
        let token = match self.token_cache.get().await {
            Some(token) => token,
            None => {
                let token = generate_token(
                    &self.http,
                    &self.base_endpoint,
                    &self.client_id,
                    &self.client_secret,
                )
                .await?;
                self.token_cache.put(token.clone()).await;
                token
            }
        };

        Ok([
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Authorization".to_string(), format!("Bearer {}", token)),
        ]
        .into_iter()
        .collect())
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Client-credentials token exchange against the org's OAuth endpoint.
pub async fn generate_token(
    http: &reqwest::Client,
    base_endpoint: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<String, EngineError> {
    let response = http
        .post(format!("{}/services/oauth2/token", base_endpoint))
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id),
            ("client_secret", client_secret),
        ])
        .send()
        .await
        .map_err(|e| EngineError::upstream(format!("Token exchange failed: {}", e), None))?;

    let status = response.status();
    if !status.is_success() {
        return Err(EngineError::upstream(
            format!("Token exchange returned status {}", status),
            Some(status.as_u16()),
        ));
    }

    let token: TokenResponse = response
        .json()
        .await
        .map_err(|e| EngineError::upstream(format!("Invalid token response: {}", e), None))?;

    Ok(token.access_token)
}

/// List the org's webstores, used by the setup flow to let the user pick a
/// `store_id`.
pub async fn get_webstores(
    http: &reqwest::Client,
    base_endpoint: &str,
    client_id: &str,
    client_secret: &str,
) -> Result<Vec<WebStore>, EngineError> {
    let token = generate_token(http, base_endpoint, client_id, client_secret).await?;

    let response = http
        .get(format!(
            "{}/services/data/{}/query",
            base_endpoint, COMMERCE_API_VERSION
        ))
        .query(&[("q", "SELECT Id, Name FROM WebStore")])
        .bearer_auth(token)
        .send()
        .await
        .map_err(|e| EngineError::upstream(format!("Webstore query failed: {}", e), None))?;

    let status = response.status();
    if !status.is_success() {
        return Err(EngineError::upstream(
            format!("Webstore query returned status {}", status),
            Some(status.as_u16()),
        ));
    }

    let body: Value = response
        .json()
        .await
        .map_err(|e| EngineError::upstream(format!("Invalid webstore response: {}", e), None))?;

    let records = body
        .get("records")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    Ok(records
        .iter()
        .filter_map(|record| {
            Some(WebStore {
                id: record.get("Id")?.as_str()?.to_string(),
                name: record.get("Name")?.as_str()?.to_string(),
            })
        })
        .collect())
}

fn product_fields() -> BTreeMap<String, FieldSchema> {
    let mut fields = BTreeMap::new();
    fields.insert(
        "id".to_string(),
        FieldSchema::new("Product ID", "$.id", PrimitiveType::Id),
    );
    fields.insert(
        "name".to_string(),
        FieldSchema::new("Name", "$.name", PrimitiveType::Title),
    );
    fields.insert(
        "sku".to_string(),
        FieldSchema::new("SKU", "$.sku", PrimitiveType::String),
    );
    fields.insert(
        "description".to_string(),
        FieldSchema::new("Description", "$.fields.Description", PrimitiveType::String),
    );
    fields.insert(
        "image_url".to_string(),
        FieldSchema::new("Image URL", "$.defaultImage.url", PrimitiveType::ImageUrl),
    );
    fields.insert(
        "image_alt_text".to_string(),
        FieldSchema::new(
            "Image Alt Text",
            "$.defaultImage.alternateText",
            PrimitiveType::ImageAlt,
        ),
    );
    fields
}

/// Display query: fetch products by SKU from the configured webstore.
pub fn get_display_query(
    data_source: &HttpDataSource,
    store_id: &str,
) -> HttpQuery {
    let output_schema = OutputSchema {
        is_collection: true,
        path: Some("$.products[*]".to_string()),
        kind: OutputKind::Object(product_fields()),
    };

    let endpoint_base = format!(
        "{}/services/data/{}/commerce/webstores/{}/products",
        data_source.endpoint(),
        COMMERCE_API_VERSION,
        store_id
    );

    HttpQuery::new(data_source.clone(), output_schema)
        .with_dynamic_endpoint(Arc::new(move |inputs: &InputVariables| {
            let sku = inputs
                .get("product_sku")
                .and_then(Value::as_str)
                .unwrap_or_default();
            format!("{}?skus={}", endpoint_base, sku)
        }))
        .with_input_schema(vec![(
            "product_sku",
            InputField::new("Product SKU", "id").required(),
        )])
}

/// Search query against the webstore's product search endpoint.
pub fn get_search_query(data_source: &HttpDataSource, store_id: &str) -> HttpQuery {
    let mut fields = BTreeMap::new();
    fields.insert(
        "product_id".to_string(),
        FieldSchema::new("Product ID", "$.id", PrimitiveType::Id),
    );
    fields.insert(
        "product_sku".to_string(),
        FieldSchema::new(
            "Product SKU",
            "$.fields.StockKeepingUnit.value",
            PrimitiveType::String,
        ),
    );
    fields.insert(
        "name".to_string(),
        FieldSchema::new("Name", "$.name", PrimitiveType::Title),
    );
    fields.insert(
        "image_url".to_string(),
        FieldSchema::new("Image URL", "$.defaultImage.url", PrimitiveType::ImageUrl),
    );

    let output_schema = OutputSchema {
        is_collection: true,
        path: Some("$.productsPage.products[*]".to_string()),
        kind: OutputKind::Object(fields),
    };

    let endpoint_base = format!(
        "{}/services/data/{}/commerce/webstores/{}/search/products",
        data_source.endpoint(),
        COMMERCE_API_VERSION,
        store_id
    );

    HttpQuery::new(data_source.clone(), output_schema)
        .with_dynamic_endpoint(Arc::new(move |inputs: &InputVariables| {
            let search = inputs
                .get("search")
                .and_then(Value::as_str)
                .unwrap_or_default();
            let mut url = match url::Url::parse(&endpoint_base) {
                Ok(url) => url,
                Err(_) => return endpoint_base.clone(),
            };
            url.query_pairs_mut().append_pair("searchTerm", search);
            url.to_string()
        }))
        .with_input_schema(vec![(
            "search",
            InputField::new("Search terms", "ui:search_input").required(),
        )])
}
