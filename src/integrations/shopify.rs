use crate::model::{
    BodySource, DataSourceKind, EngineError, FieldSchema, HeaderSource, HttpDataSource, HttpQuery,
    InputField, InputVariables, MappedConfig, OutputKind, OutputSchema, PrimitiveType,
    RequestMethod, SchemaType, ServiceName,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

const STOREFRONT_API_VERSION: &str = "2024-04";

const SEARCH_PRODUCTS_QUERY: &str = r#"
query SearchProducts($search: String!) {
  products(first: 10, query: $search) {
    edges {
      node {
        id
        title
        descriptionHtml
        featuredImage { url altText }
        priceRange { minVariantPrice { amount } }
      }
    }
  }
}"#;

const GET_PRODUCT_QUERY: &str = r#"
query GetProduct($id: ID!) {
  product(id: $id) {
    id
    title
    descriptionHtml
    featuredImage { url altText }
    priceRange { minVariantPrice { amount } }
  }
}"#;

/// Shopify Storefront GraphQL API with a static access token.
pub struct ShopifyKind;

#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyConfig {
    pub display_name: String,
    pub store_name: String,
    pub access_token: String,
}

impl ShopifyConfig {
    pub fn from_value(service_config: &Value) -> Result<Self, EngineError> {
        serde_json::from_value(service_config.clone())
            .map_err(|e| EngineError::validation(format!("Invalid shopify config: {}", e)))
    }
}

impl DataSourceKind for ShopifyKind {
    fn service_name(&self) -> ServiceName {
        ServiceName::Shopify
    }

    fn config_schema(&self) -> SchemaType {
        SchemaType::object(vec![
            ("display_name", SchemaType::string()),
            ("store_name", SchemaType::string_matching("^[a-zA-Z0-9-]+$")),
            ("access_token", SchemaType::string().skip_sanitize()),
        ])
    }

    fn map_config(&self, service_config: &Value) -> Result<MappedConfig, EngineError> {
        let config = ShopifyConfig::from_value(service_config)?;

        Ok(MappedConfig {
            display_name: config.display_name,
            endpoint: format!(
                "https://{}.myshopify.com/api/{}/graphql.json",
                config.store_name, STOREFRONT_API_VERSION
            ),
            request_headers: HeaderSource::literal(vec![
                ("Content-Type", "application/json".to_string()),
                ("X-Shopify-Storefront-Access-Token", config.access_token),
            ]),
        })
    }
}

fn product_fields(node_prefix: &str) -> BTreeMap<String, FieldSchema> {
    let path = |suffix: &str| format!("{}{}", node_prefix, suffix);

    let mut fields = BTreeMap::new();
    fields.insert(
        "id".to_string(),
        FieldSchema::new("Product ID", &path(".id"), PrimitiveType::Id),
    );
    fields.insert(
        "title".to_string(),
        FieldSchema::new("Title", &path(".title"), PrimitiveType::Title),
    );
    fields.insert(
        "description".to_string(),
        FieldSchema::new("Description", &path(".descriptionHtml"), PrimitiveType::Html),
    );
    fields.insert(
        "image_url".to_string(),
        FieldSchema::new(
            "Image URL",
            &path(".featuredImage.url"),
            PrimitiveType::ImageUrl,
        ),
    );
    fields.insert(
        "image_alt".to_string(),
        FieldSchema::new(
            "Image Alt Text",
            &path(".featuredImage.altText"),
            PrimitiveType::ImageAlt,
        ),
    );
    fields.insert(
        "price".to_string(),
        FieldSchema::new(
            "Price",
            &path(".priceRange.minVariantPrice.amount"),
            PrimitiveType::CurrencyInCurrentLocale,
        ),
    );
    fields
}

/// Storefront search query (GraphQL POST, never cached by default since the
/// method is POST; an explicit TTL would be set by the caller if desired).
pub fn get_search_query(data_source: &HttpDataSource) -> HttpQuery {
    let output_schema = OutputSchema {
        is_collection: true,
        path: Some("$.data.products.edges[*]".to_string()),
        kind: OutputKind::Object(product_fields("$.node")),
    };

    HttpQuery::new(data_source.clone(), output_schema)
        .with_method(RequestMethod::Post)
        .with_input_schema(vec![(
            "search",
            InputField::new("Search terms", "ui:search_input").required(),
        )])
        .with_body(BodySource::Dynamic(Arc::new(
            |inputs: &InputVariables| {
                json!({
                    "query": SEARCH_PRODUCTS_QUERY,
                    "variables": {"search": inputs.get("search").cloned().unwrap_or(Value::Null)},
                })
            },
        )))
}

/// Single-product lookup by Storefront product id.
pub fn get_product_query(data_source: &HttpDataSource) -> HttpQuery {
    let output_schema = OutputSchema {
        is_collection: false,
        path: Some("$.data.product".to_string()),
        kind: OutputKind::Object(product_fields("$")),
    };

    HttpQuery::new(data_source.clone(), output_schema)
        .with_method(RequestMethod::Post)
        .with_input_schema(vec![(
            "id",
            InputField::new("Product ID", "id").required(),
        )])
        .with_body(BodySource::Dynamic(Arc::new(
            |inputs: &InputVariables| {
                json!({
                    "query": GET_PRODUCT_QUERY,
                    "variables": {"id": inputs.get("id").cloned().unwrap_or(Value::Null)},
                })
            },
        )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DataSourceConfig;

    fn data_source() -> HttpDataSource {
        let config = DataSourceConfig::new(
            ServiceName::Shopify,
            json!({
                "display_name": "My Store",
                "store_name": "my-store",
                "access_token": "shpat-123",
            }),
        );
        HttpDataSource::from_config(&config).unwrap()
    }

    #[tokio::test]
    async fn test_config_maps_to_storefront_graphql_endpoint() {
        let data_source = data_source();
        assert_eq!(
            data_source.endpoint(),
            "https://my-store.myshopify.com/api/2024-04/graphql.json"
        );

        let headers = data_source.resolve_headers().await.unwrap();
        assert_eq!(headers["X-Shopify-Storefront-Access-Token"], "shpat-123");
    }

    #[test]
    fn test_store_name_with_spaces_is_rejected() {
        let config = DataSourceConfig::new(
            ServiceName::Shopify,
            json!({
                "display_name": "Bad",
                "store_name": "my store",
                "access_token": "x",
            }),
        );
        assert!(HttpDataSource::from_config(&config).is_err());
    }

    #[test]
    fn test_search_query_posts_graphql_body_with_variables() {
        let query = get_search_query(&data_source());
        assert_eq!(query.method, RequestMethod::Post);

        let mut inputs = InputVariables::new();
        inputs.insert("search".to_string(), json!("boots"));

        let body = query.request_body(&inputs).unwrap();
        assert_eq!(body["variables"]["search"], json!("boots"));
        assert!(body["query"].as_str().unwrap().contains("SearchProducts"));

        // POST defaults to uncached.
        assert_eq!(query.cache_ttl(&inputs), Some(-1));
    }
}
