use crate::logic::parse::QueryResponseParser;
use crate::model::{
    EngineError, HttpQuery, Id, InputField, InputVariables, OutputKind, OutputSchema,
    RequestMethod, DEFAULT_QUERY_CACHE_TTL_SECS,
};
use crate::store::query_cache::QueryCache;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// Fully resolved request shape for one execution. Hashing this yields the
/// cache key, so every field must serialize deterministically (header maps
/// are ordered).
#[derive(Debug, Clone, Serialize)]
pub struct RequestDetails {
    pub method: RequestMethod,
    pub uri: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl RequestDetails {
    /// Deterministic cache key for this request shape.
    pub fn cache_key(&self) -> String {
        let serialized = serde_json::to_string(self).unwrap_or_default();
        let digest = Sha256::digest(serialized.as_bytes());
        format!("query-runner:{}", hex::encode(digest))
    }
}

/// One response metadata entry, available as a binding target alongside the
/// parsed results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataValue {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: String,
    pub value: Value,
}

/// The envelope returned by query execution. `results` is always a list so
/// the response shape is consistent; callers of singular queries inspect
/// `is_collection` on their schema and unwrap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub metadata: BTreeMap<String, MetadataValue>,
    pub pagination: Option<BTreeMap<String, Value>>,
    pub results: Value,
    pub query_id: Id,
    pub query_inputs: Vec<InputVariables>,
}

/// Executes queries: input defaulting, endpoint vetting, the HTTP call,
/// caching, preprocessing, and parsing.
pub struct QueryRunner {
    http: reqwest::Client,
    cache: Arc<QueryCache>,
    default_cache_ttl: Duration,
    allowed_url_schemes: Vec<String>,
}

impl QueryRunner {
    pub fn new(
        http: reqwest::Client,
        cache: Arc<QueryCache>,
        default_cache_ttl: Duration,
        allowed_url_schemes: Vec<String>,
    ) -> Self {
        Self {
            http,
            cache,
            default_cache_ttl,
            allowed_url_schemes,
        }
    }

    /// Execute a query once for the given input variables.
    pub async fn execute(
        &self,
        query: &HttpQuery,
        input_variables: &InputVariables,
    ) -> Result<QueryResponse, EngineError> {
        let input_variables = prepare_inputs(&query.input_schema, input_variables)?;
        let request_details = self.request_details(query, &input_variables).await?;

        let ttl = effective_ttl(query.cache_ttl(&input_variables), self.default_cache_ttl);
        let cache_key = request_details.cache_key();

        if ttl.is_some() {
            if let Some(cached) = self.cache.get(&cache_key).await {
                return cached;
            }
        }

        let raw = match self.dispatch(&request_details).await {
            Ok(raw) => raw,
            Err(error) => {
                // Failures are cached too so a broken upstream is not
                // re-requested on every render.
                if let Some(ttl) = ttl {
                    self.cache.put(&cache_key, Err(error.clone()), ttl).await;
                }
                return Err(error);
            }
        };

        let response_data = match &query.preprocess_response {
            Some(preprocess) => preprocess(raw, &input_variables),
            None => raw,
        };

        let parsed = QueryResponseParser::parse(&response_data, &query.output_schema);
        let results = if query.output_schema.is_collection {
            parsed
        } else {
            Value::Array(vec![parsed])
        };

        let response = QueryResponse {
            metadata: response_metadata(&results),
            pagination: self.parse_pagination(query, &response_data),
            results,
            query_id: query.id.clone(),
            query_inputs: vec![input_variables],
        };

        if let Some(ttl) = ttl {
            self.cache
                .put(&cache_key, Ok(response.clone()), ttl)
                .await;
        }

        Ok(response)
    }

    /// Execute a query once per input set and aggregate the results.
    ///
    /// When the query declares exactly one `id:list` input variable, the
    /// batch collapses into a single request carrying every requested id.
    /// Pagination is always disabled for batch responses.
    pub async fn execute_batch(
        &self,
        query: &HttpQuery,
        batch_input_variables: &[InputVariables],
    ) -> Result<QueryResponse, EngineError> {
        let id_list_inputs = query.id_list_inputs();

        if id_list_inputs.len() == 1 {
            let slug = id_list_inputs[0].clone();
            let ids = consolidate_id_list(batch_input_variables, &slug);

            let mut consolidated = InputVariables::new();
            consolidated.insert(slug, Value::Array(ids));
            return self.execute(query, &consolidated).await;
        }

        if batch_input_variables.len() == 1 {
            return self.execute(query, &batch_input_variables[0]).await;
        }

        let mut merged_results = Vec::new();
        let mut merged_query_inputs = Vec::new();

        for input_variables in batch_input_variables {
            let response = self.execute(query, input_variables).await?;

            if let Value::Array(results) = response.results {
                merged_results.extend(results);
            }
            merged_query_inputs.extend(response.query_inputs);
        }

        let results = Value::Array(merged_results);

        Ok(QueryResponse {
            metadata: response_metadata(&results),
            pagination: None,
            results,
            query_id: query.id.clone(),
            query_inputs: merged_query_inputs,
        })
    }

    async fn request_details(
        &self,
        query: &HttpQuery,
        input_variables: &InputVariables,
    ) -> Result<RequestDetails, EngineError> {
        let headers = query.request_headers().await?;
        let endpoint = query.endpoint(input_variables);
        let url = validate_endpoint(&endpoint, &self.allowed_url_schemes)?;

        Ok(RequestDetails {
            method: query.method,
            uri: url.to_string(),
            headers,
            body: query.request_body(input_variables),
        })
    }

    async fn dispatch(&self, request_details: &RequestDetails) -> Result<Value, EngineError> {
        let method = reqwest::Method::from_bytes(request_details.method.as_str().as_bytes())
            .map_err(|e| EngineError::internal(format!("Invalid request method: {}", e)))?;

        let mut builder = self.http.request(method, &request_details.uri);
        for (name, value) in &request_details.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request_details.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| EngineError::upstream(format!("Request failed: {}", e), None))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::upstream(
                format!("Bad status code from upstream: {}", status),
                Some(status.as_u16()),
            ));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| EngineError::upstream(format!("Invalid response body: {}", e), None))
    }

    /// Extract pagination values from the response using the query's
    /// pagination schema, flattened to `{key: value}`.
    fn parse_pagination(
        &self,
        query: &HttpQuery,
        response_data: &Value,
    ) -> Option<BTreeMap<String, Value>> {
        let fields = query.pagination_schema.as_ref()?;

        let schema = OutputSchema {
            is_collection: false,
            path: None,
            kind: OutputKind::Object(fields.clone()),
        };

        let parsed = QueryResponseParser::parse(response_data, &schema);
        let result = parsed.get("result")?.as_object()?;

        Some(
            result
                .iter()
                .map(|(key, entry)| {
                    (
                        key.clone(),
                        entry.get("value").cloned().unwrap_or(Value::Null),
                    )
                })
                .collect(),
        )
    }
}

/// Keep only declared input variables, fill defaults, and fail on missing
/// required ones.
pub fn prepare_inputs(
    input_schema: &BTreeMap<String, InputField>,
    input_variables: &InputVariables,
) -> Result<InputVariables, EngineError> {
    let mut prepared = InputVariables::new();

    for (slug, field) in input_schema {
        if let Some(value) = input_variables.get(slug) {
            prepared.insert(slug.clone(), value.clone());
        } else if let Some(default) = &field.default_value {
            prepared.insert(slug.clone(), default.clone());
        } else if field.required {
            return Err(EngineError::new(
                "missing_required_input_variable",
                format!("Missing required input variable: {}", slug),
            )
            .with_status(400));
        }
    }

    Ok(prepared)
}

/// Map a query's TTL decision to an actual cache duration. `None` means do
/// not cache at all.
fn effective_ttl(query_ttl: Option<i64>, default_ttl: Duration) -> Option<Duration> {
    match query_ttl {
        Some(ttl) if ttl < 0 => None,
        Some(ttl) => Some(Duration::from_secs(ttl as u64)),
        None => Some(default_ttl),
    }
}

/// Vet the endpoint URL: it must parse, carry an allowed scheme, and name a
/// host.
fn validate_endpoint(endpoint: &str, allowed_schemes: &[String]) -> Result<url::Url, EngineError> {
    let url = url::Url::parse(endpoint)
        .map_err(|_| EngineError::validation(format!("Unable to parse endpoint URL: {}", endpoint)))?;

    if !allowed_schemes.iter().any(|s| s == url.scheme()) {
        return Err(EngineError::validation(format!(
            "Invalid endpoint URL scheme: {}",
            url.scheme()
        )));
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(EngineError::validation("Invalid endpoint URL host"));
    }

    Ok(url)
}

/// Flatten the values of an `id:list` slug across a batch into one id list.
/// Scalar values contribute one id; array values are spliced in.
fn consolidate_id_list(batch_input_variables: &[InputVariables], slug: &str) -> Vec<Value> {
    let mut ids = Vec::new();

    for input_variables in batch_input_variables {
        match input_variables.get(slug) {
            Some(Value::Array(items)) => ids.extend(items.iter().cloned()),
            Some(value) => ids.push(value.clone()),
            None => {}
        }
    }

    ids
}

fn response_metadata(results: &Value) -> BTreeMap<String, MetadataValue> {
    let total_count = results.as_array().map(Vec::len).unwrap_or(0);

    let mut metadata = BTreeMap::new();
    metadata.insert(
        "last_updated".to_string(),
        MetadataValue {
            name: "Last updated".to_string(),
            value_type: "string".to_string(),
            value: Value::String(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
        },
    );
    metadata.insert(
        "total_count".to_string(),
        MetadataValue {
            name: "Total count".to_string(),
            value_type: "integer".to_string(),
            value: Value::from(total_count),
        },
    );

    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema_with(fields: Vec<(&str, InputField)>) -> BTreeMap<String, InputField> {
        fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }

    fn inputs(pairs: Vec<(&str, Value)>) -> InputVariables {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    #[test]
    fn test_prepare_inputs_drops_undeclared_variables() {
        let schema = schema_with(vec![("q", InputField::new("Search", "string"))]);
        let prepared =
            prepare_inputs(&schema, &inputs(vec![("q", json!("x")), ("rogue", json!(1))])).unwrap();
        assert_eq!(prepared, inputs(vec![("q", json!("x"))]));
    }

    #[test]
    fn test_prepare_inputs_applies_defaults() {
        let schema = schema_with(vec![(
            "limit",
            InputField::new("Limit", "number").with_default(json!(10)),
        )]);
        let prepared = prepare_inputs(&schema, &InputVariables::new()).unwrap();
        assert_eq!(prepared, inputs(vec![("limit", json!(10))]));
    }

    #[test]
    fn test_prepare_inputs_rejects_missing_required() {
        let schema = schema_with(vec![("id", InputField::new("Id", "id").required())]);
        let error = prepare_inputs(&schema, &InputVariables::new()).unwrap_err();
        assert_eq!(error.code, "missing_required_input_variable");
        assert_eq!(error.status, Some(400));
    }

    #[test]
    fn test_cache_key_is_stable_across_header_insertion_order() {
        let mut a = BTreeMap::new();
        a.insert("Authorization".to_string(), "Bearer x".to_string());
        a.insert("Content-Type".to_string(), "application/json".to_string());

        let mut b = BTreeMap::new();
        b.insert("Content-Type".to_string(), "application/json".to_string());
        b.insert("Authorization".to_string(), "Bearer x".to_string());

        let details_a = RequestDetails {
            method: RequestMethod::Get,
            uri: "https://api.test/items".to_string(),
            headers: a,
            body: None,
        };
        let details_b = RequestDetails {
            method: RequestMethod::Get,
            uri: "https://api.test/items".to_string(),
            headers: b,
            body: None,
        };

        assert_eq!(details_a.cache_key(), details_b.cache_key());
    }

    #[test]
    fn test_cache_key_differs_when_request_shape_differs() {
        let base = RequestDetails {
            method: RequestMethod::Get,
            uri: "https://api.test/items".to_string(),
            headers: BTreeMap::new(),
            body: None,
        };
        let other = RequestDetails {
            method: RequestMethod::Post,
            ..base.clone()
        };
        assert_ne!(base.cache_key(), other.cache_key());
    }

    #[test]
    fn test_effective_ttl_resolution() {
        let default = Duration::from_secs(300);
        assert_eq!(effective_ttl(None, default), Some(default));
        assert_eq!(effective_ttl(Some(-1), default), None);
        assert_eq!(
            effective_ttl(Some(60), default),
            Some(Duration::from_secs(60))
        );
    }

    #[test]
    fn test_validate_endpoint_enforces_scheme_and_host() {
        let schemes = vec!["https".to_string()];
        assert!(validate_endpoint("https://api.test/v1", &schemes).is_ok());
        assert!(validate_endpoint("http://api.test/v1", &schemes).is_err());
        assert!(validate_endpoint("not a url", &schemes).is_err());
    }

    #[test]
    fn test_consolidate_id_list_splices_scalars_and_arrays() {
        let batch = vec![
            inputs(vec![("record_ids", json!(["a", "b"]))]),
            inputs(vec![("record_ids", json!("c"))]),
            inputs(vec![("other", json!("ignored"))]),
        ];
        let ids = consolidate_id_list(&batch, "record_ids");
        assert_eq!(ids, vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn test_response_metadata_reports_total_count() {
        let metadata = response_metadata(&json!([1, 2, 3]));
        assert_eq!(metadata["total_count"].value, json!(3));
        assert_eq!(metadata["last_updated"].value_type, "string");
    }
}
