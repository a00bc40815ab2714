use crate::model::output_schema::{FieldSchema, OutputSchema, PreprocessFn};
use crate::model::{generate_uuid, HeaderSource, HttpDataSource, Id, InputVariables, RequestMethod};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

pub type EndpointFn = Arc<dyn Fn(&InputVariables) -> String + Send + Sync>;
pub type BodyFn = Arc<dyn Fn(&InputVariables) -> Value + Send + Sync>;
pub type TtlFn = Arc<dyn Fn(&InputVariables) -> i64 + Send + Sync>;

/// Global default applied when a GET query does not configure a TTL.
pub const DEFAULT_QUERY_CACHE_TTL_SECS: u64 = 300;

/// The `id:list` input type, which batch execution can consolidate into a
/// single request.
pub const INPUT_TYPE_ID_LIST: &str = "id:list";

#[derive(Clone)]
pub enum EndpointSource {
    Literal(String),
    Dynamic(EndpointFn),
}

#[derive(Clone)]
pub enum BodySource {
    Literal(Value),
    Dynamic(BodyFn),
}

/// Per-query cache policy. `Default` defers to the method-based rule:
/// non-GET requests are never cached, GET requests use the global default.
#[derive(Clone, Default)]
pub enum CacheTtl {
    #[default]
    Default,
    Disabled,
    Seconds(u32),
    Dynamic(TtlFn),
}

/// One accepted input variable, declared with a semantic type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputField {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default = "InputField::default_type")]
    pub field_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub required: bool,
}

impl InputField {
    fn default_type() -> String {
        "string".to_string()
    }

    pub fn new(name: &str, field_type: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            field_type: field_type.to_string(),
            default_value: None,
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// Binds a data source to a specific request shape. Constructed once per
/// registered query definition; `execute`/`execute_batch` (on the runner)
/// take input variables per call and never mutate the query.
#[derive(Clone)]
pub struct HttpQuery {
    pub id: Id,
    pub data_source: HttpDataSource,
    pub endpoint: Option<EndpointSource>,
    pub method: RequestMethod,
    pub request_body: Option<BodySource>,
    pub request_headers: Option<HeaderSource>,
    pub input_schema: BTreeMap<String, InputField>,
    pub output_schema: OutputSchema,
    pub pagination_schema: Option<BTreeMap<String, FieldSchema>>,
    pub cache_ttl: CacheTtl,
    pub preprocess_response: Option<PreprocessFn>,
}

impl HttpQuery {
    pub fn new(data_source: HttpDataSource, output_schema: OutputSchema) -> Self {
        Self {
            id: generate_uuid(),
            data_source,
            endpoint: None,
            method: RequestMethod::Get,
            request_body: None,
            request_headers: None,
            input_schema: BTreeMap::new(),
            output_schema,
            pagination_schema: None,
            cache_ttl: CacheTtl::Default,
            preprocess_response: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(EndpointSource::Literal(endpoint.to_string()));
        self
    }

    pub fn with_dynamic_endpoint(mut self, endpoint: EndpointFn) -> Self {
        self.endpoint = Some(EndpointSource::Dynamic(endpoint));
        self
    }

    pub fn with_method(mut self, method: RequestMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_body(mut self, body: BodySource) -> Self {
        self.request_body = Some(body);
        self
    }

    pub fn with_headers(mut self, headers: HeaderSource) -> Self {
        self.request_headers = Some(headers);
        self
    }

    pub fn with_input_schema(mut self, fields: Vec<(&str, InputField)>) -> Self {
        self.input_schema = fields
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        self
    }

    pub fn with_pagination_schema(mut self, fields: BTreeMap<String, FieldSchema>) -> Self {
        self.pagination_schema = Some(fields);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: CacheTtl) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn with_preprocess(mut self, preprocess: PreprocessFn) -> Self {
        self.preprocess_response = Some(preprocess);
        self
    }

    /// Endpoint for this request: the query's literal or computed override,
    /// falling back to the data source's endpoint.
    pub fn endpoint(&self, input_variables: &InputVariables) -> String {
        match &self.endpoint {
            Some(EndpointSource::Literal(endpoint)) => endpoint.clone(),
            Some(EndpointSource::Dynamic(f)) => f(input_variables),
            None => self.data_source.endpoint().to_string(),
        }
    }

    pub fn request_body(&self, input_variables: &InputVariables) -> Option<Value> {
        match &self.request_body {
            Some(BodySource::Literal(body)) => Some(body.clone()),
            Some(BodySource::Dynamic(f)) => Some(f(input_variables)),
            None => None,
        }
    }

    /// Headers for this request, falling back to the data source's. Deferred
    /// sources are resolved here, at call time.
    pub async fn request_headers(
        &self,
    ) -> Result<BTreeMap<String, String>, crate::model::EngineError> {
        match &self.request_headers {
            Some(source) => source.resolve().await,
            None => self.data_source.resolve_headers().await,
        }
    }

    /// Cache TTL decision for this request.
    ///
    /// `Some(secs)` caches for that long, `Some(-1)` disables caching, `None`
    /// defers to the global default. Without an explicit policy, non-GET
    /// requests are never cached.
    pub fn cache_ttl(&self, input_variables: &InputVariables) -> Option<i64> {
        match &self.cache_ttl {
            CacheTtl::Seconds(secs) => Some(*secs as i64),
            CacheTtl::Disabled => Some(-1),
            CacheTtl::Dynamic(f) => {
                let ttl = f(input_variables);
                Some(if ttl < 0 { -1 } else { ttl })
            }
            CacheTtl::Default => {
                if self.method.is_get() {
                    None
                } else {
                    Some(-1)
                }
            }
        }
    }

    /// Slugs of input variables with the `id:list` type. When a query exposes
    /// exactly one, batch execution consolidates into a single request.
    pub fn id_list_inputs(&self) -> Vec<&String> {
        self.input_schema
            .iter()
            .filter(|(_, field)| field.field_type == INPUT_TYPE_ID_LIST)
            .map(|(slug, _)| slug)
            .collect()
    }
}

impl std::fmt::Debug for HttpQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpQuery")
            .field("id", &self.id)
            .field("service", &self.data_source.service())
            .field("method", &self.method)
            .field("input_schema", &self.input_schema)
            .field("output_schema", &self.output_schema)
            .finish()
    }
}
