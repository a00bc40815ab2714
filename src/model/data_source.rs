use crate::model::{generate_uuid, EngineError, Id, SchemaType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceName {
    GenericHttp,
    GoogleSheets,
    Airtable,
    Shopify,
    SalesforceD2c,
}

impl ServiceName {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceName::GenericHttp => "generic-http",
            ServiceName::GoogleSheets => "google-sheets",
            ServiceName::Airtable => "airtable",
            ServiceName::Shopify => "shopify",
            ServiceName::SalesforceD2c => "salesforce-d2c",
        }
    }
}

impl std::fmt::Display for ServiceName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a config came from. Only storage-backed configs are mutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Code,
    Storage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ConfigMetadata {
    pub fn now() -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
        }
    }
}

/// The serialized (deflated) form of a data source: identity plus the raw,
/// user-supplied service configuration, preserved verbatim for round-tripping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<Id>,
    pub service: ServiceName,
    pub service_config: Value,
    #[serde(rename = "__metadata", default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ConfigMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_source: Option<ConfigSource>,
}

impl DataSourceConfig {
    pub fn new(service: ServiceName, service_config: Value) -> Self {
        Self {
            uuid: Some(generate_uuid()),
            service,
            service_config,
            metadata: Some(ConfigMetadata::now()),
            config_source: None,
        }
    }
}

/// Resolves request headers at call time. Services whose credentials require
/// a live exchange (an OAuth token fetch) implement this instead of handing
/// out a literal header map.
#[async_trait::async_trait]
pub trait HeaderResolver: Send + Sync {
    async fn resolve_headers(&self) -> Result<BTreeMap<String, String>, EngineError>;
}

/// Request headers are either a literal map or a deferred computation
/// evaluated exactly once per request at call time.
#[derive(Clone)]
pub enum HeaderSource {
    Literal(BTreeMap<String, String>),
    Deferred(Arc<dyn HeaderResolver>),
}

impl HeaderSource {
    pub fn empty() -> Self {
        HeaderSource::Literal(BTreeMap::new())
    }

    pub fn literal(pairs: Vec<(&str, String)>) -> Self {
        HeaderSource::Literal(pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    pub async fn resolve(&self) -> Result<BTreeMap<String, String>, EngineError> {
        match self {
            HeaderSource::Literal(map) => Ok(map.clone()),
            HeaderSource::Deferred(resolver) => resolver.resolve_headers().await,
        }
    }
}

impl std::fmt::Debug for HeaderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderSource::Literal(map) => f.debug_tuple("Literal").field(&map.keys()).finish(),
            HeaderSource::Deferred(_) => f.write_str("Deferred(<resolver>)"),
        }
    }
}

/// The generic shape a service kind maps its validated config into.
pub struct MappedConfig {
    pub display_name: String,
    pub endpoint: String,
    pub request_headers: HeaderSource,
}

/// Capability implemented once per service variant and selected via a
/// registry keyed by service name.
pub trait DataSourceKind: Send + Sync {
    fn service_name(&self) -> ServiceName;
    /// Schema the raw `service_config` must validate against before any
    /// derived field is trusted.
    fn config_schema(&self) -> SchemaType;
    /// Map an already-validated service config into the generic shape.
    fn map_config(&self, service_config: &Value) -> Result<MappedConfig, EngineError>;
}

/// A validated, immutable data source. An invalid config yields an error
/// value, never a partially-populated source; mutation means constructing a
/// new instance from a merged config.
#[derive(Debug, Clone)]
pub struct HttpDataSource {
    uuid: Option<Id>,
    service: ServiceName,
    service_config: Value,
    display_name: String,
    endpoint: String,
    request_headers: HeaderSource,
}

impl HttpDataSource {
    /// Construction pipeline: validate `service_config` against the service
    /// kind's schema, then map it into the generic shape. The raw config is
    /// kept verbatim so `to_config` round-trips exactly.
    pub fn from_config(config: &DataSourceConfig) -> Result<Self, EngineError> {
        let kind = crate::integrations::get_kind(config.service)?;

        crate::logic::Validator::new(kind.config_schema(), kind.service_name().as_str())
            .validate(&config.service_config)?;

        let mapped = kind.map_config(&config.service_config)?;

        Ok(Self {
            uuid: config.uuid.clone(),
            service: config.service,
            service_config: config.service_config.clone(),
            display_name: mapped.display_name,
            endpoint: mapped.endpoint,
            request_headers: mapped.request_headers,
        })
    }

    pub fn uuid(&self) -> Option<&Id> {
        self.uuid.as_ref()
    }

    pub fn service(&self) -> ServiceName {
        self.service
    }

    pub fn service_config(&self) -> &Value {
        &self.service_config
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn request_headers(&self) -> &HeaderSource {
        &self.request_headers
    }

    pub async fn resolve_headers(&self) -> Result<BTreeMap<String, String>, EngineError> {
        self.request_headers.resolve().await
    }

    pub fn to_config(&self) -> DataSourceConfig {
        DataSourceConfig {
            uuid: self.uuid.clone(),
            service: self.service,
            service_config: self.service_config.clone(),
            metadata: None,
            config_source: None,
        }
    }
}
