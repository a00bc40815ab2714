use crate::model::{ConfigSource, DataSourceConfig, EngineError, Id, ServiceName};
use crate::store::crud::{AnnotatedConfig, DataSourceCrud};
use crate::store::traits::OptionStore;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;

/// Configs registered by host code at startup. These are read-only at
/// runtime and merged into listings alongside storage-backed configs.
#[derive(Debug, Default)]
pub struct ConfigRegistry {
    configs: RwLock<Vec<DataSourceConfig>>,
}

impl ConfigRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, config: DataSourceConfig) {
        self.configs.write().push(config);
    }

    pub fn all(&self) -> Vec<DataSourceConfig> {
        self.configs.read().clone()
    }
}

/// Listing filters. Unknown keys are rejected rather than ignored so a
/// misspelled filter never silently returns the unfiltered list.
#[derive(Debug, Default, Clone)]
pub struct ConfigFilters {
    pub service: Option<ServiceName>,
    pub enable_blocks: Option<bool>,
}

impl ConfigFilters {
    pub fn from_query(query: &BTreeMap<String, String>) -> Result<Self, EngineError> {
        let mut filters = Self::default();

        for (key, value) in query {
            match key.as_str() {
                "service" => {
                    let service = serde_json::from_value(Value::String(value.clone()))
                        .map_err(|_| {
                            EngineError::new(
                                "invalid_filter",
                                format!("Unknown service: {}", value),
                            )
                            .with_status(400)
                        })?;
                    filters.service = Some(service);
                }
                "enable_blocks" => {
                    filters.enable_blocks = Some(value == "true" || value == "1");
                }
                other => {
                    return Err(EngineError::new(
                        "invalid_filter",
                        format!("Invalid filter: {}", other),
                    )
                    .with_status(400));
                }
            }
        }

        Ok(filters)
    }

    fn matches(&self, entry: &AnnotatedConfig) -> bool {
        if let Some(service) = self.service {
            if entry.config.service != service {
                return false;
            }
        }

        if let Some(enable_blocks) = self.enable_blocks {
            // Absent means blocks are not enabled for this source.
            let config_value = entry.config.service_config["enable_blocks"]
                .as_bool()
                .unwrap_or(false);
            if config_value != enable_blocks {
                return false;
            }
        }

        true
    }
}

/// Unified view over code-registered and storage-backed configs.
///
/// Listings merge both origins, de-duplicated by UUID with the storage copy
/// winning so a user edit can shadow a code-registered source. Mutations are
/// storage-only.
pub struct DataSourceConfigManager<S> {
    crud: DataSourceCrud<S>,
    registry: ConfigRegistry,
}

impl<S: OptionStore> DataSourceConfigManager<S> {
    pub fn new(crud: DataSourceCrud<S>, registry: ConfigRegistry) -> Self {
        Self { crud, registry }
    }

    pub async fn get_all(&self, filters: &ConfigFilters) -> Vec<AnnotatedConfig> {
        let mut storage = self.crud.get_configs().await;
        for entry in &mut storage {
            entry.config.config_source = Some(ConfigSource::Storage);
        }

        let storage_uuids: Vec<Option<Id>> =
            storage.iter().map(|e| e.config.uuid.clone()).collect();

        let mut merged: Vec<AnnotatedConfig> = self
            .registry
            .all()
            .into_iter()
            .filter(|config| {
                config.uuid.is_none() || !storage_uuids.contains(&config.uuid)
            })
            .map(|mut config| {
                config.config_source = Some(ConfigSource::Code);
                AnnotatedConfig {
                    config,
                    errors: Vec::new(),
                }
            })
            .collect();
        merged.extend(storage);

        merged
            .into_iter()
            .filter(|entry| filters.matches(entry))
            .collect()
    }

    pub async fn get(&self, uuid: &Id) -> Result<DataSourceConfig, EngineError> {
        let mut config = self.crud.get_config_by_uuid(uuid).await?;
        config.config_source = Some(ConfigSource::Storage);
        Ok(config)
    }

    pub async fn create(
        &self,
        service: ServiceName,
        service_config: Value,
    ) -> Result<DataSourceConfig, EngineError> {
        let mut config = self.crud.create_config(service, service_config).await?;
        config.config_source = Some(ConfigSource::Storage);
        Ok(config)
    }

    pub async fn update(
        &self,
        uuid: &Id,
        service_config: Value,
    ) -> Result<DataSourceConfig, EngineError> {
        // Code-registered configs share the UUID namespace but live outside
        // storage, so a storage miss is the only mutability check needed.
        if self
            .registry
            .all()
            .iter()
            .any(|c| c.uuid.as_ref() == Some(uuid))
            && self.crud.get_config_by_uuid(uuid).await.is_err()
        {
            return Err(EngineError::new(
                "cannot_update_config",
                "Cannot update a code-registered data source",
            )
            .with_status(400));
        }

        let existing = self.crud.get_config_by_uuid(uuid).await?;
        let merged = merge_service_config(&existing.service_config, service_config);

        let mut config = self.crud.update_config_by_uuid(uuid, merged).await?;
        config.config_source = Some(ConfigSource::Storage);
        Ok(config)
    }

    pub async fn delete(&self, uuid: &Id) -> Result<(), EngineError> {
        self.crud.delete_config_by_uuid(uuid).await
    }

    pub fn crud(&self) -> &DataSourceCrud<S> {
        &self.crud
    }
}

/// Shallow merge of a partial update over the stored service config. Keys
/// present in the update replace stored values wholesale.
fn merge_service_config(existing: &Value, update: Value) -> Value {
    match (existing, update) {
        (Value::Object(existing), Value::Object(update)) => {
            let mut merged = existing.clone();
            for (key, value) in update {
                merged.insert(key, value);
            }
            Value::Object(merged)
        }
        (_, update) => update,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::encryption::DataEncryption;
    use crate::store::memory::MemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn manager() -> DataSourceConfigManager<MemoryStore> {
        let crud = DataSourceCrud::new(
            Arc::new(MemoryStore::new()),
            DataEncryption::new("test-key", "test-salt").unwrap(),
        );
        DataSourceConfigManager::new(crud, ConfigRegistry::new())
    }

    fn http_config(name: &str, enable_blocks: bool) -> Value {
        json!({
            "display_name": name,
            "endpoint": "https://api.test/v1",
            "auth": {"type": "bearer", "value": "tok"},
            "enable_blocks": enable_blocks,
        })
    }

    #[tokio::test]
    async fn test_listing_merges_code_and_storage_with_storage_winning() {
        let manager = manager();
        let stored = manager
            .create(ServiceName::GenericHttp, http_config("Stored", true))
            .await
            .unwrap();

        // A code config sharing the stored UUID must be shadowed.
        let mut shadowed = DataSourceConfig::new(
            ServiceName::GenericHttp,
            http_config("Shadowed", true),
        );
        shadowed.uuid = stored.uuid.clone();
        manager.registry.register(shadowed);

        let code_only =
            DataSourceConfig::new(ServiceName::GenericHttp, http_config("Code only", true));
        manager.registry.register(code_only);

        let listed = manager.get_all(&ConfigFilters::default()).await;
        assert_eq!(listed.len(), 2);

        let names: Vec<&str> = listed
            .iter()
            .map(|e| e.config.service_config["display_name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"Stored"));
        assert!(names.contains(&"Code only"));

        let stored_entry = listed
            .iter()
            .find(|e| e.config.uuid == stored.uuid)
            .unwrap();
        assert_eq!(stored_entry.config.config_source, Some(ConfigSource::Storage));
    }

    #[tokio::test]
    async fn test_unknown_filter_key_is_rejected() {
        let mut query = BTreeMap::new();
        query.insert("servise".to_string(), "airtable".to_string());

        let error = ConfigFilters::from_query(&query).unwrap_err();
        assert_eq!(error.code, "invalid_filter");
        assert_eq!(error.status, Some(400));
    }

    #[tokio::test]
    async fn test_service_and_enable_blocks_filters() {
        let manager = manager();
        manager
            .create(ServiceName::GenericHttp, http_config("Blocks on", true))
            .await
            .unwrap();
        manager
            .create(ServiceName::GenericHttp, http_config("Blocks off", false))
            .await
            .unwrap();

        let mut query = BTreeMap::new();
        query.insert("enable_blocks".to_string(), "true".to_string());
        let filters = ConfigFilters::from_query(&query).unwrap();

        let listed = manager.get_all(&filters).await;
        assert_eq!(listed.len(), 1);
        assert_eq!(
            listed[0].config.service_config["display_name"],
            json!("Blocks on")
        );

        let mut query = BTreeMap::new();
        query.insert("service".to_string(), "shopify".to_string());
        let filters = ConfigFilters::from_query(&query).unwrap();
        assert!(manager.get_all(&filters).await.is_empty());
    }

    #[tokio::test]
    async fn test_update_merges_partial_config() {
        let manager = manager();
        let created = manager
            .create(ServiceName::GenericHttp, http_config("Before", true))
            .await
            .unwrap();
        let uuid = created.uuid.clone().unwrap();

        let updated = manager
            .update(&uuid, json!({"display_name": "After"}))
            .await
            .unwrap();

        assert_eq!(updated.service_config["display_name"], json!("After"));
        assert_eq!(
            updated.service_config["endpoint"],
            json!("https://api.test/v1")
        );
    }

    #[tokio::test]
    async fn test_code_registered_config_cannot_be_updated() {
        let manager = manager();
        let code = DataSourceConfig::new(ServiceName::GenericHttp, http_config("Code", true));
        let uuid = code.uuid.clone().unwrap();
        manager.registry.register(code);

        let error = manager
            .update(&uuid, json!({"display_name": "Nope"}))
            .await
            .unwrap_err();
        assert_eq!(error.code, "cannot_update_config");
        assert_eq!(error.status, Some(400));
    }

    #[tokio::test]
    async fn test_get_missing_uuid_is_not_found() {
        let manager = manager();
        let error = manager
            .get(&"no-such-uuid".to_string())
            .await
            .unwrap_err();
        assert_eq!(error.code, "data_source_not_found");
    }
}
