use crate::model::{
    generate_uuid, ConfigMetadata, DataSourceConfig, EngineError, HttpDataSource, Id, ServiceName,
};
use crate::store::encryption::DataEncryption;
use crate::store::traits::OptionStore;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Option name holding the encrypted, JSON-serialized config list.
pub const CONFIGS_OPTION_NAME: &str = "remote_data_engine_configs";

/// A deflated config annotated with any validation errors found while
/// inflating it. Listings surface broken entries instead of aborting.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotatedConfig {
    #[serde(flatten)]
    pub config: DataSourceConfig,
    pub errors: Vec<EngineError>,
}

/// Stores data source configs as one encrypted JSON list under a single
/// option, individually addressed by UUID. Every mutation read-modify-writes
/// the full list and re-validates the target config by inflating it first;
/// an invalid config is never written.
pub struct DataSourceCrud<S> {
    store: Arc<S>,
    encryption: DataEncryption,
}

impl<S: OptionStore> DataSourceCrud<S> {
    pub fn new(store: Arc<S>, encryption: DataEncryption) -> Self {
        Self { store, encryption }
    }

    /// All stored configs, raw. A decryption or deserialization failure
    /// degrades to an empty list so one corrupt option cannot poison
    /// subsequent reads.
    async fn load_configs(&self) -> Vec<DataSourceConfig> {
        let stored = match self.store.get_option(CONFIGS_OPTION_NAME).await {
            Ok(Some(stored)) => stored,
            Ok(None) => return Vec::new(),
            Err(error) => {
                log::error!("Failed to read stored configs: {:#}", error);
                return Vec::new();
            }
        };

        let decrypted = match self.encryption.decrypt(&stored) {
            Ok(decrypted) => decrypted,
            Err(error) => {
                log::error!("Failed to decrypt stored configs: {}", error);
                return Vec::new();
            }
        };

        match serde_json::from_str(&decrypted) {
            Ok(configs) => configs,
            Err(error) => {
                log::error!("Failed to deserialize stored configs: {}", error);
                Vec::new()
            }
        }
    }

    async fn save_configs(&self, configs: &[DataSourceConfig]) -> Result<(), EngineError> {
        let serialized = serde_json::to_string(configs)
            .map_err(|e| EngineError::internal(format!("Failed to serialize configs: {}", e)))?;
        let encrypted = self.encryption.encrypt(&serialized)?;

        self.store
            .set_option(CONFIGS_OPTION_NAME, &encrypted)
            .await
            .map_err(|e| EngineError::internal(format!("Failed to persist configs: {:#}", e)))
    }

    /// All stored configs with per-entry validation errors.
    pub async fn get_configs(&self) -> Vec<AnnotatedConfig> {
        self.load_configs()
            .await
            .into_iter()
            .map(|config| {
                let errors = match HttpDataSource::from_config(&config) {
                    Ok(_) => Vec::new(),
                    Err(error) => vec![error],
                };
                AnnotatedConfig { config, errors }
            })
            .collect()
    }

    pub async fn get_config_by_uuid(&self, uuid: &Id) -> Result<DataSourceConfig, EngineError> {
        self.load_configs()
            .await
            .into_iter()
            .find(|config| config.uuid.as_ref() == Some(uuid))
            .ok_or_else(|| EngineError::not_found("data_source_not_found", "Data source not found"))
    }

    /// The live, validated data source for a stored config.
    pub async fn get_inflated_config_by_uuid(
        &self,
        uuid: &Id,
    ) -> Result<HttpDataSource, EngineError> {
        let config = self.get_config_by_uuid(uuid).await?;
        HttpDataSource::from_config(&config)
    }

    pub async fn create_config(
        &self,
        service: ServiceName,
        service_config: Value,
    ) -> Result<DataSourceConfig, EngineError> {
        let config = DataSourceConfig {
            uuid: Some(generate_uuid()),
            service,
            service_config,
            metadata: Some(ConfigMetadata::now()),
            config_source: None,
        };

        // Validate by inflation before anything touches storage.
        HttpDataSource::from_config(&config)?;

        let mut configs = self.load_configs().await;
        configs.push(config.clone());
        self.save_configs(&configs).await?;

        Ok(config)
    }

    pub async fn update_config_by_uuid(
        &self,
        uuid: &Id,
        service_config: Value,
    ) -> Result<DataSourceConfig, EngineError> {
        let mut configs = self.load_configs().await;

        let target = configs
            .iter_mut()
            .find(|config| config.uuid.as_ref() == Some(uuid))
            .ok_or_else(|| {
                EngineError::not_found("data_source_not_found", "Data source not found")
            })?;

        let mut updated = target.clone();
        updated.service_config = service_config;
        updated.metadata = Some(ConfigMetadata {
            created_at: target
                .metadata
                .as_ref()
                .map(|m| m.created_at)
                .unwrap_or_else(chrono::Utc::now),
            updated_at: chrono::Utc::now(),
        });

        HttpDataSource::from_config(&updated)?;

        *target = updated.clone();
        self.save_configs(&configs).await?;

        Ok(updated)
    }

    pub async fn delete_config_by_uuid(&self, uuid: &Id) -> Result<(), EngineError> {
        let mut configs = self.load_configs().await;
        let initial_len = configs.len();
        configs.retain(|config| config.uuid.as_ref() != Some(uuid));

        if configs.len() == initial_len {
            return Err(EngineError::not_found(
                "data_source_not_found",
                "Data source not found",
            ));
        }

        self.save_configs(&configs).await
    }
}
