use crate::store::traits::OptionStore;
use anyhow::Result;
use parking_lot::RwLock;
use std::collections::HashMap;

/// In-memory option store for tests and no-database development runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    options: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl OptionStore for MemoryStore {
    async fn get_option(&self, name: &str) -> Result<Option<String>> {
        Ok(self.options.read().get(name).cloned())
    }

    async fn set_option(&self, name: &str, value: &str) -> Result<()> {
        self.options
            .write()
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    async fn delete_option(&self, name: &str) -> Result<bool> {
        Ok(self.options.write().remove(name).is_some())
    }
}
