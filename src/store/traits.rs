use anyhow::Result;

/// Named-option persistence. Configs are stored as opaque string values
/// under well-known option names; the value format (encryption, JSON) is the
/// caller's concern.
#[async_trait::async_trait]
pub trait OptionStore: Send + Sync {
    async fn get_option(&self, name: &str) -> Result<Option<String>>;
    async fn set_option(&self, name: &str, value: &str) -> Result<()>;
    async fn delete_option(&self, name: &str) -> Result<bool>;
}

pub trait Store: OptionStore {}
impl<T: OptionStore> Store for T {}
