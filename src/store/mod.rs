pub mod config_manager;
pub mod crud;
pub mod encryption;
pub mod memory;
pub mod postgres;
pub mod query_cache;
pub mod traits;

pub use config_manager::{ConfigFilters, ConfigRegistry, DataSourceConfigManager};
pub use crud::{AnnotatedConfig, DataSourceCrud};
pub use encryption::DataEncryption;
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use query_cache::QueryCache;
pub use traits::{OptionStore, Store};
