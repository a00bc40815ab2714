use remote_data_engine::config::AppConfig;
use remote_data_engine::store::{MemoryStore, PostgresStore};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Explicit filter to suppress noisy dependency debug logs
    use env_logger::Builder;
    use log::LevelFilter;

    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module("sqlx", LevelFilter::Warn)
        .filter_module("hyper", LevelFilter::Warn)
        .filter_module("reqwest", LevelFilter::Warn)
        .init();

    let config = AppConfig::load()?;
    log::info!(
        "Configuration loaded: server={}:{}",
        config.server.host,
        config.server.port
    );

    match config.database_url() {
        Some(database_url) => {
            log::info!("Connecting to PostgreSQL...");
            let postgres_store = PostgresStore::new(&database_url).await?;

            log::info!("Running database migrations...");
            postgres_store.migrate().await?;

            remote_data_engine::serve(Arc::new(postgres_store), &config).await
        }
        None => {
            log::warn!("No database configured, storing configs in memory only");
            remote_data_engine::serve(Arc::new(MemoryStore::new()), &config).await
        }
    }
}
