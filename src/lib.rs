pub mod api;
pub mod config;
pub mod integrations;
pub mod logic;
pub mod model;
pub mod store;

// Export API types
pub use api::handlers;
pub use api::routes;

// Export logic types
pub use logic::{QueryResponseParser, QueryRunner, Sanitizer, Validator};

// Export all model types
pub use model::*;

// Export store types
pub use store::{
    ConfigRegistry, DataSourceConfigManager, DataSourceCrud, DataEncryption, MemoryStore,
    OptionStore, PostgresStore, QueryCache, Store,
};

use api::handlers::AppContext;
use std::sync::Arc;
use std::time::Duration;

/// Build the shared request context over any option store.
pub fn build_context<S: OptionStore>(
    store: Arc<S>,
    config: &config::AppConfig,
) -> anyhow::Result<Arc<AppContext<S>>> {
    let (key, salt) = config.encryption_material()?;
    let encryption = DataEncryption::new(&key, &salt)?;

    let crud = DataSourceCrud::new(store, encryption);
    let manager = DataSourceConfigManager::new(crud, ConfigRegistry::new());

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http.timeout_secs))
        .build()?;

    Ok(Arc::new(AppContext { manager, http }))
}

/// Bind and serve the API over the given store. Used by `main` and by
/// integration tests that want an in-process server.
pub async fn serve<S: OptionStore + 'static>(
    store: Arc<S>,
    config: &config::AppConfig,
) -> anyhow::Result<()> {
    use axum::serve;
    use tokio::net::TcpListener;

    let context = build_context(store, config)?;
    let app = api::routes::create_router().with_state(context);

    let bind_address = config.server_address();
    let listener = TcpListener::bind(&bind_address).await?;
    log::info!("remote-data-engine listening on http://{}", bind_address);

    serve(listener, app).await?;

    Ok(())
}

// Function for integration testing
pub async fn run_server() -> anyhow::Result<()> {
    // Load environment variables from .env file if it exists
    dotenvy::dotenv().ok();

    // Initialize logging with INFO level only (suppress DEBUG logs)
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();

    let config = config::AppConfig::load()?;

    match config.database_url() {
        Some(database_url) => {
            let postgres_store = PostgresStore::new(&database_url).await?;
            postgres_store.migrate().await?;
            serve(Arc::new(postgres_store), &config).await
        }
        None => serve(Arc::new(MemoryStore::new()), &config).await,
    }
}
