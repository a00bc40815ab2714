use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::api::handlers::{self, AppState};
use crate::store::traits::OptionStore;

pub fn create_router<S: OptionStore + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Data source management
        .route("/data-sources", get(handlers::list_data_sources::<S>))
        .route("/data-sources", post(handlers::create_data_source::<S>))
        .route("/data-sources", delete(handlers::delete_data_sources::<S>))
        .route("/data-sources/:uuid", get(handlers::get_data_source::<S>))
        .route("/data-sources/:uuid", put(handlers::update_data_source::<S>))
        .route(
            "/data-sources/:uuid",
            delete(handlers::delete_data_source::<S>),
        )
        // Credential helpers for the setup flow
        .route("/auth/google/token", post(handlers::google_access_token::<S>))
        .route(
            "/auth/salesforce-d2c/stores",
            post(handlers::salesforce_webstores::<S>),
        )
}
