use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
    Json as RequestJson,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::integrations::{google_auth, salesforce_d2c};
use crate::integrations::google_auth::GoogleServiceAccountKey;
use crate::integrations::salesforce_d2c::WebStore;
use crate::model::{DataSourceConfig, EngineError, Id, ServiceName};
use crate::store::config_manager::{ConfigFilters, DataSourceConfigManager};
use crate::store::crud::AnnotatedConfig;
use crate::store::traits::OptionStore;

/// Shared per-request context: the config manager plus the outbound HTTP
/// client used by the auth helper endpoints.
pub struct AppContext<S> {
    pub manager: DataSourceConfigManager<S>,
    pub http: reqwest::Client,
}

pub type AppState<S> = Arc<AppContext<S>>;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
}

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// The one place engine errors become HTTP responses. The error's status
/// hint wins; anything without one is a 500.
fn error_response(error: EngineError) -> (StatusCode, Json<ErrorResponse>) {
    let status = error
        .status
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    (
        status,
        Json(ErrorResponse {
            error: error.code,
            message: error.message,
        }),
    )
}

pub async fn list_data_sources<S: OptionStore>(
    State(state): State<AppState<S>>,
    Query(query): Query<BTreeMap<String, String>>,
) -> Result<Json<ListResponse<AnnotatedConfig>>, (StatusCode, Json<ErrorResponse>)> {
    let filters = ConfigFilters::from_query(&query).map_err(error_response)?;
    let items = state.manager.get_all(&filters).await;
    let total = items.len();

    Ok(Json(ListResponse { items, total }))
}

pub async fn get_data_source<S: OptionStore>(
    State(state): State<AppState<S>>,
    Path(uuid): Path<Id>,
) -> Result<Json<DataSourceConfig>, (StatusCode, Json<ErrorResponse>)> {
    let config = state.manager.get(&uuid).await.map_err(error_response)?;
    Ok(Json(config))
}

#[derive(Debug, Deserialize)]
pub struct CreateDataSourceRequest {
    pub service: ServiceName,
    pub service_config: Value,
}

pub async fn create_data_source<S: OptionStore>(
    State(state): State<AppState<S>>,
    RequestJson(request): RequestJson<CreateDataSourceRequest>,
) -> Result<(StatusCode, Json<DataSourceConfig>), (StatusCode, Json<ErrorResponse>)> {
    let config = state
        .manager
        .create(request.service, request.service_config)
        .await
        .map_err(error_response)?;

    Ok((StatusCode::CREATED, Json(config)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateDataSourceRequest {
    pub service_config: Value,
}

pub async fn update_data_source<S: OptionStore>(
    State(state): State<AppState<S>>,
    Path(uuid): Path<Id>,
    RequestJson(request): RequestJson<UpdateDataSourceRequest>,
) -> Result<Json<DataSourceConfig>, (StatusCode, Json<ErrorResponse>)> {
    let config = state
        .manager
        .update(&uuid, request.service_config)
        .await
        .map_err(error_response)?;

    Ok(Json(config))
}

pub async fn delete_data_source<S: OptionStore>(
    State(state): State<AppState<S>>,
    Path(uuid): Path<Id>,
) -> Result<StatusCode, (StatusCode, Json<ErrorResponse>)> {
    state.manager.delete(&uuid).await.map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct DeleteDataSourcesRequest {
    pub uuids: Vec<Id>,
}

#[derive(Debug, Serialize)]
pub struct DeleteDataSourcesResponse {
    pub deleted: Vec<Id>,
    pub failed: BTreeMap<Id, EngineError>,
}

/// Bulk delete. Each UUID is attempted independently; a mix of successes
/// and failures reports 207 with per-UUID outcomes rather than aborting.
pub async fn delete_data_sources<S: OptionStore>(
    State(state): State<AppState<S>>,
    RequestJson(request): RequestJson<DeleteDataSourcesRequest>,
) -> (StatusCode, Json<DeleteDataSourcesResponse>) {
    let mut deleted = Vec::new();
    let mut failed = BTreeMap::new();

    for uuid in request.uuids {
        match state.manager.delete(&uuid).await {
            Ok(()) => deleted.push(uuid),
            Err(error) => {
                failed.insert(uuid, error);
            }
        }
    }

    let status = if failed.is_empty() {
        StatusCode::OK
    } else if deleted.is_empty() {
        StatusCode::BAD_REQUEST
    } else {
        StatusCode::MULTI_STATUS
    };

    (status, Json(DeleteDataSourcesResponse { deleted, failed }))
}

#[derive(Debug, Deserialize)]
pub struct GoogleTokenRequest {
    pub credentials: GoogleServiceAccountKey,
    pub scopes: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct GoogleTokenResponse {
    pub token: String,
}

/// Setup-flow helper: exchange submitted service-account credentials for an
/// access token so the caller can verify them before saving a config.
pub async fn google_access_token<S: OptionStore>(
    State(state): State<AppState<S>>,
    RequestJson(request): RequestJson<GoogleTokenRequest>,
) -> Result<Json<GoogleTokenResponse>, (StatusCode, Json<ErrorResponse>)> {
    let scopes: Vec<&str> = request.scopes.iter().map(String::as_str).collect();
    let token = google_auth::generate_token(&state.http, &request.credentials, &scopes)
        .await
        .map_err(error_response)?;

    Ok(Json(GoogleTokenResponse { token }))
}

#[derive(Debug, Deserialize)]
pub struct SalesforceStoresRequest {
    pub shop_url: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Serialize)]
pub struct SalesforceStoresResponse {
    pub webstores: Vec<WebStore>,
}

/// Setup-flow helper: list the org's webstores so the caller can pick a
/// `store_id` for the config.
pub async fn salesforce_webstores<S: OptionStore>(
    State(state): State<AppState<S>>,
    RequestJson(request): RequestJson<SalesforceStoresRequest>,
) -> Result<Json<SalesforceStoresResponse>, (StatusCode, Json<ErrorResponse>)> {
    let webstores = salesforce_d2c::get_webstores(
        &state.http,
        &request.shop_url,
        &request.client_id,
        &request.client_secret,
    )
    .await
    .map_err(error_response)?;

    Ok(Json(SalesforceStoresResponse { webstores }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_hint_wins() {
        let (status, body) = error_response(EngineError::not_found(
            "data_source_not_found",
            "Data source not found",
        ));
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "data_source_not_found");
    }

    #[test]
    fn test_error_without_status_is_500() {
        let (status, _) = error_response(EngineError::new("mystery", "no status hint"));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
