pub mod api;
pub mod app_state;
pub mod config;
pub mod db;
pub mod middleware;
pub mod utils;
pub mod workflow;

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_rapidoc::RapiDoc;
use utoipa_swagger_ui::SwaggerUi;

use crate::app_state::AppState;
use crate::config::{Config, StorageBackend};
use crate::db::queries::clearance::ClearanceDoc;
use crate::db::queries::notification::NotificationDoc;
use crate::db::store::{JsonFileStore, MemoryStore, PgStore, RequestStore, StoreResult};
use crate::middleware::auth::jwt_middleware;
use crate::utils::notification::NotificationCenter;
use crate::workflow::catalog::{CatalogError, WorkflowCatalog};
use crate::workflow::service::ClearanceService;

/// Opens the request store selected by `STORAGE_BACKEND`.
pub async fn build_store(config: &Config) -> StoreResult<Arc<dyn RequestStore>> {
    let store: Arc<dyn RequestStore> = match &config.storage {
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory request store; requests are lost on restart");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::File(path) => {
            tracing::info!("Using JSON request store at {}", path.display());
            Arc::new(JsonFileStore::new(path.clone()))
        }
        StorageBackend::Postgres(url) => Arc::new(PgStore::connect(url).await?),
    };
    Ok(store)
}

/// Built-in catalog unless `CATALOG_PATH` points at a replacement.
pub fn build_catalog(config: &Config) -> Result<WorkflowCatalog, CatalogError> {
    match &config.catalog_path {
        Some(path) => {
            tracing::info!("Loading workflow catalog from {}", path.display());
            WorkflowCatalog::from_file(path)
        }
        None => Ok(WorkflowCatalog::default()),
    }
}

pub fn build_state(config: Config, store: Arc<dyn RequestStore>, catalog: WorkflowCatalog) -> AppState {
    let notifications = Arc::new(NotificationCenter::new());
    let service = ClearanceService::new(store, catalog, notifications.clone());
    AppState {
        service: Arc::new(service),
        notifications,
        config: Arc::new(config),
    }
}

pub fn build_router(state: AppState) -> Router {
    let merged_doc = ClearanceDoc::openapi().merge_from(NotificationDoc::openapi());

    // Private routes
    let private_routes = Router::new()
        .merge(api::clearance::clearance_routes())
        .merge(api::notification::notification_routes())
        .route_layer(from_fn_with_state(state.clone(), jwt_middleware));

    Router::new()
        .merge(api::health::health_routes())
        .merge(private_routes)
        .merge(SwaggerUi::new("/swagger").url("/api-docs/openapi.json", merged_doc.clone()))
        .merge(RapiDoc::with_openapi("/api-docs/rapidoc.json", merged_doc).path("/rapidoc"))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
