//! objrel-dq library - relation engine and data quality service
//!
//! Lists the relations of an object across every registered entity type,
//! scans the relation graph for structural corruption and applies bulk
//! corrective batches.

use axum::Router;
use objrel_common::{EntityTypeDescriptor, Error, Result};
use sqlx::SqlitePool;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod query;
pub mod registry;
pub mod relations;
pub mod remediation;
pub mod scan;

use registry::{EntityRegistry, SharedRegistry};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Current entity registry snapshot
    pub registry: Arc<SharedRegistry>,
    /// Descriptors the registry is (re)built from
    pub descriptors: Arc<Vec<EntityTypeDescriptor>>,
    /// Budget for each scan or remediation call
    pub operation_timeout: Duration,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        registry: EntityRegistry,
        descriptors: Vec<EntityTypeDescriptor>,
        operation_timeout: Duration,
    ) -> Self {
        Self {
            db,
            registry: Arc::new(SharedRegistry::new(registry)),
            descriptors: Arc::new(descriptors),
            operation_timeout,
        }
    }
}

/// Run `operation`, failing with [`Error::Timeout`] once `limit` elapses
///
/// The operation future is dropped on expiry; an open transaction inside it
/// rolls back.
pub async fn with_timeout<T, F>(limit: Duration, operation: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, operation).await {
        Ok(result) => result,
        Err(_) => Err(Error::Timeout(limit.as_millis() as u64)),
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::{get, post};

    let api = Router::new()
        .route("/api/relations", get(api::list_relations))
        .route("/api/scans/orphaned", get(api::scan_orphaned))
        .route("/api/scans/duplicates", get(api::scan_duplicates))
        .route("/api/scans/invalid", get(api::scan_invalid))
        .route("/api/scans/missing-mirrors", get(api::scan_missing_mirrors))
        .route("/api/scans/relation-types", get(api::scan_relation_types))
        .route("/api/scans/summary", get(api::scan_summary))
        .route("/api/bulk/delete", post(api::bulk_delete))
        .route("/api/bulk/reassign-target", post(api::bulk_reassign_target))
        .route(
            "/api/bulk/update-relation-type",
            post(api::bulk_update_relation_type),
        )
        .route("/api/registry", get(api::list_registry))
        .route("/api/registry/reload", post(api::reload_registry));

    Router::new()
        .merge(api)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
