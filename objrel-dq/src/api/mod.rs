//! HTTP API handlers for objrel-dq

pub mod bulk;
pub mod health;
pub mod registry;
pub mod relations;
pub mod scans;

pub use bulk::{bulk_delete, bulk_reassign_target, bulk_update_relation_type};
pub use health::health_routes;
pub use registry::{list_registry, reload_registry};
pub use relations::list_relations;
pub use scans::{
    scan_duplicates, scan_invalid, scan_missing_mirrors, scan_orphaned, scan_relation_types,
    scan_summary,
};

use axum::Json;
use serde::Serialize;

/// Success envelope `{ "success": true, "data": ... }`
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

pub fn ok<T: Serialize>(data: T) -> Json<Envelope<T>> {
    Json(Envelope {
        success: true,
        data,
    })
}
