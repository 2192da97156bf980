//! Entity registry endpoints

use axum::{extract::State, Json};
use tracing::info;

use super::{ok, Envelope};
use crate::error::ApiResult;
use crate::registry::{EntityConfig, EntityRegistry};
use crate::AppState;

/// GET /api/registry
pub async fn list_registry(State(state): State<AppState>) -> Json<Envelope<Vec<EntityConfig>>> {
    ok(state.registry.snapshot().configs().to_vec())
}

/// POST /api/registry/reload
///
/// Rebuilds the registry from the configured descriptors and the current
/// object types, then swaps it in. A failed rebuild leaves the old registry.
pub async fn reload_registry(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<Vec<EntityConfig>>>> {
    let registry = EntityRegistry::load(&state.db, &state.descriptors).await?;
    let configs = registry.configs().to_vec();

    state.registry.replace(registry);
    info!("Entity registry reloaded ({} entity types)", configs.len());

    Ok(ok(configs))
}
