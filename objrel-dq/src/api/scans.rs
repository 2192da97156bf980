//! Data quality scan endpoints
//!
//! Each detector is exposed on its own route and runs under the configured
//! operation timeout.

use axum::{extract::State, Json};
use tracing::debug;

use super::{ok, Envelope};
use crate::error::ApiResult;
use crate::scan::{
    self, DuplicateGroup, InvalidRelation, MissingMirrorRelation, OrphanedRelation,
    RelationTypeIssue, ScanSummary,
};
use crate::{with_timeout, AppState};

/// GET /api/scans/orphaned
pub async fn scan_orphaned(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<Vec<OrphanedRelation>>>> {
    let found = with_timeout(state.operation_timeout, scan::scan_orphaned(&state.db)).await?;
    debug!(count = found.len(), "Orphaned relation scan");
    Ok(ok(found))
}

/// GET /api/scans/duplicates
pub async fn scan_duplicates(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<Vec<DuplicateGroup>>>> {
    let found = with_timeout(state.operation_timeout, scan::scan_duplicates(&state.db)).await?;
    debug!(groups = found.len(), "Duplicate relation scan");
    Ok(ok(found))
}

/// GET /api/scans/invalid
pub async fn scan_invalid(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<Vec<InvalidRelation>>>> {
    let registry = state.registry.snapshot();
    let found = with_timeout(
        state.operation_timeout,
        scan::scan_invalid(&state.db, &registry),
    )
    .await?;
    debug!(count = found.len(), "Invalid relation scan");
    Ok(ok(found))
}

/// GET /api/scans/missing-mirrors
pub async fn scan_missing_mirrors(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<Vec<MissingMirrorRelation>>>> {
    let found =
        with_timeout(state.operation_timeout, scan::scan_missing_mirrors(&state.db)).await?;
    debug!(count = found.len(), "Missing mirror scan");
    Ok(ok(found))
}

/// GET /api/scans/relation-types
pub async fn scan_relation_types(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<Vec<RelationTypeIssue>>>> {
    let registry = state.registry.snapshot();
    let found = with_timeout(
        state.operation_timeout,
        scan::scan_relation_types(&state.db, &registry),
    )
    .await?;
    Ok(ok(found))
}

/// GET /api/scans/summary
pub async fn scan_summary(
    State(state): State<AppState>,
) -> ApiResult<Json<Envelope<ScanSummary>>> {
    let registry = state.registry.snapshot();
    let summary = with_timeout(
        state.operation_timeout,
        scan::scan_summary(&state.db, &registry),
    )
    .await?;
    Ok(ok(summary))
}
