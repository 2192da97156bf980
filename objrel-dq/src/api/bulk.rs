//! Bulk remediation endpoints

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use objrel_common::Error;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiResult;
use crate::remediation::{self, BulkOutcome};
use crate::{with_timeout, AppState};

#[derive(Debug, Deserialize)]
pub struct BulkDeleteRequest {
    pub ids: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct ReassignTargetRequest {
    pub ids: Vec<Value>,
    pub old_to: i64,
    pub new_to: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRelationTypeRequest {
    pub ids: Vec<Value>,
    pub old_type: i64,
    pub new_type: i64,
}

/// `{ "success": true, "affected_count": n, "data": { ... } }`
#[derive(Debug, Serialize)]
pub struct BulkResponse {
    pub success: bool,
    pub affected_count: u64,
    pub data: BulkOutcome,
}

impl From<BulkOutcome> for BulkResponse {
    fn from(outcome: BulkOutcome) -> Self {
        Self {
            success: true,
            affected_count: outcome.affected_count,
            data: outcome,
        }
    }
}

/// Accept only JSON integers; anything else names its position
fn parse_ids(values: &[Value]) -> Result<Vec<i64>, Error> {
    let mut ids = Vec::with_capacity(values.len());
    let mut malformed = Vec::new();

    for (index, value) in values.iter().enumerate() {
        match value.as_i64() {
            Some(id) => ids.push(id),
            None => malformed.push(format!("[{}] {}", index, value)),
        }
    }

    if malformed.is_empty() {
        Ok(ids)
    } else {
        Err(Error::InvalidInput(format!(
            "ids must be integers: {}",
            malformed.join(", ")
        )))
    }
}

/// POST /api/bulk/delete
pub async fn bulk_delete(
    State(state): State<AppState>,
    body: Result<Json<BulkDeleteRequest>, JsonRejection>,
) -> ApiResult<Json<BulkResponse>> {
    let Json(body) = body?;
    let ids = parse_ids(&body.ids)?;

    let outcome = with_timeout(
        state.operation_timeout,
        remediation::bulk_delete(&state.db, &ids),
    )
    .await?;

    Ok(Json(outcome.into()))
}

/// POST /api/bulk/reassign-target
pub async fn bulk_reassign_target(
    State(state): State<AppState>,
    body: Result<Json<ReassignTargetRequest>, JsonRejection>,
) -> ApiResult<Json<BulkResponse>> {
    let Json(body) = body?;
    let ids = parse_ids(&body.ids)?;

    let outcome = with_timeout(
        state.operation_timeout,
        remediation::bulk_reassign_target(&state.db, &ids, body.old_to, body.new_to),
    )
    .await?;

    Ok(Json(outcome.into()))
}

/// POST /api/bulk/update-relation-type
pub async fn bulk_update_relation_type(
    State(state): State<AppState>,
    body: Result<Json<UpdateRelationTypeRequest>, JsonRejection>,
) -> ApiResult<Json<BulkResponse>> {
    let Json(body) = body?;
    let ids = parse_ids(&body.ids)?;

    let outcome = with_timeout(
        state.operation_timeout,
        remediation::bulk_update_relation_type(&state.db, &ids, body.old_type, body.new_type),
    )
    .await?;

    Ok(Json(outcome.into()))
}
