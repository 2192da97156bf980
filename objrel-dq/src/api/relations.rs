//! Relation listing endpoint

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use objrel_common::Error;
use serde::Deserialize;

use super::{ok, Envelope};
use crate::error::ApiResult;
use crate::query::{RelationOrder, RelationsRequest};
use crate::relations::RelationRow;
use crate::{with_timeout, AppState};

/// Query parameters; kept as text so malformed values get a validation envelope
#[derive(Debug, Deserialize)]
pub struct RelationsParams {
    pub object_from_id: Option<String>,
    pub relation_type_id: Option<String>,
    pub order: Option<String>,
}

impl RelationsParams {
    fn into_request(self) -> Result<RelationsRequest, Error> {
        let object_from_id = match self.object_from_id.as_deref().map(str::trim) {
            None | Some("") => {
                return Err(Error::InvalidInput("object_from_id is required".to_string()))
            }
            Some(raw) => parse_id("object_from_id", raw)?,
        };

        let relation_type_id = match self.relation_type_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_id("relation_type_id", raw)?),
        };

        let order = match self.order.as_deref().map(|o| o.trim().to_ascii_lowercase()) {
            None => RelationOrder::NewestFirst,
            Some(order) => match order.as_str() {
                "" | "desc" | "newest" => RelationOrder::NewestFirst,
                "asc" | "oldest" => RelationOrder::OldestFirst,
                other => {
                    return Err(Error::InvalidInput(format!(
                        "order must be 'desc' or 'asc', got '{}'",
                        other
                    )))
                }
            },
        };

        Ok(RelationsRequest::new(object_from_id)
            .with_relation_type(relation_type_id)
            .with_order(order))
    }
}

fn parse_id(name: &str, raw: &str) -> Result<i64, Error> {
    raw.parse::<i64>()
        .map_err(|_| Error::InvalidInput(format!("{} must be an integer, got '{}'", name, raw)))
}

/// GET /api/relations?object_from_id=&relation_type_id=&order=
pub async fn list_relations(
    State(state): State<AppState>,
    params: Result<Query<RelationsParams>, QueryRejection>,
) -> ApiResult<Json<Envelope<Vec<RelationRow>>>> {
    let Query(params) = params?;
    let request = params.into_request()?;

    let registry = state.registry.snapshot();
    let rows = with_timeout(
        state.operation_timeout,
        crate::relations::list_relations(&state.db, &registry, &request),
    )
    .await?;

    Ok(ok(rows))
}
