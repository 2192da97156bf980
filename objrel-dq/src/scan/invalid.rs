//! Invalid relation detector
//!
//! Flags active edges whose endpoint types do not match their relation
//! type's parent/child, and edges whose relation type names a parent or
//! child type with no registry entry.

use objrel_common::Result;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::HashSet;

use crate::registry::EntityRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidReason {
    ParentTypeMismatch,
    ChildTypeMismatch,
    UnregisteredParentType,
    UnregisteredChildType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvalidRelation {
    pub relation_id: i64,
    pub object_from_id: i64,
    pub object_to_id: i64,
    pub object_relation_type_id: i64,
    pub relation_type_code: String,
    pub observed_from_type_id: i64,
    pub observed_to_type_id: i64,
    pub expected_from_type_id: i64,
    pub expected_to_type_id: i64,
    pub reasons: Vec<InvalidReason>,
}

#[derive(sqlx::FromRow)]
struct InvalidRow {
    relation_id: i64,
    object_from_id: i64,
    object_to_id: i64,
    object_relation_type_id: i64,
    relation_type_code: String,
    observed_from_type_id: i64,
    observed_to_type_id: i64,
    expected_from_type_id: i64,
    expected_to_type_id: i64,
}

/// Active edges violating type conformance or registry completeness
pub async fn scan_invalid(
    pool: &SqlitePool,
    registry: &EntityRegistry,
) -> Result<Vec<InvalidRelation>> {
    let registered = registry.registered_type_ids();

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT r.id AS relation_id,
               r.object_from_id,
               r.object_to_id,
               r.object_relation_type_id,
               rt.code AS relation_type_code,
               f.object_type_id AS observed_from_type_id,
               t.object_type_id AS observed_to_type_id,
               rt.parent_object_type_id AS expected_from_type_id,
               rt.child_object_type_id AS expected_to_type_id
        FROM object_relations r
        INNER JOIN object_relation_types rt ON rt.id = r.object_relation_type_id
        INNER JOIN objects f ON f.id = r.object_from_id
        INNER JOIN objects t ON t.id = r.object_to_id
        WHERE r.is_active = 1
          AND (f.object_type_id <> rt.parent_object_type_id
               OR t.object_type_id <> rt.child_object_type_id
        "#,
    );
    push_unregistered(&mut query, "rt.parent_object_type_id", &registered);
    push_unregistered(&mut query, "rt.child_object_type_id", &registered);
    query.push(") ORDER BY r.id");

    let rows = query.build_query_as::<InvalidRow>().fetch_all(pool).await?;

    let registered: HashSet<i64> = registered.into_iter().collect();
    Ok(rows
        .into_iter()
        .map(|row| {
            let mut reasons = Vec::new();
            if row.observed_from_type_id != row.expected_from_type_id {
                reasons.push(InvalidReason::ParentTypeMismatch);
            }
            if row.observed_to_type_id != row.expected_to_type_id {
                reasons.push(InvalidReason::ChildTypeMismatch);
            }
            if !registered.contains(&row.expected_from_type_id) {
                reasons.push(InvalidReason::UnregisteredParentType);
            }
            if !registered.contains(&row.expected_to_type_id) {
                reasons.push(InvalidReason::UnregisteredChildType);
            }

            InvalidRelation {
                relation_id: row.relation_id,
                object_from_id: row.object_from_id,
                object_to_id: row.object_to_id,
                object_relation_type_id: row.object_relation_type_id,
                relation_type_code: row.relation_type_code,
                observed_from_type_id: row.observed_from_type_id,
                observed_to_type_id: row.observed_to_type_id,
                expected_from_type_id: row.expected_from_type_id,
                expected_to_type_id: row.expected_to_type_id,
                reasons,
            }
        })
        .collect())
}

/// `OR <column> NOT IN (?, ...)`; with nothing registered every type is unregistered
fn push_unregistered(query: &mut QueryBuilder<'_, Sqlite>, column: &str, registered: &[i64]) {
    if registered.is_empty() {
        query.push(" OR 1 = 1");
        return;
    }

    query.push(" OR ").push(column).push(" NOT IN (");
    let mut ids = query.separated(", ");
    for id in registered {
        ids.push_bind(*id);
    }
    query.push(")");
}
