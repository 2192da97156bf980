//! Duplicate relation detector
//!
//! Groups active edges by `(from, to, type)`. The detector reports every
//! group with more than one edge and never picks a survivor.

use objrel_common::{Error, Result};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

/// Which edge of a duplicate group a caller intends to keep
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepPolicy {
    /// Keep the lowest id
    #[default]
    KeepOldest,
    /// Keep the highest id
    KeepNewest,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    pub object_from_id: i64,
    pub object_to_id: i64,
    pub object_relation_type_id: i64,
    pub relation_type_code: Option<String>,
    /// Ascending
    pub relation_ids: Vec<i64>,
    pub duplicate_count: i64,
}

impl DuplicateGroup {
    /// Ids that would be removed when keeping one edge under `policy`
    pub fn surplus_ids(&self, policy: KeepPolicy) -> Vec<i64> {
        match (policy, self.relation_ids.split_first(), self.relation_ids.split_last()) {
            (KeepPolicy::KeepOldest, Some((_, rest)), _) => rest.to_vec(),
            (KeepPolicy::KeepNewest, _, Some((_, rest))) => rest.to_vec(),
            _ => Vec::new(),
        }
    }
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    object_from_id: i64,
    object_to_id: i64,
    object_relation_type_id: i64,
    relation_type_code: Option<String>,
    relation_ids: String,
}

/// Every `(from, to, type)` triple shared by more than one active edge
pub async fn scan_duplicates(pool: &SqlitePool) -> Result<Vec<DuplicateGroup>> {
    let rows = sqlx::query_as::<_, GroupRow>(
        r#"
        SELECT r.object_from_id,
               r.object_to_id,
               r.object_relation_type_id,
               MAX(rt.code) AS relation_type_code,
               GROUP_CONCAT(r.id) AS relation_ids
        FROM object_relations r
        LEFT JOIN object_relation_types rt ON rt.id = r.object_relation_type_id
        WHERE r.is_active = 1
        GROUP BY r.object_from_id, r.object_to_id, r.object_relation_type_id
        HAVING COUNT(*) > 1
        ORDER BY r.object_from_id, r.object_to_id, r.object_relation_type_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let relation_ids = parse_id_list(&row.relation_ids)?;
            Ok(DuplicateGroup {
                object_from_id: row.object_from_id,
                object_to_id: row.object_to_id,
                object_relation_type_id: row.object_relation_type_id,
                relation_type_code: row.relation_type_code,
                duplicate_count: relation_ids.len() as i64,
                relation_ids,
            })
        })
        .collect()
}

/// Parse a `GROUP_CONCAT` id list into ascending ids
fn parse_id_list(list: &str) -> Result<Vec<i64>> {
    let mut ids = list
        .split(',')
        .map(|id| id.trim().parse::<i64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Database(sqlx::Error::Decode(Box::new(e))))?;
    ids.sort_unstable();
    Ok(ids)
}
