//! Missing mirror detector
//!
//! For a relation type with an active mirror type, every active edge
//! `a -> b` needs an active `b -> a` edge of the mirror type.

use objrel_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct MissingMirrorRelation {
    pub relation_id: i64,
    pub object_from_id: i64,
    pub object_to_id: i64,
    pub object_relation_type_id: i64,
    pub relation_type_code: String,
    pub expected_mirror_type_id: i64,
    pub expected_mirror_type_code: String,
    pub expected_mirror_type_name: String,
}

/// Active edges lacking their reverse edge, ordered by edge id
pub async fn scan_missing_mirrors(pool: &SqlitePool) -> Result<Vec<MissingMirrorRelation>> {
    let found = sqlx::query_as::<_, MissingMirrorRelation>(
        r#"
        SELECT r.id AS relation_id,
               r.object_from_id,
               r.object_to_id,
               r.object_relation_type_id,
               rt.code AS relation_type_code,
               m.id AS expected_mirror_type_id,
               m.code AS expected_mirror_type_code,
               m.name AS expected_mirror_type_name
        FROM object_relations r
        INNER JOIN object_relation_types rt ON rt.id = r.object_relation_type_id
        INNER JOIN object_relation_types m ON m.id = rt.mirrored_type_id AND m.is_active = 1
        WHERE r.is_active = 1
          AND NOT EXISTS (
              SELECT 1
              FROM object_relations x
              WHERE x.object_from_id = r.object_to_id
                AND x.object_to_id = r.object_from_id
                AND x.object_relation_type_id = m.id
                AND x.is_active = 1
          )
        ORDER BY r.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(found)
}
