//! Orphaned relation detector
//!
//! An active edge is orphaned when either endpoint is inactive or missing.

use objrel_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;

/// Which endpoint of an orphaned edge is dead
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InactiveSide {
    From,
    To,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrphanedRelation {
    pub relation_id: i64,
    pub object_from_id: i64,
    pub object_to_id: i64,
    pub object_relation_type_id: i64,
    pub relation_type_code: Option<String>,
    pub inactive_side: InactiveSide,
    pub from_is_active: bool,
    pub to_is_active: bool,
}

#[derive(sqlx::FromRow)]
struct OrphanRow {
    relation_id: i64,
    object_from_id: i64,
    object_to_id: i64,
    object_relation_type_id: i64,
    relation_type_code: Option<String>,
    from_is_active: bool,
    to_is_active: bool,
}

/// Active edges with an inactive or missing endpoint, ordered by edge id
pub async fn scan_orphaned(pool: &SqlitePool) -> Result<Vec<OrphanedRelation>> {
    let rows = sqlx::query_as::<_, OrphanRow>(
        r#"
        SELECT r.id AS relation_id,
               r.object_from_id,
               r.object_to_id,
               r.object_relation_type_id,
               rt.code AS relation_type_code,
               COALESCE(f.is_active, 0) AS from_is_active,
               COALESCE(t.is_active, 0) AS to_is_active
        FROM object_relations r
        LEFT JOIN objects f ON f.id = r.object_from_id
        LEFT JOIN objects t ON t.id = r.object_to_id
        LEFT JOIN object_relation_types rt ON rt.id = r.object_relation_type_id
        WHERE r.is_active = 1
          AND (COALESCE(f.is_active, 0) = 0 OR COALESCE(t.is_active, 0) = 0)
        ORDER BY r.id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let inactive_side = match (row.from_is_active, row.to_is_active) {
                (false, false) => InactiveSide::Both,
                (false, true) => InactiveSide::From,
                _ => InactiveSide::To,
            };
            OrphanedRelation {
                relation_id: row.relation_id,
                object_from_id: row.object_from_id,
                object_to_id: row.object_to_id,
                object_relation_type_id: row.object_relation_type_id,
                relation_type_code: row.relation_type_code,
                inactive_side,
                from_is_active: row.from_is_active,
                to_is_active: row.to_is_active,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::test_support::Fixture;
    use objrel_common::db::models::set_object_active;

    #[tokio::test]
    async fn test_clean_graph_has_no_orphans() {
        let fx = Fixture::new().await;
        fx.employ(fx.acme, fx.alice).await;

        assert!(scan_orphaned(&fx.pool).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reports_inactive_side() {
        let fx = Fixture::new().await;
        let to_dead = fx.employ(fx.acme, fx.alice).await;
        let both_dead = fx.employ(fx.globex, fx.bob).await;

        set_object_active(&fx.pool, fx.alice, false).await.unwrap();
        set_object_active(&fx.pool, fx.globex, false).await.unwrap();
        set_object_active(&fx.pool, fx.bob, false).await.unwrap();

        let found = scan_orphaned(&fx.pool).await.unwrap();
        assert_eq!(found.len(), 2);

        assert_eq!(found[0].relation_id, to_dead);
        assert_eq!(found[0].inactive_side, InactiveSide::To);
        assert!(found[0].from_is_active);
        assert_eq!(found[0].relation_type_code.as_deref(), Some("employs"));

        assert_eq!(found[1].relation_id, both_dead);
        assert_eq!(found[1].inactive_side, InactiveSide::Both);
    }

    #[tokio::test]
    async fn test_inactive_edges_are_ignored() {
        let fx = Fixture::new().await;
        let id = fx.employ(fx.acme, fx.alice).await;
        set_object_active(&fx.pool, fx.alice, false).await.unwrap();
        fx.deactivate_relation(id).await;

        assert!(scan_orphaned(&fx.pool).await.unwrap().is_empty());
    }
}
