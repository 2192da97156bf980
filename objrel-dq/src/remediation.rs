//! Bulk Remediation Engine
//!
//! Corrective batch operations over caller-supplied relation ids. Every batch
//! validates fully and mutates inside one transaction: either every edge is
//! changed or none is. Dropping an operation before commit (cancellation or
//! timeout) rolls the transaction back.

use objrel_common::db::models::ObjectRelationType;
use objrel_common::{Error, Result};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool, Transaction};
use std::collections::{BTreeSet, HashSet};
use tracing::info;

/// Largest id set accepted in one batch
pub const MAX_BATCH_SIZE: usize = 5000;

/// Result of a committed batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
    /// Distinct ids in the request
    pub requested: usize,
    /// Edges whose row actually changed
    pub affected_count: u64,
}

/// Deduplicate and sort a caller-supplied id set
pub fn normalize_ids(ids: &[i64]) -> Result<Vec<i64>> {
    if ids.is_empty() {
        return Err(Error::InvalidInput("ids must not be empty".to_string()));
    }

    let invalid: Vec<String> = ids
        .iter()
        .filter(|id| **id <= 0)
        .map(|id| id.to_string())
        .collect();
    if !invalid.is_empty() {
        return Err(Error::InvalidInput(format!(
            "ids must be positive integers (got {})",
            invalid.join(", ")
        )));
    }

    let ids: Vec<i64> = ids.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
    if ids.len() > MAX_BATCH_SIZE {
        return Err(Error::InvalidInput(format!(
            "Batch of {} ids exceeds the limit of {}",
            ids.len(),
            MAX_BATCH_SIZE
        )));
    }

    Ok(ids)
}

/// Soft-delete every edge in `ids`
///
/// Edges that are already inactive are left untouched and not counted.
pub async fn bulk_delete(pool: &SqlitePool, ids: &[i64]) -> Result<BulkOutcome> {
    let ids = normalize_ids(ids)?;
    let mut tx = begin_batch(pool).await?;

    let edges = load_edges(&mut tx, &ids).await?;
    ensure_all_found(&ids, &edges)?;

    let mut update: QueryBuilder<Sqlite> = QueryBuilder::new(
        "UPDATE object_relations SET is_active = 0, updated_at = CURRENT_TIMESTAMP \
         WHERE is_active = 1 AND id",
    );
    push_id_list(&mut update, &ids);
    let affected_count = update.build().execute(&mut *tx).await?.rows_affected();

    tx.commit().await?;

    info!(
        operation = "bulk_delete",
        requested = ids.len(),
        affected = affected_count,
        "Bulk remediation committed"
    );
    Ok(BulkOutcome {
        requested: ids.len(),
        affected_count,
    })
}

/// Point every edge in `ids` from `old_to` at `new_to`
pub async fn bulk_reassign_target(
    pool: &SqlitePool,
    ids: &[i64],
    old_to: i64,
    new_to: i64,
) -> Result<BulkOutcome> {
    let ids = normalize_ids(ids)?;
    require_positive("old_to", old_to)?;
    require_positive("new_to", new_to)?;
    if old_to == new_to {
        return Err(Error::InvalidInput(format!(
            "old_to and new_to are both {}",
            old_to
        )));
    }

    let mut tx = begin_batch(pool).await?;

    let edges = load_edges(&mut tx, &ids).await?;
    ensure_all_found(&ids, &edges)?;

    let elsewhere = offending(&edges, |e| e.object_to_id != old_to);
    if !elsewhere.is_empty() {
        return Err(Error::InvalidInput(format!(
            "Relations do not point at object {}: {}",
            old_to,
            join_ids(&elsewhere)
        )));
    }

    let target: Option<(i64, bool)> =
        sqlx::query_as("SELECT object_type_id, is_active FROM objects WHERE id = ?")
            .bind(new_to)
            .fetch_optional(&mut *tx)
            .await?;
    let target_type_id = match target {
        None => {
            return Err(Error::NotFound {
                message: "Target object does not exist".to_string(),
                ids: vec![new_to],
            })
        }
        Some((_, false)) => {
            return Err(Error::ConstraintViolation {
                message: "Target object is inactive".to_string(),
                ids: vec![new_to],
            })
        }
        Some((type_id, true)) => type_id,
    };

    let nonconforming = offending(&edges, |e| e.child_type_id != target_type_id);
    if !nonconforming.is_empty() {
        return Err(Error::ConstraintViolation {
            message: format!(
                "Object {} (type {}) is not the child type of these relations",
                new_to, target_type_id
            ),
            ids: nonconforming,
        });
    }

    let mut update: QueryBuilder<Sqlite> =
        QueryBuilder::new("UPDATE object_relations SET object_to_id = ");
    update
        .push_bind(new_to)
        .push(", updated_at = CURRENT_TIMESTAMP WHERE id");
    push_id_list(&mut update, &ids);
    let affected_count = update.build().execute(&mut *tx).await?.rows_affected();

    tx.commit().await?;

    info!(
        operation = "bulk_reassign_target",
        requested = ids.len(),
        affected = affected_count,
        old_to,
        new_to,
        "Bulk remediation committed"
    );
    Ok(BulkOutcome {
        requested: ids.len(),
        affected_count,
    })
}

/// Retype every edge in `ids` from `old_type` to `new_type`
pub async fn bulk_update_relation_type(
    pool: &SqlitePool,
    ids: &[i64],
    old_type: i64,
    new_type: i64,
) -> Result<BulkOutcome> {
    let ids = normalize_ids(ids)?;
    require_positive("old_type", old_type)?;
    require_positive("new_type", new_type)?;
    if old_type == new_type {
        return Err(Error::InvalidInput(format!(
            "old_type and new_type are both {}",
            old_type
        )));
    }

    let mut tx = begin_batch(pool).await?;

    let relation_type = sqlx::query_as::<_, ObjectRelationType>(
        r#"
        SELECT id, code, name, parent_object_type_id, child_object_type_id,
               mirrored_type_id, is_active
        FROM object_relation_types
        WHERE id = ?
        "#,
    )
    .bind(new_type)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| Error::NotFound {
        message: "Relation type does not exist".to_string(),
        ids: vec![new_type],
    })?;
    if !relation_type.is_active {
        return Err(Error::ConstraintViolation {
            message: format!("Relation type '{}' is inactive", relation_type.code),
            ids: vec![new_type],
        });
    }

    let edges = load_edges(&mut tx, &ids).await?;
    ensure_all_found(&ids, &edges)?;

    let other_type = offending(&edges, |e| e.object_relation_type_id != old_type);
    if !other_type.is_empty() {
        return Err(Error::InvalidInput(format!(
            "Relations are not of type {}: {}",
            old_type,
            join_ids(&other_type)
        )));
    }

    let nonconforming = offending(&edges, |e| {
        e.from_type_id != Some(relation_type.parent_object_type_id)
            || e.to_type_id != Some(relation_type.child_object_type_id)
    });
    if !nonconforming.is_empty() {
        return Err(Error::ConstraintViolation {
            message: format!(
                "Endpoints do not conform to relation type '{}'",
                relation_type.code
            ),
            ids: nonconforming,
        });
    }

    let mut update: QueryBuilder<Sqlite> =
        QueryBuilder::new("UPDATE object_relations SET object_relation_type_id = ");
    update
        .push_bind(new_type)
        .push(", updated_at = CURRENT_TIMESTAMP WHERE id");
    push_id_list(&mut update, &ids);
    let affected_count = update.build().execute(&mut *tx).await?.rows_affected();

    tx.commit().await?;

    info!(
        operation = "bulk_update_relation_type",
        requested = ids.len(),
        affected = affected_count,
        old_type,
        new_type,
        "Bulk remediation committed"
    );
    Ok(BulkOutcome {
        requested: ids.len(),
        affected_count,
    })
}

/// Open a batch transaction holding the write lock from its first statement
///
/// A deferred transaction that reads before writing cannot wait for a
/// concurrent writer: its upgrade fails with SQLITE_BUSY_SNAPSHOT. Taking the
/// lock in `BEGIN IMMEDIATE` lets the busy timeout queue competing batches.
async fn begin_batch(pool: &SqlitePool) -> Result<Transaction<'static, Sqlite>> {
    Ok(pool.begin_with("BEGIN IMMEDIATE").await?)
}

/// Edge with the types it is checked against
#[derive(Debug, sqlx::FromRow)]
struct EdgeRow {
    id: i64,
    object_to_id: i64,
    object_relation_type_id: i64,
    child_type_id: i64,
    from_type_id: Option<i64>,
    to_type_id: Option<i64>,
}

async fn load_edges(conn: &mut SqliteConnection, ids: &[i64]) -> Result<Vec<EdgeRow>> {
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        r#"
        SELECT r.id,
               r.object_to_id,
               r.object_relation_type_id,
               rt.child_object_type_id AS child_type_id,
               f.object_type_id AS from_type_id,
               t.object_type_id AS to_type_id
        FROM object_relations r
        INNER JOIN object_relation_types rt ON rt.id = r.object_relation_type_id
        LEFT JOIN objects f ON f.id = r.object_from_id
        LEFT JOIN objects t ON t.id = r.object_to_id
        WHERE r.id"#,
    );
    push_id_list(&mut query, ids);
    query.push(" ORDER BY r.id");

    let edges = query.build_query_as::<EdgeRow>().fetch_all(&mut *conn).await?;
    Ok(edges)
}

/// ` IN (?, ?, ...)` with one bound placeholder per id
fn push_id_list(query: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    query.push(" IN (");
    let mut list = query.separated(", ");
    for id in ids {
        list.push_bind(*id);
    }
    list.push_unseparated(")");
}

fn ensure_all_found(ids: &[i64], edges: &[EdgeRow]) -> Result<()> {
    let found: HashSet<i64> = edges.iter().map(|e| e.id).collect();
    let missing: Vec<i64> = ids.iter().copied().filter(|id| !found.contains(id)).collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(Error::NotFound {
            message: "Relations do not exist".to_string(),
            ids: missing,
        })
    }
}

fn offending(edges: &[EdgeRow], predicate: impl Fn(&EdgeRow) -> bool) -> Vec<i64> {
    edges.iter().filter(|e| predicate(e)).map(|e| e.id).collect()
}

fn require_positive(name: &str, value: i64) -> Result<()> {
    if value <= 0 {
        return Err(Error::InvalidInput(format!(
            "{} must be a positive integer, got {}",
            name, value
        )));
    }
    Ok(())
}

fn join_ids(ids: &[i64]) -> String {
    ids.iter().map(|id| id.to_string()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::test_support::Fixture;
    use objrel_common::db::models::{
        insert_relation, insert_relation_type, load_relation, set_object_active,
    };

    #[test]
    fn test_normalize_ids() {
        assert_eq!(normalize_ids(&[5, 3, 5, 1]).unwrap(), vec![1, 3, 5]);
        assert_eq!(normalize_ids(&[]).unwrap_err().code(), "VALIDATION_ERROR");
        assert_eq!(normalize_ids(&[1, 0]).unwrap_err().code(), "VALIDATION_ERROR");
        assert_eq!(normalize_ids(&[-4]).unwrap_err().code(), "VALIDATION_ERROR");

        let too_many: Vec<i64> = (1..=MAX_BATCH_SIZE as i64 + 1).collect();
        assert!(normalize_ids(&too_many).is_err());
        // duplicates count once toward the limit
        let repeated: Vec<i64> = std::iter::repeat(7).take(MAX_BATCH_SIZE * 2).collect();
        assert_eq!(normalize_ids(&repeated).unwrap(), vec![7]);
    }

    #[tokio::test]
    async fn test_bulk_delete_counts_only_flipped_edges() {
        let fx = Fixture::new().await;
        let a = fx.employ(fx.acme, fx.alice).await;
        let b = fx.employ(fx.acme, fx.bob).await;
        fx.deactivate_relation(b).await;

        let outcome = bulk_delete(&fx.pool, &[a, b, a]).await.unwrap();
        assert_eq!(outcome.requested, 2);
        assert_eq!(outcome.affected_count, 1);

        let again = bulk_delete(&fx.pool, &[a, b]).await.unwrap();
        assert_eq!(again.affected_count, 0);
        assert!(!load_relation(&fx.pool, a).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_bulk_delete_missing_id_changes_nothing() {
        let fx = Fixture::new().await;
        let a = fx.employ(fx.acme, fx.alice).await;

        let err = bulk_delete(&fx.pool, &[a, 9_999, 8_888]).await.unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.offending_ids(), &[8_888, 9_999]);
        assert!(load_relation(&fx.pool, a).await.unwrap().unwrap().is_active);
    }

    #[tokio::test]
    async fn test_reassign_target() {
        let fx = Fixture::new().await;
        let a = fx.employ(fx.acme, fx.alice).await;
        let b = fx.employ(fx.globex, fx.alice).await;

        let outcome = bulk_reassign_target(&fx.pool, &[a, b], fx.alice, fx.bob)
            .await
            .unwrap();
        assert_eq!(outcome.affected_count, 2);

        for id in [a, b] {
            let edge = load_relation(&fx.pool, id).await.unwrap().unwrap();
            assert_eq!(edge.object_to_id, fx.bob);
        }
    }

    #[tokio::test]
    async fn test_reassign_rejects_wrong_old_target_and_bad_new_target() {
        let fx = Fixture::new().await;
        let a = fx.employ(fx.acme, fx.alice).await;
        let b = fx.employ(fx.acme, fx.bob).await;

        let err = bulk_reassign_target(&fx.pool, &[a, b], fx.alice, fx.bob)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = bulk_reassign_target(&fx.pool, &[a], fx.alice, fx.alice)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        let err = bulk_reassign_target(&fx.pool, &[a], fx.alice, 77_777)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.offending_ids(), &[77_777]);

        // a document is not a valid child of `employs`
        let err = bulk_reassign_target(&fx.pool, &[a], fx.alice, fx.contract)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONSTRAINT_VIOLATION");
        assert_eq!(err.offending_ids(), &[a]);

        set_object_active(&fx.pool, fx.bob, false).await.unwrap();
        let err = bulk_reassign_target(&fx.pool, &[a], fx.alice, fx.bob)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONSTRAINT_VIOLATION");

        let edge = load_relation(&fx.pool, a).await.unwrap().unwrap();
        assert_eq!(edge.object_to_id, fx.alice);
    }

    #[tokio::test]
    async fn test_update_relation_type() {
        let fx = Fixture::new().await;
        let hires =
            insert_relation_type(&fx.pool, "hires", "Hires", fx.company_type, fx.person_type)
                .await
                .unwrap();
        let a = fx.employ(fx.acme, fx.alice).await;

        let outcome = bulk_update_relation_type(&fx.pool, &[a], fx.employs, hires)
            .await
            .unwrap();
        assert_eq!(outcome.affected_count, 1);
        let edge = load_relation(&fx.pool, a).await.unwrap().unwrap();
        assert_eq!(edge.object_relation_type_id, hires);
    }

    #[tokio::test]
    async fn test_update_relation_type_is_all_or_nothing() {
        let fx = Fixture::new().await;
        let good = fx.employ(fx.acme, fx.alice).await;
        // backwards edge: person -> company under `employs`
        let bad = insert_relation(&fx.pool, fx.bob, fx.globex, fx.employs, None)
            .await
            .unwrap();
        let hires =
            insert_relation_type(&fx.pool, "hires", "Hires", fx.company_type, fx.person_type)
                .await
                .unwrap();

        let err = bulk_update_relation_type(&fx.pool, &[good, bad], fx.employs, hires)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONSTRAINT_VIOLATION");
        assert_eq!(err.offending_ids(), &[bad]);

        for id in [good, bad] {
            let edge = load_relation(&fx.pool, id).await.unwrap().unwrap();
            assert_eq!(edge.object_relation_type_id, fx.employs);
        }
    }

    #[tokio::test]
    async fn test_update_relation_type_rejects_unknown_or_inactive_type() {
        let fx = Fixture::new().await;
        let a = fx.employ(fx.acme, fx.alice).await;

        let err = bulk_update_relation_type(&fx.pool, &[a], fx.employs, 4_242)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");

        let err = bulk_update_relation_type(&fx.pool, &[a], fx.employed_by, fx.employs)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");

        sqlx::query("UPDATE object_relation_types SET is_active = 0 WHERE id = ?")
            .bind(fx.employed_by)
            .execute(&fx.pool)
            .await
            .unwrap();
        let err = bulk_update_relation_type(&fx.pool, &[a], fx.employs, fx.employed_by)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "CONSTRAINT_VIOLATION");
    }
}
