//! Database models for the polymorphic object store

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::Result;

/// Entity type (`object_types`)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ObjectType {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub is_active: bool,
}

/// Type-agnostic identity row shared by every entity instance (`objects`)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Object {
    pub id: i64,
    pub object_type_id: i64,
    pub object_status_id: Option<i64>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Edge schema: allowed endpoint types and optional inverse type
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ObjectRelationType {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub parent_object_type_id: i64,
    pub child_object_type_id: i64,
    pub mirrored_type_id: Option<i64>,
    pub is_active: bool,
}

/// Directed, typed edge between two objects (`object_relations`)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ObjectRelation {
    pub id: i64,
    pub object_from_id: i64,
    pub object_to_id: i64,
    pub object_relation_type_id: i64,
    pub note: Option<String>,
    pub is_active: bool,
    pub created_by: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Load one relation by id (active or not)
pub async fn load_relation(pool: &SqlitePool, id: i64) -> Result<Option<ObjectRelation>> {
    let relation = sqlx::query_as::<_, ObjectRelation>(
        r#"
        SELECT id, object_from_id, object_to_id, object_relation_type_id, note,
               is_active, created_by, created_at, updated_at
        FROM object_relations
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(relation)
}

/// Load one relation type by id
pub async fn load_relation_type(pool: &SqlitePool, id: i64) -> Result<Option<ObjectRelationType>> {
    let relation_type = sqlx::query_as::<_, ObjectRelationType>(
        r#"
        SELECT id, code, name, parent_object_type_id, child_object_type_id,
               mirrored_type_id, is_active
        FROM object_relation_types
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(relation_type)
}

/// All relation types, ordered by id
pub async fn list_relation_types(pool: &SqlitePool) -> Result<Vec<ObjectRelationType>> {
    let types = sqlx::query_as::<_, ObjectRelationType>(
        r#"
        SELECT id, code, name, parent_object_type_id, child_object_type_id,
               mirrored_type_id, is_active
        FROM object_relation_types
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(types)
}

/// Active object types, ordered by id
pub async fn list_active_object_types(pool: &SqlitePool) -> Result<Vec<ObjectType>> {
    let types = sqlx::query_as::<_, ObjectType>(
        "SELECT id, code, name, is_active FROM object_types WHERE is_active = 1 ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(types)
}

/// Load one object by id
pub async fn load_object(pool: &SqlitePool, id: i64) -> Result<Option<Object>> {
    let object = sqlx::query_as::<_, Object>(
        r#"
        SELECT id, object_type_id, object_status_id, is_active, created_at, updated_at
        FROM objects
        WHERE id = ?
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(object)
}

/// Toggle the soft-delete flag of an object
pub async fn set_object_active(pool: &SqlitePool, id: i64, is_active: bool) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE objects SET is_active = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(is_active)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Insert an object and its (id-only) row in the given detail table
///
/// Detail columns beyond `id` are left NULL; callers fill them as needed.
/// `detail_table` must be a trusted identifier (schema constant).
pub async fn insert_object(
    pool: &SqlitePool,
    object_type_id: i64,
    detail_table: Option<&str>,
) -> Result<i64> {
    let mut tx = pool.begin().await?;

    let id = sqlx::query("INSERT INTO objects (object_type_id) VALUES (?)")
        .bind(object_type_id)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

    if let Some(table) = detail_table {
        sqlx::query(&format!("INSERT INTO {} (id) VALUES (?)", table))
            .bind(id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(id)
}

/// Insert a relation type and return its id
pub async fn insert_relation_type(
    pool: &SqlitePool,
    code: &str,
    name: &str,
    parent_object_type_id: i64,
    child_object_type_id: i64,
) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO object_relation_types (code, name, parent_object_type_id, child_object_type_id)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(code)
    .bind(name)
    .bind(parent_object_type_id)
    .bind(child_object_type_id)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(id)
}

/// Declare two relation types as each other's mirror
pub async fn link_mirror_types(pool: &SqlitePool, type_a: i64, type_b: i64) -> Result<()> {
    let mut tx = pool.begin().await?;
    for (id, mirror) in [(type_a, type_b), (type_b, type_a)] {
        sqlx::query(
            "UPDATE object_relation_types SET mirrored_type_id = ?, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
        )
        .bind(mirror)
        .bind(id)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(())
}

/// Insert an active relation and return its id
///
/// Relations are created by consumers; the engine itself only uses this for
/// fixtures and tests.
pub async fn insert_relation(
    pool: &SqlitePool,
    object_from_id: i64,
    object_to_id: i64,
    object_relation_type_id: i64,
    created_by: Option<&str>,
) -> Result<i64> {
    let id = sqlx::query(
        r#"
        INSERT INTO object_relations (object_from_id, object_to_id, object_relation_type_id, created_by)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(object_from_id)
    .bind(object_to_id)
    .bind(object_relation_type_id)
    .bind(created_by)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(id)
}

/// Object type id for a code, if the type exists
pub async fn object_type_id_by_code(pool: &SqlitePool, code: &str) -> Result<Option<i64>> {
    let id = sqlx::query_scalar("SELECT id FROM object_types WHERE code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await?;

    Ok(id)
}
