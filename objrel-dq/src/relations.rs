//! Relation listing
//!
//! Executes the fan-out built by [`crate::query::builder`] and decodes each
//! row into a [`RelationRow`].

use base64::{engine::general_purpose, Engine as _};
use chrono::NaiveDateTime;
use objrel_common::{Error, Result};
use serde::Serialize;
use serde_json::{json, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool, TypeInfo, ValueRef};
use std::collections::BTreeMap;
use tracing::debug;

use crate::query::{build_relations_query, RelationsRequest};
use crate::registry::{EntityConfig, EntityRegistry};

/// One active edge leaving the source object, with its target resolved
#[derive(Debug, Clone, Serialize)]
pub struct RelationRow {
    pub relation_id: i64,
    pub object_from_id: i64,
    pub object_from_type_id: i64,
    pub object_from_type_name: String,
    pub object_to_id: i64,
    pub object_to_type_id: i64,
    pub object_to_type_name: String,
    pub object_relation_type_id: i64,
    pub relation_type_code: String,
    pub relation_type_name: String,
    pub object_status_id: Option<i64>,
    pub status_code: Option<String>,
    pub status_name: Option<String>,
    pub note: Option<String>,
    pub created_by: Option<String>,
    pub created_at: NaiveDateTime,
    /// Registry alias of the target's entity type; `None` when unregistered
    pub related_entity: Option<String>,
    /// Columns of the owning entity keyed by column name
    pub entity_fields: BTreeMap<String, Value>,
    pub related_object_display_name: String,
}

/// List the active relations of `request.object_from_id`
pub async fn list_relations(
    pool: &SqlitePool,
    registry: &EntityRegistry,
    request: &RelationsRequest,
) -> Result<Vec<RelationRow>> {
    if request.object_from_id <= 0 {
        return Err(Error::InvalidInput(format!(
            "object_from_id must be a positive integer, got {}",
            request.object_from_id
        )));
    }

    let query = build_relations_query(registry, request)?;
    let rendered = query.rendered();
    debug!(
        branches = query.branch_count(),
        binds = rendered.binds.len(),
        sql = %rendered.sql,
        "Relation fan-out"
    );

    let rows = rendered.query().fetch_all(pool).await?;

    let relations = rows
        .iter()
        .map(|row| decode_row(row, registry))
        .collect::<Result<Vec<_>>>()?;

    debug!(
        object_from_id = request.object_from_id,
        count = relations.len(),
        "Listed relations"
    );
    Ok(relations)
}

fn decode_row(row: &SqliteRow, registry: &EntityRegistry) -> Result<RelationRow> {
    let related_entity: Option<String> = row.try_get("related_entity")?;

    let entity_fields = match related_entity.as_deref().and_then(|a| registry.by_alias(a)) {
        Some(config) => entity_fields(row, config)?,
        None => BTreeMap::new(),
    };

    Ok(RelationRow {
        relation_id: row.try_get("relation_id")?,
        object_from_id: row.try_get("object_from_id")?,
        object_from_type_id: row.try_get("object_from_type_id")?,
        object_from_type_name: row.try_get("object_from_type_name")?,
        object_to_id: row.try_get("object_to_id")?,
        object_to_type_id: row.try_get("object_to_type_id")?,
        object_to_type_name: row.try_get("object_to_type_name")?,
        object_relation_type_id: row.try_get("object_relation_type_id")?,
        relation_type_code: row.try_get("relation_type_code")?,
        relation_type_name: row.try_get("relation_type_name")?,
        object_status_id: row.try_get("object_status_id")?,
        status_code: row.try_get("status_code")?,
        status_name: row.try_get("status_name")?,
        note: row.try_get("note")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("relation_created_at")?,
        related_entity,
        entity_fields,
        related_object_display_name: row.try_get("related_object_display_name")?,
    })
}

fn entity_fields(row: &SqliteRow, config: &EntityConfig) -> Result<BTreeMap<String, Value>> {
    let columns = config
        .select_columns
        .iter()
        .map(|c| (c.column.to_string(), c.output_column.as_str()));
    let labels = config
        .translation_columns
        .iter()
        .map(|t| (format!("{}_label", t.code_column), t.output_column.as_str()));

    columns
        .chain(labels)
        .map(|(key, output)| Ok((key, json_value(row, output)?)))
        .collect()
}

/// Decode a column into JSON by the storage class of its value
///
/// BLOBs become base64 strings.
fn json_value(row: &SqliteRow, column: &str) -> Result<Value> {
    let raw = row.try_get_raw(column)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }

    let value = match raw.type_info().name() {
        "INTEGER" => json!(row.try_get_unchecked::<i64, _>(column)?),
        "REAL" => json!(row.try_get_unchecked::<f64, _>(column)?),
        "BLOB" => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(column)?;
            Value::String(general_purpose::STANDARD.encode(bytes))
        }
        _ => Value::String(row.try_get_unchecked::<String, _>(column)?),
    };
    Ok(value)
}
