//! Database initialization
//!
//! Creates the polymorphic object schema idempotently (`CREATE TABLE IF NOT
//! EXISTS`) and seeds the reference rows (object types, statuses, lookup
//! tables) the built-in entity registry relies on. Safe to call on every start.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// How long a connection waits for another writer before failing
pub const BUSY_TIMEOUT_MS: u64 = 5000;

/// Open (creating if needed) the database file and bring its schema up to date
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Applied to every pooled connection: remediation batches queue on the
    // busy timeout instead of failing while another batch holds the writer
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(BUSY_TIMEOUT_MS));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// In-memory database with the full schema
///
/// Uses a single long-lived connection: every SQLite `:memory:` connection is
/// a separate database, so the pool must never open a second one.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    prepare_schema(&pool).await?;

    Ok(pool)
}

async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    // sqlx turns foreign keys on for every pooled connection; stated here so the
    // schema never depends on that default
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(pool)
        .await?;

    create_schema(pool).await?;
    seed_reference_data(pool).await?;
    Ok(())
}

/// Create every table and index (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_object_types_table(pool).await?;
    create_object_statuses_table(pool).await?;
    create_objects_table(pool).await?;
    create_object_relation_types_table(pool).await?;
    create_object_relations_table(pool).await?;

    // Coded-value lookup tables
    create_lookup_table(pool, "countries").await?;
    create_lookup_table(pool, "currencies").await?;

    // Entity detail tables
    create_persons_table(pool).await?;
    create_companies_table(pool).await?;
    create_documents_table(pool).await?;
    create_invoices_table(pool).await?;
    create_files_table(pool).await?;

    Ok(())
}

async fn create_object_types_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS object_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_object_statuses_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS object_statuses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the objects table
///
/// One row per entity instance regardless of type; `id` is global.
pub async fn create_objects_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS objects (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            object_type_id INTEGER NOT NULL REFERENCES object_types(id),
            object_status_id INTEGER REFERENCES object_statuses(id),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_objects_type ON objects(object_type_id)")
        .execute(pool)
        .await?;

    Ok(())
}

/// Create the relation types table
///
/// `mirrored_type_id` deliberately has no foreign key: a dangling mirror is a
/// configuration defect the relation type check reports.
pub async fn create_object_relation_types_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS object_relation_types (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            parent_object_type_id INTEGER NOT NULL REFERENCES object_types(id),
            child_object_type_id INTEGER NOT NULL REFERENCES object_types(id),
            mirrored_type_id INTEGER,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the relations (edges) table
///
/// No unique constraint on (from, to, type): duplicates are reconciled by the
/// duplicate scanner rather than rejected at write time.
pub async fn create_object_relations_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS object_relations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            object_from_id INTEGER NOT NULL REFERENCES objects(id),
            object_to_id INTEGER NOT NULL REFERENCES objects(id),
            object_relation_type_id INTEGER NOT NULL REFERENCES object_relation_types(id),
            note TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_by TEXT,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_object_relations_from ON object_relations(object_from_id, is_active)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_object_relations_triple ON object_relations(object_from_id, object_to_id, object_relation_type_id)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_object_relations_to ON object_relations(object_to_id)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_lookup_table(pool: &SqlitePool, table: &str) -> Result<()> {
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS {} (
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
        table
    ))
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_persons_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS persons (
            id INTEGER PRIMARY KEY REFERENCES objects(id),
            first_name TEXT,
            last_name TEXT,
            email TEXT,
            country_code TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_companies_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS companies (
            id INTEGER PRIMARY KEY REFERENCES objects(id),
            name TEXT,
            registration_number TEXT,
            country_code TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_documents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id INTEGER PRIMARY KEY REFERENCES objects(id),
            title TEXT,
            document_number TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_invoices_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS invoices (
            id INTEGER PRIMARY KEY REFERENCES objects(id),
            invoice_number TEXT,
            total_amount REAL,
            currency_code TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_files_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS files (
            id INTEGER PRIMARY KEY REFERENCES objects(id),
            file_name TEXT,
            mime_type TEXT,
            size_bytes INTEGER
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed object types, statuses and lookup values (idempotent)
async fn seed_reference_data(pool: &SqlitePool) -> Result<()> {
    let object_types = [
        ("person", "Person"),
        ("company", "Company"),
        ("document", "Document"),
        ("invoice", "Invoice"),
        ("file", "File"),
    ];
    for (code, name) in object_types {
        sqlx::query("INSERT OR IGNORE INTO object_types (code, name) VALUES (?, ?)")
            .bind(code)
            .bind(name)
            .execute(pool)
            .await?;
    }

    let statuses = [("active", "Active"), ("draft", "Draft"), ("archived", "Archived")];
    for (code, name) in statuses {
        sqlx::query("INSERT OR IGNORE INTO object_statuses (code, name) VALUES (?, ?)")
            .bind(code)
            .bind(name)
            .execute(pool)
            .await?;
    }

    let countries = [("DE", "Germany"), ("FR", "France"), ("US", "United States")];
    for (code, name) in countries {
        sqlx::query("INSERT OR IGNORE INTO countries (code, name) VALUES (?, ?)")
            .bind(code)
            .bind(name)
            .execute(pool)
            .await?;
    }

    let currencies = [("EUR", "Euro"), ("USD", "US Dollar")];
    for (code, name) in currencies {
        sqlx::query("INSERT OR IGNORE INTO currencies (code, name) VALUES (?, ?)")
            .bind(code)
            .bind(name)
            .execute(pool)
            .await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_database_has_schema() {
        let pool = init_memory_database().await.unwrap();

        let tables = [
            "object_types",
            "object_statuses",
            "objects",
            "object_relation_types",
            "object_relations",
            "countries",
            "currencies",
            "persons",
            "companies",
            "documents",
            "invoices",
            "files",
        ];
        for table in &tables {
            let found: Option<String> = sqlx::query_scalar(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?",
            )
            .bind(*table)
            .fetch_optional(&pool)
            .await
            .unwrap();
            assert!(found.is_some(), "table '{}' should exist", table);
        }
    }

    #[tokio::test]
    async fn test_schema_creation_is_idempotent() {
        let pool = init_memory_database().await.unwrap();
        prepare_schema(&pool).await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM object_types")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 5, "re-seeding must not duplicate object types");
    }

    #[tokio::test]
    async fn test_relation_to_missing_object_rejected() {
        let pool = init_memory_database().await.unwrap();

        let result = sqlx::query(
            "INSERT INTO object_relations (object_from_id, object_to_id, object_relation_type_id) VALUES (9001, 9002, 1)",
        )
        .execute(&pool)
        .await;
        assert!(result.is_err(), "foreign keys should be enforced");
    }
}
