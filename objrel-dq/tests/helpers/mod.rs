//! Test helpers for objrel-dq integration tests
//!
//! Seeds a store (in-memory, or a WAL database file) with a small object graph:
//! - companies `acme`, `globex`; persons `alice`, `bob`; document `contract`
//! - `employs` (company -> person) mirrored by `employed_by`
//! - `signed` (person -> document), no mirror

#![allow(dead_code)]

use objrel_common::db::init::{init_database, init_memory_database};
use objrel_common::db::models::{
    insert_object, insert_relation, insert_relation_type, link_mirror_types,
    object_type_id_by_code,
};
use objrel_common::entity_types::default_entity_types;
use objrel_dq::registry::EntityRegistry;
use objrel_dq::AppState;
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;

pub struct Seeded {
    pub pool: SqlitePool,
    pub registry: EntityRegistry,
    pub person_type: i64,
    pub company_type: i64,
    pub document_type: i64,
    pub file_type: i64,
    pub employs: i64,
    pub employed_by: i64,
    pub signed: i64,
    pub acme: i64,
    pub globex: i64,
    pub alice: i64,
    pub bob: i64,
    pub contract: i64,
}

impl Seeded {
    pub async fn new() -> Self {
        let pool = init_memory_database().await.expect("Should open in-memory database");
        Self::seed(pool).await
    }

    /// Seeded file database with a multi-connection pool
    pub async fn on_disk(db_path: &Path) -> Self {
        let pool = init_database(db_path).await.expect("Should open database file");
        Self::seed(pool).await
    }

    async fn seed(pool: SqlitePool) -> Self {
        let registry = EntityRegistry::load(&pool, &default_entity_types())
            .await
            .expect("Default registry should build");

        let person_type = type_id(&pool, "person").await;
        let company_type = type_id(&pool, "company").await;
        let document_type = type_id(&pool, "document").await;
        let file_type = type_id(&pool, "file").await;

        let employs = insert_relation_type(&pool, "employs", "Employs", company_type, person_type)
            .await
            .unwrap();
        let employed_by =
            insert_relation_type(&pool, "employed_by", "Employed by", person_type, company_type)
                .await
                .unwrap();
        link_mirror_types(&pool, employs, employed_by).await.unwrap();
        let signed = insert_relation_type(&pool, "signed", "Signed", person_type, document_type)
            .await
            .unwrap();

        let acme = insert_object(&pool, company_type, Some("companies")).await.unwrap();
        let globex = insert_object(&pool, company_type, Some("companies")).await.unwrap();
        let alice = insert_object(&pool, person_type, Some("persons")).await.unwrap();
        let bob = insert_object(&pool, person_type, Some("persons")).await.unwrap();
        let contract = insert_object(&pool, document_type, Some("documents")).await.unwrap();

        sqlx::query("UPDATE companies SET name = ? WHERE id = ?")
            .bind("Acme Corp")
            .bind(acme)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "UPDATE persons SET first_name = ?, last_name = ?, country_code = ? WHERE id = ?",
        )
        .bind("Alice")
        .bind("Smith")
        .bind("FR")
        .bind(alice)
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query("UPDATE documents SET title = ? WHERE id = ?")
            .bind("Employment contract")
            .bind(contract)
            .execute(&pool)
            .await
            .unwrap();

        Self {
            pool,
            registry,
            person_type,
            company_type,
            document_type,
            file_type,
            employs,
            employed_by,
            signed,
            acme,
            globex,
            alice,
            bob,
            contract,
        }
    }

    pub async fn relate(&self, from: i64, to: i64, relation_type: i64) -> i64 {
        insert_relation(&self.pool, from, to, relation_type, Some("tests"))
            .await
            .unwrap()
    }

    pub async fn deactivate_relation(&self, id: i64) {
        sqlx::query("UPDATE object_relations SET is_active = 0 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .unwrap();
    }

    pub async fn active_relation_count(&self) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM object_relations WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub fn app_state(&self) -> AppState {
        AppState::new(
            self.pool.clone(),
            self.registry.clone(),
            default_entity_types(),
            Duration::from_secs(10),
        )
    }
}

async fn type_id(pool: &SqlitePool, code: &str) -> i64 {
    object_type_id_by_code(pool, code)
        .await
        .unwrap()
        .unwrap_or_else(|| panic!("object type '{}' should be seeded", code))
}
