//! Relation type configuration check
//!
//! Inspects the active relation types themselves rather than their edges:
//! broken mirror declarations and parent/child types with no registry entry.

use objrel_common::db::models::{list_relation_types, ObjectRelationType};
use objrel_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::registry::EntityRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationTypeIssueKind {
    SelfMirror,
    MirrorMissing,
    MirrorInactive,
    MirrorNotSwapped,
    MirrorNotReciprocal,
    UnregisteredParentType,
    UnregisteredChildType,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationTypeIssue {
    pub relation_type_id: i64,
    pub code: String,
    pub issue: RelationTypeIssueKind,
}

/// Issues of every active relation type, ordered by type id
pub async fn scan_relation_types(
    pool: &SqlitePool,
    registry: &EntityRegistry,
) -> Result<Vec<RelationTypeIssue>> {
    let types = list_relation_types(pool).await?;
    Ok(check_relation_types(&types, registry))
}

fn check_relation_types(
    types: &[ObjectRelationType],
    registry: &EntityRegistry,
) -> Vec<RelationTypeIssue> {
    let by_id: HashMap<i64, &ObjectRelationType> = types.iter().map(|t| (t.id, t)).collect();
    let mut issues = Vec::new();

    for relation_type in types.iter().filter(|t| t.is_active) {
        let mut report = |issue| {
            issues.push(RelationTypeIssue {
                relation_type_id: relation_type.id,
                code: relation_type.code.clone(),
                issue,
            })
        };

        if let Some(mirror_id) = relation_type.mirrored_type_id {
            match by_id.get(&mirror_id) {
                _ if mirror_id == relation_type.id => report(RelationTypeIssueKind::SelfMirror),
                None => report(RelationTypeIssueKind::MirrorMissing),
                Some(mirror) => {
                    if !mirror.is_active {
                        report(RelationTypeIssueKind::MirrorInactive);
                    }
                    if mirror.parent_object_type_id != relation_type.child_object_type_id
                        || mirror.child_object_type_id != relation_type.parent_object_type_id
                    {
                        report(RelationTypeIssueKind::MirrorNotSwapped);
                    }
                    if mirror.mirrored_type_id != Some(relation_type.id) {
                        report(RelationTypeIssueKind::MirrorNotReciprocal);
                    }
                }
            }
        }

        if registry.resolve(relation_type.parent_object_type_id).is_none() {
            report(RelationTypeIssueKind::UnregisteredParentType);
        }
        if registry.resolve(relation_type.child_object_type_id).is_none() {
            report(RelationTypeIssueKind::UnregisteredChildType);
        }
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scan::test_support::Fixture;
    use objrel_common::db::models::{insert_relation_type, link_mirror_types};

    fn kinds(issues: &[RelationTypeIssue], id: i64) -> Vec<RelationTypeIssueKind> {
        issues
            .iter()
            .filter(|i| i.relation_type_id == id)
            .map(|i| i.issue)
            .collect()
    }

    #[tokio::test]
    async fn test_well_formed_pair_has_no_issues() {
        let fx = Fixture::new().await;
        let issues = scan_relation_types(&fx.pool, &fx.registry).await.unwrap();
        assert!(issues.is_empty(), "{:?}", issues);
    }

    #[tokio::test]
    async fn test_broken_mirror_declarations() {
        let fx = Fixture::new().await;

        let selfish =
            insert_relation_type(&fx.pool, "knows", "Knows", fx.person_type, fx.person_type)
                .await
                .unwrap();
        link_mirror_types(&fx.pool, selfish, selfish).await.unwrap();

        // same direction on both sides
        let owns = insert_relation_type(&fx.pool, "owns", "Owns", fx.company_type, fx.person_type)
            .await
            .unwrap();
        let holds =
            insert_relation_type(&fx.pool, "holds", "Holds", fx.company_type, fx.person_type)
                .await
                .unwrap();
        link_mirror_types(&fx.pool, owns, holds).await.unwrap();

        let dangling =
            insert_relation_type(&fx.pool, "signs", "Signs", fx.person_type, fx.document_type)
                .await
                .unwrap();
        sqlx::query("UPDATE object_relation_types SET mirrored_type_id = 9999 WHERE id = ?")
            .bind(dangling)
            .execute(&fx.pool)
            .await
            .unwrap();

        let issues = scan_relation_types(&fx.pool, &fx.registry).await.unwrap();

        assert_eq!(kinds(&issues, selfish), vec![RelationTypeIssueKind::SelfMirror]);
        assert_eq!(kinds(&issues, owns), vec![RelationTypeIssueKind::MirrorNotSwapped]);
        assert_eq!(kinds(&issues, holds), vec![RelationTypeIssueKind::MirrorNotSwapped]);
        assert_eq!(kinds(&issues, dangling), vec![RelationTypeIssueKind::MirrorMissing]);
    }

    #[tokio::test]
    async fn test_inactive_and_one_sided_mirrors() {
        let fx = Fixture::new().await;
        sqlx::query("UPDATE object_relation_types SET is_active = 0 WHERE id = ?")
            .bind(fx.employed_by)
            .execute(&fx.pool)
            .await
            .unwrap();

        let hires =
            insert_relation_type(&fx.pool, "hires", "Hires", fx.company_type, fx.person_type)
                .await
                .unwrap();
        sqlx::query("UPDATE object_relation_types SET mirrored_type_id = ? WHERE id = ?")
            .bind(fx.employed_by)
            .bind(hires)
            .execute(&fx.pool)
            .await
            .unwrap();

        let issues = scan_relation_types(&fx.pool, &fx.registry).await.unwrap();

        assert_eq!(kinds(&issues, fx.employs), vec![RelationTypeIssueKind::MirrorInactive]);
        assert_eq!(
            kinds(&issues, hires),
            vec![
                RelationTypeIssueKind::MirrorInactive,
                RelationTypeIssueKind::MirrorNotReciprocal
            ]
        );
        assert!(kinds(&issues, fx.employed_by).is_empty(), "inactive types are not checked");
    }

    #[tokio::test]
    async fn test_unregistered_endpoints() {
        let fx = Fixture::new().await;
        let issues = scan_relation_types(&fx.pool, &fx.registry_without("company"))
            .await
            .unwrap();

        assert_eq!(
            kinds(&issues, fx.employs),
            vec![RelationTypeIssueKind::UnregisteredParentType]
        );
        assert_eq!(
            kinds(&issues, fx.employed_by),
            vec![RelationTypeIssueKind::UnregisteredChildType]
        );
    }
}
