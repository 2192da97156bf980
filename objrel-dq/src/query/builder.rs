//! Relation Query Builder
//!
//! Builds the fan-out query listing every active relation leaving one object:
//! one SELECT branch per registered entity type plus one branch for objects
//! whose type has no registry entry, combined with `UNION ALL`. Each branch
//! emits the same columns; columns owned by other entity types are NULL.

use objrel_common::{Error, Result};

use crate::query::ast::{
    Expr, Ident, Join, JoinKind, Predicate, RenderedQuery, Select, SelectItem, SortDirection,
    UnionAll,
};
use crate::registry::{DisplaySegment, EntityConfig, EntityRegistry};

/// Table aliases used by the fixed part of every branch
pub const RESERVED_ALIASES: &[&str] = &[
    "rel",
    "obj",
    "obj_type",
    "src",
    "src_type",
    "rel_type",
    "obj_status",
];

/// Edge, endpoint and label columns shared by every branch, in output order
pub const COMMON_COLUMNS: &[&str] = &[
    "relation_id",
    "object_from_id",
    "object_from_type_id",
    "object_from_type_name",
    "object_to_id",
    "object_to_type_id",
    "object_to_type_name",
    "object_relation_type_id",
    "relation_type_code",
    "relation_type_name",
    "object_status_id",
    "status_code",
    "status_name",
    "note",
    "created_by",
    "relation_created_at",
];

/// Columns after the per-entity block
pub const TRAILING_COLUMNS: &[&str] = &["related_entity", "related_object_display_name"];

/// Result ordering by relation creation time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RelationOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl RelationOrder {
    fn direction(self) -> SortDirection {
        match self {
            RelationOrder::NewestFirst => SortDirection::Desc,
            RelationOrder::OldestFirst => SortDirection::Asc,
        }
    }
}

/// Parameters of one relation listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationsRequest {
    pub object_from_id: i64,
    /// Advisory: an unknown type id yields no rows rather than an error
    pub relation_type_id: Option<i64>,
    pub order: RelationOrder,
}

impl RelationsRequest {
    pub fn new(object_from_id: i64) -> Self {
        Self {
            object_from_id,
            relation_type_id: None,
            order: RelationOrder::default(),
        }
    }

    pub fn with_relation_type(mut self, relation_type_id: Option<i64>) -> Self {
        self.relation_type_id = relation_type_id;
        self
    }

    pub fn with_order(mut self, order: RelationOrder) -> Self {
        self.order = order;
        self
    }
}

/// Built fan-out query
#[derive(Debug, Clone)]
pub struct RelationsQuery {
    union: UnionAll,
    rendered: RenderedQuery,
}

impl RelationsQuery {
    /// Output columns (identical for every branch)
    pub fn columns(&self) -> &[Ident] {
        self.union.columns()
    }

    pub fn branch_count(&self) -> usize {
        self.union.branch_count()
    }

    pub fn rendered(&self) -> &RenderedQuery {
        &self.rendered
    }
}

struct Aliases {
    rel: Ident,
    obj: Ident,
    obj_type: Ident,
    src: Ident,
    src_type: Ident,
    rel_type: Ident,
    obj_status: Ident,
}

impl Aliases {
    fn new() -> Result<Self> {
        Ok(Self {
            rel: Ident::new("rel")?,
            obj: Ident::new("obj")?,
            obj_type: Ident::new("obj_type")?,
            src: Ident::new("src")?,
            src_type: Ident::new("src_type")?,
            rel_type: Ident::new("rel_type")?,
            obj_status: Ident::new("obj_status")?,
        })
    }
}

/// Build the fan-out for `request` over every entity type in `registry`
///
/// Fails with a configuration error when the registry is empty: an empty
/// fan-out would silently hide every relation.
pub fn build_relations_query(
    registry: &EntityRegistry,
    request: &RelationsRequest,
) -> Result<RelationsQuery> {
    if registry.is_empty() {
        return Err(Error::Config(
            "Entity registry has no active entity types".to_string(),
        ));
    }

    let aliases = Aliases::new()?;
    let mut branches = Vec::with_capacity(registry.len() + 1);

    for config in registry.configs() {
        branches.push(entity_branch(&aliases, registry, Some(config), request)?);
    }
    branches.push(entity_branch(&aliases, registry, None, request)?);

    let order = request.order.direction();
    let union = UnionAll::new(
        branches,
        vec![
            (Ident::new("relation_created_at")?, order),
            (Ident::new("relation_id")?, order),
        ],
    )?;
    let rendered = union.render();

    Ok(RelationsQuery { union, rendered })
}

/// One branch; `owner = None` is the branch for unregistered object types
fn entity_branch(
    a: &Aliases,
    registry: &EntityRegistry,
    owner: Option<&EntityConfig>,
    request: &RelationsRequest,
) -> Result<Select> {
    let mut items = common_items(a)?;

    for config in registry.configs() {
        let owned = owner.map(|o| o.object_type_id) == Some(config.object_type_id);

        for column in &config.select_columns {
            let expr = if owned {
                Expr::col(&config.alias, &column.column)
            } else {
                Expr::Null
            };
            items.push(SelectItem {
                expr,
                alias: column.output_column.clone(),
            });
        }

        for translation in &config.translation_columns {
            let expr = if owned {
                Expr::col(&translation.join_alias, &translation.label_field)
            } else {
                Expr::Null
            };
            items.push(SelectItem {
                expr,
                alias: translation.output_column.clone(),
            });
        }
    }

    items.push(SelectItem {
        expr: owner
            .map(|o| Expr::text(o.alias.as_str()))
            .unwrap_or(Expr::Null),
        alias: Ident::new("related_entity")?,
    });
    items.push(SelectItem {
        expr: display_name_expr(a, owner)?,
        alias: Ident::new("related_object_display_name")?,
    });

    let id = Ident::new("id")?;
    let object_type_id = Ident::new("object_type_id")?;

    let mut target_join = vec![Predicate::Eq(
        Expr::col(&a.obj, &id),
        Expr::col(&a.rel, &Ident::new("object_to_id")?),
    )];
    if let Some(config) = owner {
        target_join.push(Predicate::Eq(
            Expr::col(&a.obj, &object_type_id),
            Expr::int(config.object_type_id),
        ));
    }

    let mut joins = vec![
        Join {
            kind: JoinKind::Inner,
            table: Ident::new("objects")?,
            alias: a.obj.clone(),
            on: target_join,
        },
        Join {
            kind: JoinKind::Inner,
            table: Ident::new("object_types")?,
            alias: a.obj_type.clone(),
            on: vec![Predicate::Eq(
                Expr::col(&a.obj_type, &id),
                Expr::col(&a.obj, &object_type_id),
            )],
        },
        Join {
            kind: JoinKind::Inner,
            table: Ident::new("objects")?,
            alias: a.src.clone(),
            on: vec![Predicate::Eq(
                Expr::col(&a.src, &id),
                Expr::col(&a.rel, &Ident::new("object_from_id")?),
            )],
        },
        Join {
            kind: JoinKind::Inner,
            table: Ident::new("object_types")?,
            alias: a.src_type.clone(),
            on: vec![Predicate::Eq(
                Expr::col(&a.src_type, &id),
                Expr::col(&a.src, &object_type_id),
            )],
        },
        Join {
            kind: JoinKind::Inner,
            table: Ident::new("object_relation_types")?,
            alias: a.rel_type.clone(),
            on: vec![Predicate::Eq(
                Expr::col(&a.rel_type, &id),
                Expr::col(&a.rel, &Ident::new("object_relation_type_id")?),
            )],
        },
        Join {
            kind: JoinKind::Left,
            table: Ident::new("object_statuses")?,
            alias: a.obj_status.clone(),
            on: vec![Predicate::Eq(
                Expr::col(&a.obj_status, &id),
                Expr::col(&a.obj, &Ident::new("object_status_id")?),
            )],
        },
    ];

    if let Some(config) = owner {
        joins.push(Join {
            kind: JoinKind::Left,
            table: config.table_name.clone(),
            alias: config.alias.clone(),
            on: vec![Predicate::Eq(
                Expr::col(&config.alias, &id),
                Expr::col(&a.obj, &id),
            )],
        });

        for translation in &config.translation_columns {
            joins.push(Join {
                kind: JoinKind::Left,
                table: translation.lookup_table.clone(),
                alias: translation.join_alias.clone(),
                on: vec![Predicate::Eq(
                    Expr::col(&translation.join_alias, &translation.code_field),
                    Expr::col(&config.alias, &translation.code_column),
                )],
            });
        }
    }

    let mut filters = vec![
        Predicate::Eq(
            Expr::col(&a.rel, &Ident::new("object_from_id")?),
            Expr::int(request.object_from_id),
        ),
        Predicate::Eq(Expr::col(&a.rel, &Ident::new("is_active")?), Expr::int(1)),
    ];
    if let Some(relation_type_id) = request.relation_type_id {
        filters.push(Predicate::Eq(
            Expr::col(&a.rel, &Ident::new("object_relation_type_id")?),
            Expr::int(relation_type_id),
        ));
    }
    if owner.is_none() {
        filters.push(Predicate::NotIn(
            Expr::col(&a.obj, &object_type_id),
            registry.registered_type_ids(),
        ));
    }

    Ok(Select {
        items,
        from_table: Ident::new("object_relations")?,
        from_alias: a.rel.clone(),
        joins,
        filters,
    })
}

fn common_items(a: &Aliases) -> Result<Vec<SelectItem>> {
    let sources: [(&Ident, &str); 16] = [
        (&a.rel, "id"),
        (&a.rel, "object_from_id"),
        (&a.src, "object_type_id"),
        (&a.src_type, "name"),
        (&a.rel, "object_to_id"),
        (&a.obj, "object_type_id"),
        (&a.obj_type, "name"),
        (&a.rel, "object_relation_type_id"),
        (&a.rel_type, "code"),
        (&a.rel_type, "name"),
        (&a.obj, "object_status_id"),
        (&a.obj_status, "code"),
        (&a.obj_status, "name"),
        (&a.rel, "note"),
        (&a.rel, "created_by"),
        (&a.rel, "created_at"),
    ];

    sources
        .iter()
        .zip(COMMON_COLUMNS)
        .map(|((table, column), alias)| {
            Ok(SelectItem {
                expr: Expr::col(table, &Ident::new(column)?),
                alias: Ident::new(alias)?,
            })
        })
        .collect()
}

/// `COALESCE(NULLIF(TRIM(<parts>), ''), 'Object #' || obj.id)`
fn display_name_expr(a: &Aliases, owner: Option<&EntityConfig>) -> Result<Expr> {
    let fallback = Expr::Concat(vec![
        Expr::text("Object #"),
        Expr::col(&a.obj, &Ident::new("id")?),
    ]);

    let config = match owner {
        Some(config) if !config.display_name.is_empty() => config,
        _ => return Ok(fallback),
    };

    let parts = config
        .display_name
        .iter()
        .map(|segment| match segment {
            DisplaySegment::Column(column) => Ok(Expr::Coalesce(vec![
                Expr::col(&config.alias, column),
                Expr::EmptyText,
            ])),
            DisplaySegment::Text(text) => Ok(Expr::text(text.clone())),
            DisplaySegment::Translation(index) => {
                let translation = config.translation_columns.get(*index).ok_or_else(|| {
                    Error::Config(format!(
                        "Entity '{}' display name refers to missing translation {}",
                        config.alias, index
                    ))
                })?;
                Ok(Expr::Coalesce(vec![
                    Expr::col(&translation.join_alias, &translation.label_field),
                    Expr::EmptyText,
                ]))
            }
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Expr::Coalesce(vec![
        Expr::NullIfBlank(Box::new(Expr::Concat(parts))),
        fallback,
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use objrel_common::db::models::ObjectType;
    use objrel_common::entity_types::default_entity_types;
    use objrel_common::EntityTypeDescriptor;

    fn types(codes: &[&str]) -> Vec<ObjectType> {
        codes
            .iter()
            .enumerate()
            .map(|(i, code)| ObjectType {
                id: i as i64 + 1,
                code: code.to_string(),
                name: code.to_string(),
                is_active: true,
            })
            .collect()
    }

    fn registry_of(codes: &[&str]) -> EntityRegistry {
        let descriptors: Vec<EntityTypeDescriptor> = default_entity_types()
            .into_iter()
            .filter(|d| codes.contains(&d.object_type_code.as_str()))
            .collect();
        let all = types(&["person", "company", "document", "invoice", "file"]);
        EntityRegistry::build(&descriptors, &all).unwrap()
    }

    #[test]
    fn test_missing_translation_in_display_name_is_config_error() {
        let registry = registry_of(&["person"]);
        let mut person = registry.configs()[0].clone();
        person.display_name.push(DisplaySegment::Translation(9));

        let err = display_name_expr(&Aliases::new().unwrap(), Some(&person)).unwrap_err();
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_empty_registry_fails_fast() {
        let err = build_relations_query(&EntityRegistry::default(), &RelationsRequest::new(1))
            .unwrap_err();
        assert_eq!(err.code(), "CONFIGURATION_ERROR");
    }

    #[test]
    fn test_one_branch_per_entity_plus_fallback() {
        let registry = registry_of(&["person", "company", "file"]);
        let query = build_relations_query(&registry, &RelationsRequest::new(7)).unwrap();

        assert_eq!(query.branch_count(), 4);
        assert_eq!(query.rendered().sql.matches("UNION ALL").count(), 3);
    }

    #[test]
    fn test_column_layout() {
        let registry = registry_of(&["person", "file"]);
        let query = build_relations_query(&registry, &RelationsRequest::new(7)).unwrap();
        let columns: Vec<&str> = query.columns().iter().map(|c| c.as_str()).collect();

        assert_eq!(&columns[..COMMON_COLUMNS.len()], COMMON_COLUMNS);
        assert_eq!(&columns[columns.len() - 2..], TRAILING_COLUMNS);
        assert!(columns.contains(&"person_first_name"));
        assert!(columns.contains(&"person_country_code_label"));
        assert!(columns.contains(&"file_file_name"));
        assert!(!columns.contains(&"company_name"));
    }

    #[test]
    fn test_common_columns_independent_of_registry() {
        let small =
            build_relations_query(&registry_of(&["file"]), &RelationsRequest::new(1)).unwrap();
        let large = build_relations_query(
            &registry_of(&["person", "company", "document", "invoice", "file"]),
            &RelationsRequest::new(1),
        )
        .unwrap();

        let fixed = |q: &RelationsQuery| -> Vec<String> {
            q.columns()
                .iter()
                .map(|c| c.to_string())
                .filter(|c| {
                    COMMON_COLUMNS.contains(&c.as_str()) || TRAILING_COLUMNS.contains(&c.as_str())
                })
                .collect()
        };
        assert_eq!(fixed(&small), fixed(&large));
    }

    #[test]
    fn test_values_are_bound_not_inlined() {
        let registry = registry_of(&["person", "invoice"]);
        let request = RelationsRequest::new(424242).with_relation_type(Some(777));
        let query = build_relations_query(&registry, &request).unwrap();
        let rendered = query.rendered();

        assert!(!rendered.sql.contains("424242"));
        assert!(!rendered.sql.contains("777"));
        assert!(!rendered.sql.contains("Invoice "));
        assert!(!rendered.sql.contains("Object #"));
        assert_eq!(rendered.sql.matches('?').count(), rendered.binds.len());
    }

    #[test]
    fn test_relation_type_filter_added_to_every_branch() {
        let registry = registry_of(&["person", "company"]);
        let without = build_relations_query(&registry, &RelationsRequest::new(1)).unwrap();
        let with = build_relations_query(
            &registry,
            &RelationsRequest::new(1).with_relation_type(Some(5)),
        )
        .unwrap();

        let count = |q: &RelationsQuery| {
            q.rendered()
                .sql
                .matches("rel.object_relation_type_id = ?")
                .count()
        };
        assert_eq!(count(&without), 0);
        assert_eq!(count(&with), 3);
    }

    #[test]
    fn test_order_direction() {
        let registry = registry_of(&["file"]);
        let newest = build_relations_query(&registry, &RelationsRequest::new(1)).unwrap();
        assert!(newest
            .rendered()
            .sql
            .ends_with("ORDER BY relation_created_at DESC, relation_id DESC"));

        let oldest = build_relations_query(
            &registry,
            &RelationsRequest::new(1).with_order(RelationOrder::OldestFirst),
        )
        .unwrap();
        assert!(oldest
            .rendered()
            .sql
            .ends_with("ORDER BY relation_created_at ASC, relation_id ASC"));
    }
}
