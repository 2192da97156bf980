//! Entity Type Registry
//!
//! Maps an `object_type_id` to the [`EntityConfig`] describing how that entity
//! type is stored and labelled. Built once from descriptors and never mutated;
//! a refresh builds a new registry and swaps it in through [`SharedRegistry`],
//! so readers always see a complete snapshot.

use objrel_common::db::models::{list_active_object_types, ObjectType};
use objrel_common::{DisplayPart, EntityTypeDescriptor, Error, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::query::ast::Ident;
use crate::query::builder::{COMMON_COLUMNS, RESERVED_ALIASES, TRAILING_COLUMNS};

/// Coded-value lookup join for one column of an entity table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslationJoin {
    pub code_column: Ident,
    pub lookup_table: Ident,
    pub code_field: Ident,
    pub label_field: Ident,
    /// Join alias of the lookup table in the fan-out query
    pub join_alias: Ident,
    /// Output column carrying the label
    pub output_column: Ident,
}

/// Validated display name part
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplaySegment {
    Column(Ident),
    Text(String),
    /// Index into `translation_columns`
    Translation(usize),
}

/// Column of an entity table surfaced in relation listings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityColumn {
    pub column: Ident,
    pub output_column: Ident,
}

/// How one entity type is joined and labelled
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityConfig {
    pub object_type_id: i64,
    pub object_type_code: String,
    pub table_name: Ident,
    pub alias: Ident,
    pub select_columns: Vec<EntityColumn>,
    pub translation_columns: Vec<TranslationJoin>,
    pub display_name: Vec<DisplaySegment>,
}

impl EntityConfig {
    /// Validate a descriptor against a resolved object type id
    pub fn from_descriptor(descriptor: &EntityTypeDescriptor, object_type_id: i64) -> Result<Self> {
        let alias = Ident::new(&descriptor.alias)?;
        if RESERVED_ALIASES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(alias.as_str()))
        {
            return Err(Error::Config(format!(
                "Entity alias '{}' is reserved by the relation query",
                alias
            )));
        }

        let select_columns = descriptor
            .select_columns
            .iter()
            .map(|column| {
                Ok(EntityColumn {
                    column: Ident::new(column)?,
                    output_column: Ident::new(&format!("{}_{}", alias, column))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let translation_columns = descriptor
            .translation_columns
            .iter()
            .map(|t| {
                Ok(TranslationJoin {
                    code_column: Ident::new(&t.code_column)?,
                    lookup_table: Ident::new(&t.lookup_table)?,
                    code_field: Ident::new(&t.code_field)?,
                    label_field: Ident::new(&t.label_field)?,
                    join_alias: Ident::new(&format!("{}_{}_lk", alias, t.code_column))?,
                    output_column: Ident::new(&format!("{}_{}_label", alias, t.code_column))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let display_name = descriptor
            .display_name
            .iter()
            .map(|part| match part {
                DisplayPart::Column(column) => Ok(DisplaySegment::Column(Ident::new(column)?)),
                DisplayPart::Text(text) => Ok(DisplaySegment::Text(text.clone())),
                DisplayPart::Translation(code_column) => translation_columns
                    .iter()
                    .position(|t| t.code_column.as_str() == code_column)
                    .map(DisplaySegment::Translation)
                    .ok_or_else(|| {
                        Error::Config(format!(
                            "Entity '{}' display name uses undeclared translation '{}'",
                            alias, code_column
                        ))
                    }),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            object_type_id,
            object_type_code: descriptor.object_type_code.clone(),
            table_name: Ident::new(&descriptor.table_name)?,
            alias,
            select_columns,
            translation_columns,
            display_name,
        })
    }

    /// Output columns this entity contributes to the fan-out, in order
    pub fn output_columns(&self) -> impl Iterator<Item = &Ident> {
        self.select_columns
            .iter()
            .map(|c| &c.output_column)
            .chain(self.translation_columns.iter().map(|t| &t.output_column))
    }
}

/// Immutable set of entity configs keyed by object type id
#[derive(Debug, Clone, Default, Serialize)]
pub struct EntityRegistry {
    /// Ordered by object type id so the fan-out is deterministic
    configs: Vec<EntityConfig>,
}

impl EntityRegistry {
    /// Assemble a registry, rejecting clashing type ids, aliases or columns
    ///
    /// SQLite identifiers are case-insensitive, so aliases and output columns
    /// clash when they differ only in case.
    pub fn from_configs(mut configs: Vec<EntityConfig>) -> Result<Self> {
        configs.sort_by_key(|c| c.object_type_id);

        let mut type_ids = HashSet::new();
        let mut aliases: HashSet<String> =
            RESERVED_ALIASES.iter().map(|a| a.to_ascii_lowercase()).collect();
        let mut columns: HashSet<String> = COMMON_COLUMNS
            .iter()
            .chain(TRAILING_COLUMNS.iter())
            .map(|c| c.to_ascii_lowercase())
            .collect();

        for config in &configs {
            if !type_ids.insert(config.object_type_id) {
                return Err(Error::Config(format!(
                    "Object type {} is registered twice",
                    config.object_type_id
                )));
            }

            let table_aliases = std::iter::once(&config.alias)
                .chain(config.translation_columns.iter().map(|t| &t.join_alias));
            for alias in table_aliases {
                if !aliases.insert(alias.as_str().to_ascii_lowercase()) {
                    return Err(Error::Config(format!("Duplicate join alias '{}'", alias)));
                }
            }

            for column in config.output_columns() {
                if !columns.insert(column.as_str().to_ascii_lowercase()) {
                    return Err(Error::Config(format!(
                        "Duplicate relation output column '{}'",
                        column
                    )));
                }
            }

            for segment in &config.display_name {
                if let DisplaySegment::Translation(index) = segment {
                    if *index >= config.translation_columns.len() {
                        return Err(Error::Config(format!(
                            "Entity '{}' display name refers to translation {} of {}",
                            config.alias,
                            index,
                            config.translation_columns.len()
                        )));
                    }
                }
            }
        }

        Ok(Self { configs })
    }

    /// Resolve descriptors against the active object types
    ///
    /// Descriptors naming an unknown or inactive object type are skipped.
    pub fn build(
        descriptors: &[EntityTypeDescriptor],
        object_types: &[ObjectType],
    ) -> Result<Self> {
        let active: HashMap<&str, i64> = object_types
            .iter()
            .filter(|t| t.is_active)
            .map(|t| (t.code.as_str(), t.id))
            .collect();

        let mut configs = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            match active.get(descriptor.object_type_code.as_str()) {
                Some(&object_type_id) => {
                    configs.push(EntityConfig::from_descriptor(descriptor, object_type_id)?);
                }
                None => warn!(
                    "Skipping entity type '{}': no active object type with that code",
                    descriptor.object_type_code
                ),
            }
        }

        Self::from_configs(configs)
    }

    /// Load the registry from the store's active object types
    pub async fn load(pool: &SqlitePool, descriptors: &[EntityTypeDescriptor]) -> Result<Self> {
        let object_types = list_active_object_types(pool).await?;
        let registry = Self::build(descriptors, &object_types)?;

        if registry.is_empty() {
            warn!("Entity registry is empty; relation listings will fail until it is reloaded");
        } else {
            info!(
                "Entity registry loaded: {}",
                registry
                    .configs
                    .iter()
                    .map(|c| format!("{}={}", c.object_type_code, c.object_type_id))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }

        Ok(registry)
    }

    pub fn resolve(&self, object_type_id: i64) -> Option<&EntityConfig> {
        self.configs.iter().find(|c| c.object_type_id == object_type_id)
    }

    pub fn by_alias(&self, alias: &str) -> Option<&EntityConfig> {
        self.configs.iter().find(|c| c.alias.as_str() == alias)
    }

    pub fn configs(&self) -> &[EntityConfig] {
        &self.configs
    }

    pub fn registered_type_ids(&self) -> Vec<i64> {
        self.configs.iter().map(|c| c.object_type_id).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }
}

/// Label used when an object has no registered entity type or an empty name
pub fn fallback_display_name(object_id: i64) -> String {
    format!("Object #{}", object_id)
}

/// Registry handle shared across requests
///
/// Readers take an `Arc` snapshot; [`SharedRegistry::replace`] swaps the whole
/// registry at once.
#[derive(Debug, Default)]
pub struct SharedRegistry {
    current: RwLock<Arc<EntityRegistry>>,
}

impl SharedRegistry {
    pub fn new(registry: EntityRegistry) -> Self {
        Self {
            current: RwLock::new(Arc::new(registry)),
        }
    }

    pub fn snapshot(&self) -> Arc<EntityRegistry> {
        match self.current.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, registry: EntityRegistry) {
        let registry = Arc::new(registry);
        match self.current.write() {
            Ok(mut guard) => *guard = registry,
            Err(poisoned) => *poisoned.into_inner() = registry,
        }
    }
}
