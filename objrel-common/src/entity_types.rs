//! Entity type descriptors
//!
//! A descriptor tells the relation engine how one entity type is stored: its
//! detail table, the alias used for its joined columns, which columns to
//! surface, which coded columns need a label lookup and how to build a
//! human-readable name. Descriptors are plain data; validation and resolution
//! of `object_type_code` to a numeric type id happen when the registry is built.

use serde::{Deserialize, Serialize};

/// Descriptor for one entity type, as written in `objrel.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityTypeDescriptor {
    /// `object_types.code` this descriptor describes
    pub object_type_code: String,
    /// Type-specific detail table, keyed by `id = objects.id`
    pub table_name: String,
    /// Prefix for this entity's output columns and join alias
    pub alias: String,
    /// Detail table columns surfaced in relation listings
    #[serde(default)]
    pub select_columns: Vec<String>,
    /// Coded columns resolved to a label through a lookup table
    #[serde(default)]
    pub translation_columns: Vec<TranslationColumn>,
    /// Parts concatenated into `related_object_display_name`
    #[serde(default)]
    pub display_name: Vec<DisplayPart>,
}

/// Coded-value lookup join: `LEFT JOIN lookup_table ON code_field = code_column`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationColumn {
    pub code_column: String,
    pub lookup_table: String,
    pub code_field: String,
    #[serde(default = "default_label_field")]
    pub label_field: String,
}

fn default_label_field() -> String {
    "name".to_string()
}

/// One piece of a display name
///
/// In TOML: `{ column = "first_name" }`, `{ text = " " }` or
/// `{ translation = "country_code" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisplayPart {
    /// Detail table column
    Column(String),
    /// Literal text (bound as a query parameter)
    Text(String),
    /// Label of a coded column declared in `translation_columns`
    Translation(String),
}

impl EntityTypeDescriptor {
    fn new(
        object_type_code: &str,
        table_name: &str,
        alias: &str,
        select_columns: &[&str],
    ) -> Self {
        Self {
            object_type_code: object_type_code.to_string(),
            table_name: table_name.to_string(),
            alias: alias.to_string(),
            select_columns: select_columns.iter().map(|c| c.to_string()).collect(),
            translation_columns: Vec::new(),
            display_name: Vec::new(),
        }
    }

    fn translate(mut self, code_column: &str, lookup_table: &str) -> Self {
        self.translation_columns.push(TranslationColumn {
            code_column: code_column.to_string(),
            lookup_table: lookup_table.to_string(),
            code_field: "code".to_string(),
            label_field: default_label_field(),
        });
        self
    }

    fn display(mut self, parts: Vec<DisplayPart>) -> Self {
        self.display_name = parts;
        self
    }
}

/// Built-in descriptors matching the demo entity tables created by `db::init`
pub fn default_entity_types() -> Vec<EntityTypeDescriptor> {
    use DisplayPart::{Column, Text};

    vec![
        EntityTypeDescriptor::new(
            "person",
            "persons",
            "person",
            &["first_name", "last_name", "email", "country_code"],
        )
        .translate("country_code", "countries")
        .display(vec![
            Column("first_name".into()),
            Text(" ".into()),
            Column("last_name".into()),
        ]),
        EntityTypeDescriptor::new(
            "company",
            "companies",
            "company",
            &["name", "registration_number", "country_code"],
        )
        .translate("country_code", "countries")
        .display(vec![Column("name".into())]),
        EntityTypeDescriptor::new(
            "document",
            "documents",
            "document",
            &["title", "document_number"],
        )
        .display(vec![Column("title".into())]),
        EntityTypeDescriptor::new(
            "invoice",
            "invoices",
            "invoice",
            &["invoice_number", "total_amount", "currency_code"],
        )
        .translate("currency_code", "currencies")
        .display(vec![Text("Invoice ".into()), Column("invoice_number".into())]),
        EntityTypeDescriptor::new(
            "file",
            "files",
            "file",
            &["file_name", "mime_type", "size_bytes"],
        )
        .display(vec![Column("file_name".into())]),
    ]
}
