//! Relation listing query construction

pub mod ast;
pub mod builder;

pub use builder::{build_relations_query, RelationOrder, RelationsQuery, RelationsRequest};
