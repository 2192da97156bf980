//! # objrel Common Library
//!
//! Shared code for the objrel relation engine:
//! - Error taxonomy with stable codes
//! - Configuration loading and root folder resolution
//! - Entity type descriptors (registry source of truth)
//! - Database schema initialization and models

pub mod config;
pub mod db;
pub mod entity_types;
pub mod error;

pub use entity_types::{DisplayPart, EntityTypeDescriptor, TranslationColumn};
pub use error::{Error, Result};
