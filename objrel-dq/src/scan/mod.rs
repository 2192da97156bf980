//! Data quality scanner
//!
//! Read-only detectors over the relation graph. Each detector is one
//! set-based query with a deterministic order and can run on its own.

pub mod duplicates;
pub mod invalid;
pub mod mirrors;
pub mod orphaned;
pub mod relation_types;

pub use duplicates::{scan_duplicates, DuplicateGroup, KeepPolicy};
pub use invalid::{scan_invalid, InvalidReason, InvalidRelation};
pub use mirrors::{scan_missing_mirrors, MissingMirrorRelation};
pub use orphaned::{scan_orphaned, InactiveSide, OrphanedRelation};
pub use relation_types::{scan_relation_types, RelationTypeIssue, RelationTypeIssueKind};

use objrel_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;

use crate::registry::EntityRegistry;

/// Finding counts of the four edge detectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ScanSummary {
    pub orphaned: usize,
    pub duplicate_groups: usize,
    /// Edges beyond the first in each duplicate group
    pub duplicate_surplus: usize,
    pub invalid: usize,
    pub missing_mirrors: usize,
}

impl ScanSummary {
    pub fn is_clean(&self) -> bool {
        *self == Self::default()
    }
}

/// Run all four edge detectors
pub async fn scan_summary(pool: &SqlitePool, registry: &EntityRegistry) -> Result<ScanSummary> {
    let (orphaned, duplicates, invalid, mirrors) = tokio::try_join!(
        scan_orphaned(pool),
        scan_duplicates(pool),
        scan_invalid(pool, registry),
        scan_missing_mirrors(pool),
    )?;

    let summary = ScanSummary {
        orphaned: orphaned.len(),
        duplicate_groups: duplicates.len(),
        duplicate_surplus: duplicates
            .iter()
            .map(|g| g.relation_ids.len().saturating_sub(1))
            .sum(),
        invalid: invalid.len(),
        missing_mirrors: mirrors.len(),
    };

    debug!(?summary, "Scan summary");
    Ok(summary)
}
