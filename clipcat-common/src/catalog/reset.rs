//! Catalog reset
//!
//! Deletes every clip and sets all prefix counters back to 0. Meant for
//! test/demo deployments; operator confirmation belongs to the caller.

use std::sync::Arc;

use tracing::warn;

use super::registry::PrefixRegistry;
use crate::db::{Collection, DocumentStore, Filter};
use crate::Result;

/// Counts reported by [`reset_all`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetSummary {
    pub clips_deleted: u64,
    pub mappings_reset: u64,
}

pub async fn reset_all(store: Arc<dyn DocumentStore>) -> Result<ResetSummary> {
    let clips_deleted = store.delete_many(Collection::Clips, &Filter::all()).await?;
    let mappings_reset = PrefixRegistry::new(store).reset_counters().await?;

    warn!(clips_deleted, mappings_reset, "Catalog reset");
    Ok(ResetSummary {
        clips_deleted,
        mappings_reset,
    })
}
