//! Rebuilds the combined inventory view from the union of all shards.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::StoreError;
use crate::stock::StockCore;
use crate::store::COMBINED_STALE_KEY;

/// sha256 fingerprint of the encoded combined view. Two rebuilds with no
/// intervening shard writes produce equal digests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewDigest(pub String);

impl std::fmt::Display for ViewDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the combined view. The view is a disposable cache: shards are
/// the source of truth for every field, lock flags included, at rebuild
/// time.
#[derive(Clone)]
pub struct Reconciler {
    core: Arc<StockCore>,
}

impl Reconciler {
    pub(crate) fn with_core(core: Arc<StockCore>) -> Self {
        Self { core }
    }

    /// Unions all shards into the combined view, in shard-key order with
    /// row order preserved within each shard, and clears the stale marker.
    ///
    /// A shard that fails to decode aborts the rebuild; the previous view
    /// object stays in place rather than absorbing corrupt rows.
    pub fn rebuild(&self) -> Result<ViewDigest, StoreError> {
        let _gate = self.core.gate();

        let owners = self.core.shard_owners()?;
        let mut combined = Vec::new();

        for owner in &owners {
            let mut rows = self.core.load_shard(owner)?;
            for row in &mut rows {
                // the shard key decides ownership, whatever the row claims
                row.supplier = owner.clone();
            }
            combined.append(&mut rows);
        }

        let mut by_id: BTreeMap<&str, usize> = BTreeMap::new();
        for stone in &combined {
            *by_id.entry(stone.stock_id.as_str()).or_default() += 1;
        }
        let collisions: Vec<&str> = by_id
            .iter()
            .filter(|(_, n)| **n > 1)
            .map(|(id, _)| *id)
            .collect();
        if !collisions.is_empty() {
            warn!(
                ids = %collisions.join(", "),
                "stock ids shared by more than one supplier"
            );
        }

        let encoded = self.core.save_view(&combined)?;
        self.core.store.delete(COMBINED_STALE_KEY)?;

        info!(
            shards = owners.len(),
            rows = combined.len(),
            "rebuilt combined stock view"
        );

        Ok(ViewDigest(sha256::digest(&encoded)))
    }

    /// Whether a shard has been replaced since the last rebuild.
    pub fn is_stale(&self) -> Result<bool, StoreError> {
        Ok(self.core.store.get(COMBINED_STALE_KEY)?.is_some())
    }
}
