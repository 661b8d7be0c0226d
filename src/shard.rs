//! Per-supplier inventory shards: validated full-replace uploads.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{info, warn};

use crate::error::{StoreError, UploadError};
use crate::stock::StockCore;
use crate::stone::{LockFlag, Stone, StoneDraft, validate_batch};
use crate::store::COMBINED_STALE_KEY;

/// Summary of an accepted shard replace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardUpload {
    pub owner: String,
    pub accepted: usize,
    /// Stones that were mid-negotiation in the old shard and kept their
    /// lock through the replace.
    pub carried_locks: usize,
    pub warnings: Vec<String>,
}

/// Owns the full-replace mutation pattern for supplier shards. Lock-flag
/// toggles on individual rows belong to the lock manager, not here.
#[derive(Clone)]
pub struct ShardManager {
    core: Arc<StockCore>,
}

impl ShardManager {
    pub(crate) fn with_core(core: Arc<StockCore>) -> Self {
        Self { core }
    }

    /// Validates and atomically replaces the named shard.
    ///
    /// The batch is refused wholesale if any row fails validation. On
    /// success the lock flag of every stone that existed in the old shard
    /// and is still present in the new batch is carried forward, so a
    /// replace can never silently unlock a stone mid-negotiation. The
    /// combined view is marked stale; the caller (or the periodic
    /// housekeeping process) runs the reconciler to clear it.
    pub fn replace_shard(
        &self,
        owner: &str,
        drafts: Vec<StoneDraft>,
    ) -> Result<ShardUpload, UploadError> {
        let mut stones = match validate_batch(&drafts) {
            Ok(stones) => stones,
            Err(errors) => {
                warn!(owner, errors = errors.len(), "rejected shard upload");
                return Err(UploadError::Rejected(errors));
            }
        };

        let mut warnings = Vec::new();
        let blank_optional = stones
            .iter()
            .filter(|s| s.cut.is_empty() && s.polish.is_empty() && s.symmetry.is_empty())
            .count();
        if blank_optional > 0 {
            warnings.push(format!(
                "cut/polish/symmetry left blank on {blank_optional} row(s)"
            ));
        }

        let _gate = self.core.gate();

        let previously_locked: BTreeSet<String> = self
            .core
            .load_shard(owner)?
            .into_iter()
            .filter(|s| s.locked.is_locked())
            .map(|s| s.stock_id)
            .collect();

        let mut carried_locks = 0;
        for stone in &mut stones {
            stone.supplier = owner.to_string();
            if previously_locked.contains(&stone.stock_id) {
                stone.locked = LockFlag::Yes;
                carried_locks += 1;
            }
        }

        self.core.save_shard(owner, &stones)?;
        self.core
            .store
            .put(COMBINED_STALE_KEY, owner.as_bytes())
            .map_err(UploadError::Store)?;

        info!(
            owner,
            accepted = stones.len(),
            carried_locks,
            "replaced supplier shard"
        );

        Ok(ShardUpload {
            owner: owner.to_string(),
            accepted: stones.len(),
            carried_locks,
            warnings,
        })
    }

    /// Current contents of one shard.
    pub fn load_shard(&self, owner: &str) -> Result<Vec<Stone>, StoreError> {
        self.core.load_shard(owner)
    }

    /// Owner identities of every stored shard.
    pub fn shard_owners(&self) -> Result<Vec<String>, StoreError> {
        self.core.shard_owners()
    }
}
