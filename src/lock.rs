//! Claim and release of individual stones.
//!
//! `try_lock`, `unlock` and `remove` are whole-object read-modify-writes on
//! the combined view and the owning shard. All three re-read state inside
//! the shared write gate, which makes claims on a stone linearizable within
//! the process: under N concurrent `try_lock` calls for one stock id,
//! exactly one caller wins.

use std::sync::Arc;

use tracing::info;

use crate::error::StoreError;
use crate::stock::StockCore;
use crate::stone::LockFlag;

#[derive(Clone)]
pub struct StoneLockManager {
    core: Arc<StockCore>,
}

impl StoneLockManager {
    pub(crate) fn with_core(core: Arc<StockCore>) -> Self {
        Self { core }
    }

    /// Claims a stone. Returns `Ok(false)` when the stone does not exist,
    /// is already locked, or a concurrent caller won the race.
    ///
    /// The flag is flipped in the owning shard before the view: shards are
    /// the source of truth at rebuild time, so a failure between the two
    /// writes leaves a state the next rebuild repairs in the lock holder's
    /// favour.
    pub fn try_lock(&self, stock_id: &str) -> Result<bool, StoreError> {
        let _gate = self.core.gate();

        let mut view = self.core.load_view()?;
        let Some(pos) = view
            .iter()
            .position(|s| s.stock_id == stock_id && !s.locked.is_locked())
        else {
            return Ok(false);
        };

        let owner = view[pos].supplier.clone();
        let mut shard = self.core.load_shard(&owner)?;
        for row in shard.iter_mut().filter(|s| s.stock_id == stock_id) {
            row.locked = LockFlag::Yes;
        }
        self.core.save_shard(&owner, &shard)?;

        view[pos].locked = LockFlag::Yes;
        self.core.save_view(&view)?;

        info!(stock_id, %owner, "locked stone");
        Ok(true)
    }

    /// Releases a stone. Idempotent: unlocking a stone that is already
    /// unlocked, or that does not exist, is a no-op.
    pub fn unlock(&self, stock_id: &str) -> Result<(), StoreError> {
        let _gate = self.core.gate();

        let mut view = self.core.load_view()?;
        let Some(pos) = view
            .iter()
            .position(|s| s.stock_id == stock_id && s.locked.is_locked())
        else {
            return Ok(());
        };

        let owner = view[pos].supplier.clone();
        let mut shard = self.core.load_shard(&owner)?;
        for row in shard.iter_mut().filter(|s| s.stock_id == stock_id) {
            row.locked = LockFlag::No;
        }
        self.core.save_shard(&owner, &shard)?;

        view[pos].locked = LockFlag::No;
        self.core.save_view(&view)?;

        info!(stock_id, "unlocked stone");
        Ok(())
    }

    /// Permanently deletes a stone from the combined view and its shard.
    /// Used only on deal fulfillment. Idempotent.
    pub fn remove(&self, stock_id: &str) -> Result<(), StoreError> {
        let _gate = self.core.gate();

        let mut view = self.core.load_view()?;
        let owner = view
            .iter()
            .find(|s| s.stock_id == stock_id)
            .map(|s| s.supplier.clone());

        if owner.is_some() {
            view.retain(|s| s.stock_id != stock_id);
            self.core.save_view(&view)?;
        }

        // the view may already have forgotten the stone; sweep shards so a
        // repeated or partially-failed removal still converges
        let owners = match owner {
            Some(o) => vec![o],
            None => self.core.shard_owners()?,
        };
        for owner in owners {
            let mut shard = self.core.load_shard(&owner)?;
            let before = shard.len();
            shard.retain(|s| s.stock_id != stock_id);
            if shard.len() != before {
                self.core.save_shard(&owner, &shard)?;
                info!(stock_id, %owner, "removed stone from shard");
            }
        }

        Ok(())
    }
}
