//! Shared stock state: the combined view, the per-supplier shards, and the
//! single write gate that serializes every mutation of them.
//!
//! The backing store has no row-level transactions, so every lock flip,
//! shard replace and rebuild is a whole-object read-modify-write. All of
//! them funnel through [`StockCore::gate`]; no other component writes
//! inventory objects.

use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::StoreError;
use crate::lock::StoneLockManager;
use crate::reconcile::Reconciler;
use crate::shard::ShardManager;
use crate::stone::Stone;
use crate::store::{
    self, COMBINED_STOCK_KEY, RecordStore, SUPPLIER_STOCK_PREFIX, get_record, put_record,
};

pub(crate) struct StockCore {
    pub(crate) store: Arc<dyn RecordStore>,
    view_gate: Mutex<()>,
}

impl StockCore {
    /// Entry to the single-writer critical section. Writers re-read state
    /// under the gate, so a poisoned mutex carries no stale data.
    pub(crate) fn gate(&self) -> MutexGuard<'_, ()> {
        self.view_gate.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn load_view(&self) -> Result<Vec<Stone>, StoreError> {
        Ok(get_record(self.store.as_ref(), COMBINED_STOCK_KEY)?.unwrap_or_default())
    }

    /// Writes the combined view and returns the encoded bytes (the
    /// reconciler fingerprints them).
    pub(crate) fn save_view(&self, rows: &[Stone]) -> Result<Vec<u8>, StoreError> {
        put_record(self.store.as_ref(), COMBINED_STOCK_KEY, &rows)
    }

    pub(crate) fn load_shard(&self, owner: &str) -> Result<Vec<Stone>, StoreError> {
        Ok(get_record(self.store.as_ref(), &store::shard_key(owner))?.unwrap_or_default())
    }

    pub(crate) fn save_shard(&self, owner: &str, rows: &[Stone]) -> Result<(), StoreError> {
        put_record(self.store.as_ref(), &store::shard_key(owner), &rows)?;
        Ok(())
    }

    /// Owner identities of every stored shard, in key order.
    pub(crate) fn shard_owners(&self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .store
            .list(SUPPLIER_STOCK_PREFIX)?
            .into_iter()
            .filter_map(|k| {
                k.strip_prefix(SUPPLIER_STOCK_PREFIX)
                    .map(|owner| owner.to_string())
            })
            .collect())
    }
}

/// Handle to the inventory side of the marketplace. Hands out the three
/// components that are allowed to mutate stock objects, all sharing one
/// write gate.
#[derive(Clone)]
pub struct StockBook {
    core: Arc<StockCore>,
}

impl StockBook {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            core: Arc::new(StockCore {
                store,
                view_gate: Mutex::new(()),
            }),
        }
    }

    pub fn shards(&self) -> ShardManager {
        ShardManager::with_core(self.core.clone())
    }

    pub fn reconciler(&self) -> Reconciler {
        Reconciler::with_core(self.core.clone())
    }

    pub fn locks(&self) -> StoneLockManager {
        StoneLockManager::with_core(self.core.clone())
    }

    /// Looks a stone up in the combined view.
    pub fn stone(&self, stock_id: &str) -> Result<Option<Stone>, StoreError> {
        Ok(self
            .core
            .load_view()?
            .into_iter()
            .find(|s| s.stock_id == stock_id))
    }

    /// The full combined view, the read path for search and deals.
    pub fn combined_view(&self) -> Result<Vec<Stone>, StoreError> {
        self.core.load_view()
    }

    pub(crate) fn store(&self) -> Arc<dyn RecordStore> {
        self.core.store.clone()
    }
}
