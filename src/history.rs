//! Append-only ledger of deal snapshots.

use std::sync::{Arc, Mutex};

use chrono::Utc;

use crate::deal::Deal;
use crate::error::StoreError;
use crate::stone::TimeStamp;
use crate::store::{DEAL_HISTORY_KEY, RecordStore, get_record, put_record};

/// One snapshot of a deal at a point in transition. Entries are never
/// mutated or deleted.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    #[n(0)]
    pub deal: Deal,
    #[n(1)]
    pub logged_at: TimeStamp<Utc>,
}

/// The single history object. Appends are read-append-write on one stored
/// object, so they serialize on their own gate.
#[derive(Clone)]
pub struct DealHistory {
    store: Arc<dyn RecordStore>,
    gate: Arc<Mutex<()>>,
}

impl DealHistory {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Appends a snapshot of the deal as it stands right now.
    pub fn append(&self, deal: &Deal) -> Result<(), StoreError> {
        let _gate = self.gate.lock().unwrap_or_else(|e| e.into_inner());

        let mut entries: Vec<HistoryEntry> =
            get_record(self.store.as_ref(), DEAL_HISTORY_KEY)?.unwrap_or_default();
        entries.push(HistoryEntry {
            deal: deal.clone(),
            logged_at: TimeStamp::new(),
        });
        put_record(self.store.as_ref(), DEAL_HISTORY_KEY, &entries)?;
        Ok(())
    }

    pub fn entries(&self) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(get_record(self.store.as_ref(), DEAL_HISTORY_KEY)?.unwrap_or_default())
    }
}
