//! Record store abstraction over the object storage backend.
//!
//! The backing store is plain key/value object storage: no transactions,
//! last-writer-wins per object. Everything the marketplace persists goes
//! through [`RecordStore`], so the rest of the crate never talks to sled
//! directly and unit tests can run against [`MemoryStore`].

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Context;

use crate::error::StoreError;

// Persisted object layout.
pub const ACCOUNTS_KEY: &str = "users/accounts";
pub const SUPPLIER_STOCK_PREFIX: &str = "stock/suppliers/";
pub const COMBINED_STOCK_KEY: &str = "stock/combined/all_suppliers";
pub const COMBINED_STALE_KEY: &str = "stock/combined/stale";
pub const DEALS_PREFIX: &str = "deals/records/";
pub const DEAL_HISTORY_KEY: &str = "deals/history";
pub const NOTIFICATIONS_PREFIX: &str = "notifications/";
pub const ACTIVITY_PREFIX: &str = "activity/";

pub fn shard_key(owner: &str) -> String {
    format!("{SUPPLIER_STOCK_PREFIX}{owner}")
}

pub fn deal_key(deal_id: &str) -> String {
    format!("{DEALS_PREFIX}{deal_id}")
}

pub fn mailbox_key(role: &str, recipient: &str) -> String {
    format!("{NOTIFICATIONS_PREFIX}{role}_{recipient}")
}

pub fn activity_key(date: &str, actor: &str) -> String {
    format!("{ACTIVITY_PREFIX}{date}/{actor}")
}

/// Object storage primitives. `get` returning `None` is a legitimate empty
/// state, distinct from `StoreError::Unavailable`.
pub trait RecordStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
    /// Keys under `prefix`, in lexicographic order.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
    fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Decode a CBOR record. A record that fails to decode is reported as
/// corrupt and never handed to the caller half-read.
pub fn get_record<T>(store: &dyn RecordStore, key: &str) -> Result<Option<T>, StoreError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    match store.get(key)? {
        None => Ok(None),
        Some(bytes) => minicbor::decode(&bytes)
            .map(Some)
            .map_err(|e| StoreError::Corrupt {
                key: key.to_string(),
                reason: e.to_string(),
            }),
    }
}

/// Encode and write a CBOR record, returning the encoded bytes.
pub fn put_record<T>(store: &dyn RecordStore, key: &str, record: &T) -> Result<Vec<u8>, StoreError>
where
    T: minicbor::Encode<()>,
{
    let bytes = minicbor::to_vec(record).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })?;
    store.put(key, &bytes)?;
    Ok(bytes)
}

/// Production store backed by an embedded sled database.
#[derive(Clone)]
pub struct SledStore {
    db: Arc<sled::Db>,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let db = sled::open(path).context("failed to open sled database")?;
        Ok(Self { db: Arc::new(db) })
    }

    pub fn new(db: Arc<sled::Db>) -> Self {
        Self { db }
    }
}

impl RecordStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.db.insert(key, bytes)?;
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        for kv in self.db.scan_prefix(prefix) {
            let (key, _) = kv?;
            let key = String::from_utf8(key.to_vec()).map_err(|e| StoreError::Corrupt {
                key: String::from_utf8_lossy(e.as_bytes()).into_owned(),
                reason: "non-utf8 key".to_string(),
            })?;
            keys.push(key);
        }
        Ok(keys)
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.db.remove(key)?;
        Ok(())
    }
}

/// In-memory store for unit tests.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn objects(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl RecordStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.objects().get(key).cloned())
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.objects().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self
            .objects()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() {
        let store = MemoryStore::new();

        store.put("a/one", b"1").unwrap();
        store.put("a/two", b"2").unwrap();
        store.put("b/three", b"3").unwrap();

        assert_eq!(store.get("a/one").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get("a/missing").unwrap(), None);
        assert_eq!(store.list("a/").unwrap(), vec!["a/one", "a/two"]);

        store.delete("a/one").unwrap();
        assert_eq!(store.get("a/one").unwrap(), None);
    }

    #[test]
    fn corrupt_record_is_reported_not_decoded() {
        let store = MemoryStore::new();
        store.put("bad", &[0xff, 0xff, 0xff]).unwrap();

        let res: Result<Option<Vec<String>>, _> = get_record(&store, "bad");
        assert!(matches!(res, Err(StoreError::Corrupt { .. })));
    }
}
