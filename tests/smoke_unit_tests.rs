//! Smoke Screen Unit tests for marketplace core components
//!
//! These test are unit tests that span the codebase, testing behavior in
//! isolation from integration scenarios. These are intended as smoke-screen
//! and generally test the happy-path, against the in-memory store.

use std::sync::Arc;

use diamond_desk::{
    account::{Account, AccountBook, Role},
    error::UploadError,
    history::DealHistory,
    notify::{Notifier, StoreNotifier},
    stock::StockBook,
    stone::{LockFlag, StoneDraft},
    store::{MemoryStore, RecordStore},
    utils::new_uuid_to_bech32,
};

/// A fully-populated draft row, ready to pass validation.
fn draft(id: &str, price: f64) -> StoneDraft {
    StoneDraft::new()
        .set_stock_id(id)
        .set_shape("Round")
        .set_weight(1.01)
        .set_color("E")
        .set_clarity("VS2")
        .set_lab("GIA")
        .set_report_no(&format!("RPT-{id}"))
        .set_diamond_type("Natural")
        .set_description("round brilliant, eye clean")
        .set_price_per_carat(price)
}

fn memory_book() -> (Arc<dyn RecordStore>, StockBook) {
    let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
    let book = StockBook::new(store.clone());
    (store, book)
}

// UTILS MODULE TESTS
#[cfg(test)]
mod utils_tests {
    use super::*;

    /// Test that new_uuid_to_bech32 generates valid bech32-encoded strings
    /// with the correct human-readable prefix
    #[test]
    fn generates_valid_bech32_with_hrp() {
        let result = new_uuid_to_bech32("client_");
        assert!(result.is_ok());

        let encoded = result.unwrap();
        assert!(encoded.starts_with("client_1"));
        assert!(encoded.len() > 10);
    }

    /// Test that the function handles empty strings appropriately
    #[test]
    fn handles_empty_hrp() {
        let result = new_uuid_to_bech32("");
        assert!(result.is_err());
    }

    /// Test that multiple calls generate unique identifiers
    #[test]
    fn generates_unique_ids() {
        let id1 = new_uuid_to_bech32("client_").unwrap();
        let id2 = new_uuid_to_bech32("client_").unwrap();

        assert_ne!(id1, id2);
    }
}

// SHARD MANAGER TESTS
#[cfg(test)]
mod shard_tests {
    use super::*;

    /// Test that a valid upload replaces the shard and stamps ownership
    #[test]
    fn replace_shard_stamps_supplier() {
        let (_, book) = memory_book();

        let upload = book
            .shards()
            .replace_shard("gems_r_us", vec![draft("D001", 8_000.0), draft("D002", 5_500.0)])
            .unwrap();

        assert_eq!(upload.accepted, 2);
        assert_eq!(upload.carried_locks, 0);

        let shard = book.shards().load_shard("gems_r_us").unwrap();
        assert!(shard.iter().all(|s| s.supplier == "gems_r_us"));
        assert!(shard.iter().all(|s| s.locked == LockFlag::No));
    }

    /// Test that an invalid batch is refused wholesale
    #[test]
    fn invalid_batch_is_rejected() {
        let (_, book) = memory_book();

        let bad = draft("D003", -1.0); // non-positive price
        let err = book
            .shards()
            .replace_shard("gems_r_us", vec![draft("D001", 8_000.0), bad])
            .unwrap_err();

        assert!(matches!(err, UploadError::Rejected(errors) if errors.len() == 1));
        // nothing was written
        assert!(book.shards().load_shard("gems_r_us").unwrap().is_empty());
    }

    /// Test that a replace carries forward the lock of a mid-negotiation stone
    #[test]
    fn replace_carries_existing_locks_forward() {
        let (_, book) = memory_book();
        let shards = book.shards();

        shards
            .replace_shard("gems_r_us", vec![draft("D001", 8_000.0)])
            .unwrap();
        book.reconciler().rebuild().unwrap();
        assert!(book.locks().try_lock("D001").unwrap());

        // re-upload still containing D001 plus a new stone
        let upload = shards
            .replace_shard("gems_r_us", vec![draft("D001", 8_100.0), draft("D002", 4_000.0)])
            .unwrap();
        assert_eq!(upload.carried_locks, 1);

        let shard = shards.load_shard("gems_r_us").unwrap();
        let d001 = shard.iter().find(|s| s.stock_id == "D001").unwrap();
        let d002 = shard.iter().find(|s| s.stock_id == "D002").unwrap();
        assert_eq!(d001.locked, LockFlag::Yes);
        assert_eq!(d002.locked, LockFlag::No);
    }
}

// RECONCILER TESTS
#[cfg(test)]
mod reconcile_tests {
    use super::*;

    /// Test that rebuild unions shards and tags rows with their owner
    #[test]
    fn rebuild_unions_all_shards() {
        let (_, book) = memory_book();
        let shards = book.shards();

        shards
            .replace_shard("alpha", vec![draft("A1", 1_000.0), draft("A2", 2_000.0)])
            .unwrap();
        shards
            .replace_shard("beta", vec![draft("B1", 3_000.0)])
            .unwrap();

        book.reconciler().rebuild().unwrap();

        let view = book.combined_view().unwrap();
        assert_eq!(view.len(), 3);
        assert_eq!(
            view.iter().filter(|s| s.supplier == "alpha").count(),
            2,
            "alpha rows keep alpha ownership"
        );
    }

    /// Test that a shard replace marks the view stale and rebuild clears it
    #[test]
    fn stale_marker_lifecycle() {
        let (_, book) = memory_book();
        let reconciler = book.reconciler();

        assert!(!reconciler.is_stale().unwrap());

        book.shards()
            .replace_shard("alpha", vec![draft("A1", 1_000.0)])
            .unwrap();
        assert!(reconciler.is_stale().unwrap());

        reconciler.rebuild().unwrap();
        assert!(!reconciler.is_stale().unwrap());
    }

    /// Test that two rebuilds with no intervening writes are identical
    #[test]
    fn rebuild_is_idempotent() {
        let (_, book) = memory_book();

        book.shards()
            .replace_shard("alpha", vec![draft("A1", 1_000.0), draft("A2", 2_000.0)])
            .unwrap();

        let first = book.reconciler().rebuild().unwrap();
        let second = book.reconciler().rebuild().unwrap();

        assert_eq!(first, second);
    }
}

// LOCK MANAGER TESTS
#[cfg(test)]
mod lock_tests {
    use super::*;

    fn seeded_book() -> StockBook {
        let (_, book) = memory_book();
        book.shards()
            .replace_shard("gems_r_us", vec![draft("D001", 8_000.0)])
            .unwrap();
        book.reconciler().rebuild().unwrap();
        book
    }

    /// Test that a stone can be locked once and only once
    #[test]
    fn second_lock_attempt_loses() {
        let book = seeded_book();
        let locks = book.locks();

        assert!(locks.try_lock("D001").unwrap());
        assert!(!locks.try_lock("D001").unwrap());
    }

    /// Test that locking a nonexistent stone reports failure, not an error
    #[test]
    fn locking_missing_stone_returns_false() {
        let book = seeded_book();
        assert!(!book.locks().try_lock("NOPE").unwrap());
    }

    /// Test that a lock propagates to the owning shard file
    #[test]
    fn lock_propagates_to_shard() {
        let book = seeded_book();

        book.locks().try_lock("D001").unwrap();

        let shard = book.shards().load_shard("gems_r_us").unwrap();
        assert_eq!(shard[0].locked, LockFlag::Yes);
    }

    /// Test that unlock is idempotent, including on unknown stones
    #[test]
    fn unlock_is_idempotent() {
        let book = seeded_book();
        let locks = book.locks();

        locks.try_lock("D001").unwrap();
        locks.unlock("D001").unwrap();
        locks.unlock("D001").unwrap();
        locks.unlock("NOPE").unwrap();

        let stone = book.stone("D001").unwrap().unwrap();
        assert_eq!(stone.locked, LockFlag::No);
        assert!(locks.try_lock("D001").unwrap(), "released stone is claimable");
    }

    /// Test that remove deletes the stone from shard and view, idempotently
    #[test]
    fn remove_is_permanent_and_idempotent() {
        let book = seeded_book();
        let locks = book.locks();

        locks.remove("D001").unwrap();
        locks.remove("D001").unwrap();

        assert!(book.stone("D001").unwrap().is_none());
        assert!(book.shards().load_shard("gems_r_us").unwrap().is_empty());
        assert!(!locks.try_lock("D001").unwrap());
    }
}

// ACCOUNT BOOK TESTS
#[cfg(test)]
mod account_tests {
    use super::*;

    /// Test upsert-then-find and the approved-admin fan-out list
    #[test]
    fn upsert_find_and_admin_list() {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let accounts = AccountBook::new(store);

        accounts
            .upsert(Account {
                username: "ops".to_string(),
                role: Role::Admin,
                approved: false,
            })
            .unwrap();
        accounts
            .upsert(Account {
                username: "boss".to_string(),
                role: Role::Admin,
                approved: true,
            })
            .unwrap();
        accounts
            .upsert(Account {
                username: "gems_r_us".to_string(),
                role: Role::Supplier,
                approved: true,
            })
            .unwrap();

        assert_eq!(accounts.find("boss").unwrap().unwrap().role, Role::Admin);
        assert!(accounts.find("nobody").unwrap().is_none());

        let admins = accounts.approved_admins().unwrap();
        assert_eq!(admins.len(), 1, "unapproved admins are not fanned out to");
        assert_eq!(admins[0].username, "boss");
    }

    /// Test that upsert replaces an existing account in place
    #[test]
    fn upsert_replaces_same_username() {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let accounts = AccountBook::new(store);

        accounts
            .upsert(Account {
                username: "ops".to_string(),
                role: Role::Admin,
                approved: false,
            })
            .unwrap();
        accounts
            .upsert(Account {
                username: "ops".to_string(),
                role: Role::Admin,
                approved: true,
            })
            .unwrap();

        assert_eq!(accounts.all().unwrap().len(), 1);
        assert!(accounts.find("ops").unwrap().unwrap().approved);
    }
}

// NOTIFICATION AND HISTORY TESTS
#[cfg(test)]
mod sink_tests {
    use super::*;
    use diamond_desk::deal::Deal;

    /// Test that notifications land unread in the recipient's mailbox
    #[test]
    fn notifications_append_to_mailbox() {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let notifier = StoreNotifier::new(store);

        notifier.notify("gems_r_us", Role::Supplier, "first");
        notifier.notify("gems_r_us", Role::Supplier, "second");

        let mailbox = notifier.mailbox("gems_r_us", Role::Supplier).unwrap();
        assert_eq!(mailbox.len(), 2);
        assert_eq!(mailbox[0].message, "first");
        assert!(mailbox.iter().all(|n| !n.read));
    }

    /// Test that history keeps one snapshot per append, in order
    #[test]
    fn history_appends_snapshots() {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let history = DealHistory::new(store);

        let deal = Deal::new("D001", "gems_r_us", "client_a", 10_000.0, 9_500.0);
        history.append(&deal).unwrap();
        history.append(&deal).unwrap();

        let entries = history.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].deal, deal);
    }
}
