//! Notification mailboxes and the activity audit trail.
//!
//! Both are collaborator boundaries: delivery transport is someone else's
//! problem, so the traits are fire-and-forget and the store-backed impls
//! only log a warning when a write fails. A deal must never fail because
//! its notification could not be recorded.

use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::warn;

use crate::account::Role;
use crate::error::StoreError;
use crate::stone::TimeStamp;
use crate::store::{RecordStore, activity_key, get_record, mailbox_key, put_record};

/// Fire-and-forget mailbox write.
pub trait Notifier: Send + Sync {
    fn notify(&self, recipient: &str, role: Role, message: &str);
}

/// Fire-and-forget audit append.
pub trait ActivityLog: Send + Sync {
    fn record(&self, actor: &str, role: Role, action: &str, details: &str);
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct Notification {
    #[n(0)]
    pub message: String,
    #[n(1)]
    pub time: TimeStamp<Utc>,
    #[n(2)]
    pub read: bool,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq)]
pub struct ActivityEntry {
    #[n(0)]
    pub actor: String,
    #[n(1)]
    pub role: Role,
    #[n(2)]
    pub action: String,
    #[n(3)]
    pub details: String,
    #[n(4)]
    pub at: TimeStamp<Utc>,
}

/// Mailboxes persisted as one object per recipient.
#[derive(Clone)]
pub struct StoreNotifier {
    store: Arc<dyn RecordStore>,
    gate: Arc<Mutex<()>>,
}

impl StoreNotifier {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Reads a recipient's mailbox.
    pub fn mailbox(&self, recipient: &str, role: Role) -> Result<Vec<Notification>, StoreError> {
        let key = mailbox_key(&role.to_string(), recipient);
        Ok(get_record(self.store.as_ref(), &key)?.unwrap_or_default())
    }

    fn append(&self, recipient: &str, role: Role, message: &str) -> Result<(), StoreError> {
        let _gate = self.gate.lock().unwrap_or_else(|e| e.into_inner());

        let key = mailbox_key(&role.to_string(), recipient);
        let mut notifications: Vec<Notification> =
            get_record(self.store.as_ref(), &key)?.unwrap_or_default();
        notifications.push(Notification {
            message: message.to_string(),
            time: TimeStamp::new(),
            read: false,
        });
        put_record(self.store.as_ref(), &key, &notifications)?;
        Ok(())
    }
}

impl Notifier for StoreNotifier {
    fn notify(&self, recipient: &str, role: Role, message: &str) {
        if let Err(e) = self.append(recipient, role, message) {
            warn!(recipient, %role, error = %e, "failed to save notification");
        }
    }
}

/// Audit trail persisted per actor per day.
#[derive(Clone)]
pub struct StoreActivityLog {
    store: Arc<dyn RecordStore>,
    gate: Arc<Mutex<()>>,
}

impl StoreActivityLog {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            gate: Arc::new(Mutex::new(())),
        }
    }

    /// Reads one actor's trail for a calendar date (`YYYY-MM-DD`).
    pub fn trail(&self, actor: &str, date: &str) -> Result<Vec<ActivityEntry>, StoreError> {
        let key = activity_key(date, actor);
        Ok(get_record(self.store.as_ref(), &key)?.unwrap_or_default())
    }

    fn append(&self, actor: &str, role: Role, action: &str, details: &str) -> Result<(), StoreError> {
        let _gate = self.gate.lock().unwrap_or_else(|e| e.into_inner());

        let at = TimeStamp::new();
        let key = activity_key(&at.date_string(), actor);
        let mut entries: Vec<ActivityEntry> =
            get_record(self.store.as_ref(), &key)?.unwrap_or_default();
        entries.push(ActivityEntry {
            actor: actor.to_string(),
            role,
            action: action.to_string(),
            details: details.to_string(),
            at,
        });
        put_record(self.store.as_ref(), &key, &entries)?;
        Ok(())
    }
}

impl ActivityLog for StoreActivityLog {
    fn record(&self, actor: &str, role: Role, action: &str, details: &str) {
        if let Err(e) = self.append(actor, role, action, details) {
            warn!(actor, action, error = %e, "failed to record activity");
        }
    }
}
