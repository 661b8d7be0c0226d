//! The accounts collection: who exists and in what role.
//!
//! Login, passwords and sessions live outside the crate; the engine only
//! needs roles (to address mailboxes) and the approved-admin list for
//! notification fan-out.

use std::sync::{Arc, Mutex};

use crate::error::StoreError;
use crate::store::{ACCOUNTS_KEY, RecordStore, get_record, put_record};

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    #[n(0)]
    Client,
    #[n(1)]
    Supplier,
    #[n(2)]
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Role::Client => "client",
            Role::Supplier => "supplier",
            Role::Admin => "admin",
        })
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Account {
    #[n(0)]
    pub username: String,
    #[n(1)]
    pub role: Role,
    #[n(2)]
    pub approved: bool,
}

/// All accounts live in one stored collection object.
#[derive(Clone)]
pub struct AccountBook {
    store: Arc<dyn RecordStore>,
    gate: Arc<Mutex<()>>,
}

impl AccountBook {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            gate: Arc::new(Mutex::new(())),
        }
    }

    pub fn all(&self) -> Result<Vec<Account>, StoreError> {
        Ok(get_record(self.store.as_ref(), ACCOUNTS_KEY)?.unwrap_or_default())
    }

    /// Inserts or replaces the account with the same username.
    pub fn upsert(&self, account: Account) -> Result<(), StoreError> {
        let _gate = self.gate.lock().unwrap_or_else(|e| e.into_inner());

        let mut accounts = self.all()?;
        match accounts.iter_mut().find(|a| a.username == account.username) {
            Some(existing) => *existing = account,
            None => accounts.push(account),
        }
        put_record(self.store.as_ref(), ACCOUNTS_KEY, &accounts)?;
        Ok(())
    }

    pub fn find(&self, username: &str) -> Result<Option<Account>, StoreError> {
        Ok(self.all()?.into_iter().find(|a| a.username == username))
    }

    /// The admin fan-out list: every approved admin account.
    pub fn approved_admins(&self) -> Result<Vec<Account>, StoreError> {
        Ok(self
            .all()?
            .into_iter()
            .filter(|a| a.role == Role::Admin && a.approved)
            .collect())
    }
}
