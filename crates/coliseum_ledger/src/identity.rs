//! # Identity Directory
//!
//! The ledger never owns accounts. It asks a directory whether a user exists
//! and which public key to wrap message keys for.
//!
//! The game ships a file-backed directory (`accounts.json`); tests and
//! embedded tools use the in-memory one.

use std::collections::BTreeMap;
use std::path::PathBuf;

use coliseum_shared::{DataDir, JsonFile};
use serde::{Deserialize, Serialize};

use crate::error::LedgerResult;

/// One registered user.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Access level, e.g. `"user"` or `"admin"`.
    pub level: String,
    /// Hex X25519 public key.
    pub public_key: String,
}

impl Account {
    /// Creates an account record.
    #[must_use]
    pub fn new(level: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            level: level.into(),
            public_key: public_key.into(),
        }
    }
}

/// Read access to registered accounts.
pub trait IdentityDirectory {
    /// Looks up `user_id`.
    fn account(&self, user_id: &str) -> Option<Account>;

    /// True if `user_id` is registered.
    fn contains(&self, user_id: &str) -> bool {
        self.account(user_id).is_some()
    }
}

impl<T: IdentityDirectory + ?Sized> IdentityDirectory for Box<T> {
    fn account(&self, user_id: &str) -> Option<Account> {
        (**self).account(user_id)
    }
}

/// Directory backed by `accounts.json`.
///
/// Every call re-reads the file; writes replace it atomically.
#[derive(Clone, Debug)]
pub struct FileIdentityDirectory {
    file: JsonFile<BTreeMap<String, Account>>,
}

impl FileIdentityDirectory {
    /// Opens the directory at `path`.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            file: JsonFile::new(path),
        }
    }

    /// Opens `accounts.json` inside `data`.
    #[must_use]
    pub fn in_data_dir(data: &DataDir) -> Self {
        Self::open(data.accounts())
    }

    /// Every account, keyed by user id.
    #[must_use]
    pub fn load_accounts(&self) -> BTreeMap<String, Account> {
        self.file.load()
    }

    /// Inserts or overwrites `user_id`.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn register_account(&self, user_id: &str, level: &str, public_key: &str) -> LedgerResult<()> {
        self.file.update(|accounts| {
            accounts.insert(user_id.to_owned(), Account::new(level, public_key));
        })?;
        tracing::debug!(user_id, level, "account registered");
        Ok(())
    }

    /// Removes `user_id`. Absent users are a no-op and leave the file untouched.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub fn delete_account(&self, user_id: &str) -> LedgerResult<()> {
        let mut accounts = self.file.load();
        if accounts.remove(user_id).is_some() {
            self.file.save(&accounts)?;
        }
        Ok(())
    }

    /// Looks up `user_id`.
    #[must_use]
    pub fn get_account(&self, user_id: &str) -> Option<Account> {
        self.file.load().remove(user_id)
    }
}

impl IdentityDirectory for FileIdentityDirectory {
    fn account(&self, user_id: &str) -> Option<Account> {
        self.get_account(user_id)
    }
}

/// Directory held in memory.
#[derive(Clone, Debug, Default)]
pub struct MemoryIdentityDirectory {
    accounts: BTreeMap<String, Account>,
}

impl MemoryIdentityDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an account.
    pub fn insert(&mut self, user_id: impl Into<String>, account: Account) {
        self.accounts.insert(user_id.into(), account);
    }

    /// Builder form of [`Self::insert`].
    #[must_use]
    pub fn with(mut self, user_id: impl Into<String>, account: Account) -> Self {
        self.insert(user_id, account);
        self
    }
}

impl IdentityDirectory for MemoryIdentityDirectory {
    fn account(&self, user_id: &str) -> Option<Account> {
        self.accounts.get(user_id).cloned()
    }
}
