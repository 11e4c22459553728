//! SQLite-backed account store.
//!
//! Accounts are created by registration and never mutated or deleted.
//! Username uniqueness is enforced by the UNIQUE constraint, not by a
//! read-then-write check, so concurrent registrations cannot race.

use crate::auth::hasher;
use crate::db::{epoch_secs, Db};
use crate::error::{VaultError, VaultResult};
use std::sync::Arc;

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum username length accepted at registration.
pub const MAX_USERNAME_LEN: usize = 64;

/// A registered account.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    pub password_salt: String,
    pub vault_salt: String,
    pub created_at: i64,
}

/// Durable mapping of username to credentials.
pub struct AccountStore {
    db: Arc<Db>,
}

impl AccountStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Register a new account. Returns the account id.
    pub fn create(&self, username: &str, password: &str) -> VaultResult<String> {
        let username = username.trim();
        if username.is_empty() {
            return Err(VaultError::InvalidInput("Username cannot be empty".into()));
        }
        if username.len() > MAX_USERNAME_LEN {
            return Err(VaultError::InvalidInput(format!(
                "Username too long (max {MAX_USERNAME_LEN} characters)"
            )));
        }
        if password.len() < MIN_PASSWORD_LEN {
            return Err(VaultError::InvalidInput(format!(
                "Password must be at least {MIN_PASSWORD_LEN} characters"
            )));
        }

        let account_id = uuid::Uuid::new_v4().to_string();
        let (password_hash, password_salt) = hasher::derive(password, None);
        let vault_salt = hasher::generate_vault_salt();
        let now = epoch_secs();

        let conn = self.db.conn.lock();
        let result = conn.execute(
            "INSERT INTO accounts (id, username, password_hash, password_salt, vault_salt, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![account_id, username, password_hash, password_salt, vault_salt, now],
        );

        match result {
            Ok(_) => Ok(account_id),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(VaultError::Conflict(format!(
                    "Username '{username}' is already taken"
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Look up an account by username. Case-sensitive exact match.
    pub fn find_by_username(&self, username: &str) -> VaultResult<Option<Account>> {
        let conn = self.db.conn.lock();
        let row = conn.query_row(
            "SELECT id, username, password_hash, password_salt, vault_salt, created_at
             FROM accounts WHERE username = ?1",
            rusqlite::params![username.trim()],
            |row| {
                Ok(Account {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    password_salt: row.get(3)?,
                    vault_salt: row.get(4)?,
                    created_at: row.get(5)?,
                })
            },
        );

        match row {
            Ok(account) => Ok(Some(account)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Count registered accounts.
    pub fn count(&self) -> VaultResult<u64> {
        let conn = self.db.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_store() -> (TempDir, AccountStore) {
        let tmp = TempDir::new().unwrap();
        let db = Db::open(&tmp.path().join("vault.db")).unwrap();
        db.migrate().unwrap();
        (tmp, AccountStore::new(db))
    }

    #[test]
    fn create_and_find() {
        let (_tmp, store) = test_store();

        let id = store.create("alice", "longpassword1").unwrap();
        assert!(!id.is_empty());

        let account = store.find_by_username("alice").unwrap().unwrap();
        assert_eq!(account.id, id);
        assert_eq!(account.username, "alice");
        assert!(!account.vault_salt.is_empty());
        assert!(hasher::verify(
            "longpassword1",
            &account.password_salt,
            &account.password_hash
        ));
    }

    #[test]
    fn create_succeeds_exactly_once_per_username() {
        let (_tmp, store) = test_store();

        store.create("alice", "longpassword1").unwrap();
        let err = store.create("alice", "other12345").unwrap_err();
        assert!(matches!(err, VaultError::Conflict(_)));
    }

    #[test]
    fn usernames_are_case_sensitive() {
        let (_tmp, store) = test_store();

        store.create("Alice", "longpassword1").unwrap();
        // Different case is a different account, not a conflict.
        store.create("alice", "longpassword1").unwrap();
        assert!(store.find_by_username("ALICE").unwrap().is_none());
    }

    #[test]
    fn short_password_is_invalid_input() {
        let (_tmp, store) = test_store();

        let err = store.create("alice", "short").unwrap_err();
        assert!(matches!(err, VaultError::InvalidInput(_)));
    }

    #[test]
    fn empty_username_is_invalid_input() {
        let (_tmp, store) = test_store();

        let err = store.create("   ", "longpassword1").unwrap_err();
        assert!(matches!(err, VaultError::InvalidInput(_)));
    }

    #[test]
    fn find_unknown_username_is_none() {
        let (_tmp, store) = test_store();
        assert!(store.find_by_username("ghost").unwrap().is_none());
    }

    #[test]
    fn vault_salts_are_per_account() {
        let (_tmp, store) = test_store();

        store.create("alice", "longpassword1").unwrap();
        store.create("bob", "longpassword2").unwrap();

        let a = store.find_by_username("alice").unwrap().unwrap();
        let b = store.find_by_username("bob").unwrap().unwrap();
        assert_ne!(a.vault_salt, b.vault_salt);
    }

    #[test]
    fn count_tracks_registrations() {
        let (_tmp, store) = test_store();

        assert_eq!(store.count().unwrap(), 0);
        store.create("alice", "longpassword1").unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }
}
