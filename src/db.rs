//! SQLite bootstrap: connection setup, startup migration, health probe.
//!
//! Tables:
//! - `accounts`: username, password_hash, password_salt, vault_salt, created_at
//! - `records`: owner_id, name, login, encrypted_secret, iv, url, notes,
//!   created_at, updated_at
//!
//! Migration runs once at startup, before the gateway accepts traffic, and
//! is safe to re-run. A migration failure must abort startup.

use crate::auth::hasher;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Shared handle to the vault database.
pub struct Db {
    pub(crate) conn: Mutex<rusqlite::Connection>,
}

impl Db {
    /// Open (or create) the database at the given path.
    pub fn open(db_path: &Path) -> Result<Arc<Self>> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }
        let conn = rusqlite::Connection::open(db_path)
            .with_context(|| format!("failed to open database {}", db_path.display()))?;

        // WAL mode for concurrent reads + crash safety
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA foreign_keys = ON;",
        )?;

        Ok(Arc::new(Self {
            conn: Mutex::new(conn),
        }))
    }

    /// Idempotent startup migration. Creates the schema if missing and
    /// backfills `vault_salt` for accounts created before the column
    /// existed. Never called from a request handler.
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS accounts (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                password_salt TEXT NOT NULL,
                vault_salt TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id TEXT NOT NULL REFERENCES accounts(id),
                name TEXT NOT NULL,
                login TEXT,
                encrypted_secret TEXT NOT NULL,
                iv TEXT NOT NULL,
                url TEXT,
                notes TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_records_owner ON records(owner_id);
            CREATE INDEX IF NOT EXISTS idx_records_owner_updated
                ON records(owner_id, updated_at);",
        )
        .context("failed to create vault schema")?;

        // Pre-vault_salt databases lack the column entirely.
        if !column_exists(&conn, "accounts", "vault_salt")? {
            conn.execute_batch(
                "ALTER TABLE accounts ADD COLUMN vault_salt TEXT NOT NULL DEFAULT '';",
            )
            .context("failed to add vault_salt column")?;
        }

        backfill_vault_salts(&conn).context("failed to backfill vault salts")?;

        Ok(())
    }

    /// Liveness probe: the store is reachable and both tables exist.
    pub fn health(&self) -> Result<()> {
        let conn = self.conn.lock();
        for table in ["accounts", "records"] {
            let found: Option<String> = conn
                .query_row(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    rusqlite::params![table],
                    |row| row.get(0),
                )
                .map(Some)
                .or_else(|e| match e {
                    rusqlite::Error::QueryReturnedNoRows => Ok(None),
                    other => Err(other),
                })?;
            if found.is_none() {
                anyhow::bail!("table '{table}' not found");
            }
        }
        Ok(())
    }
}

fn column_exists(
    conn: &rusqlite::Connection,
    table: &str,
    column: &str,
) -> Result<bool, rusqlite::Error> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut found = false;
    let names = stmt.query_map([], |row| row.get::<_, String>(1))?;
    for name in names {
        if name? == column {
            found = true;
        }
    }
    Ok(found)
}

/// Give every account with an empty vault_salt a fresh random one.
/// Last-writer-wins under concurrent startups: the salt is opaque to the
/// server, so a racing overwrite of a never-returned value is harmless.
fn backfill_vault_salts(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    let ids: Vec<String> = {
        let mut stmt = conn.prepare("SELECT id FROM accounts WHERE vault_salt = ''")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    for id in ids {
        let salt = hasher::generate_vault_salt();
        conn.execute(
            "UPDATE accounts SET vault_salt = ?1 WHERE id = ?2 AND vault_salt = ''",
            rusqlite::params![salt, id],
        )?;
    }
    Ok(())
}

/// Current Unix epoch in seconds.
pub fn epoch_secs() -> i64 {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    i64::try_from(secs).unwrap_or(i64::MAX)
}
