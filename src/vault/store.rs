//! SQLite-backed record store. Every operation is owner-scoped.
//!
//! The owner id is supplied by the gateway's authorization gate, never by
//! the request body. Reads and mutations filter on both id and owner in one
//! predicate, so a record belonging to someone else is indistinguishable
//! from a record that does not exist.

use crate::db::{epoch_secs, Db};
use crate::error::{VaultError, VaultResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// A stored password entry. The secret payload and its initialization
/// vector are opaque strings encrypted client-side; the server never sees
/// plaintext.
#[derive(Debug, Clone, Serialize)]
pub struct Record {
    pub id: i64,
    #[serde(skip_serializing)]
    pub owner_id: String,
    pub name: String,
    pub login: Option<String>,
    pub encrypted_secret: String,
    pub iv: String,
    pub url: Option<String>,
    pub notes: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// The full mutable field set, used for both create and update (updates are
/// full-field replaces).
#[derive(Debug, Clone, Deserialize)]
pub struct RecordDraft {
    pub name: String,
    #[serde(default)]
    pub login: Option<String>,
    pub encrypted_secret: String,
    pub iv: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl RecordDraft {
    fn validate(&self) -> VaultResult<()> {
        for (field, value) in [
            ("name", &self.name),
            ("encrypted_secret", &self.encrypted_secret),
            ("iv", &self.iv),
        ] {
            if value.trim().is_empty() {
                return Err(VaultError::InvalidInput(format!("Field '{field}' is required")));
            }
        }
        Ok(())
    }
}

/// Durable, owner-scoped collection of password entries.
pub struct RecordStore {
    db: Arc<Db>,
}

impl RecordStore {
    pub fn new(db: Arc<Db>) -> Self {
        Self { db }
    }

    /// Create a record for the owner. Returns the new record id.
    pub fn create(&self, owner_id: &str, draft: &RecordDraft) -> VaultResult<i64> {
        draft.validate()?;
        let now = epoch_secs();

        let conn = self.db.conn.lock();
        conn.execute(
            "INSERT INTO records (owner_id, name, login, encrypted_secret, iv, url, notes, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            rusqlite::params![
                owner_id,
                draft.name,
                draft.login,
                draft.encrypted_secret,
                draft.iv,
                draft.url,
                draft.notes,
                now,
                now,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// List every record for the owner, most recently touched first. Ties
    /// fall back to insertion order.
    pub fn list(&self, owner_id: &str) -> VaultResult<Vec<Record>> {
        let conn = self.db.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, name, login, encrypted_secret, iv, url, notes, created_at, updated_at
             FROM records WHERE owner_id = ?1
             ORDER BY updated_at DESC, id ASC",
        )?;
        let records = stmt
            .query_map(rusqlite::params![owner_id], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Fetch one record by id, scoped to the owner.
    pub fn get(&self, owner_id: &str, record_id: i64) -> VaultResult<Record> {
        let conn = self.db.conn.lock();
        let row = conn.query_row(
            "SELECT id, owner_id, name, login, encrypted_secret, iv, url, notes, created_at, updated_at
             FROM records WHERE id = ?1 AND owner_id = ?2",
            rusqlite::params![record_id, owner_id],
            row_to_record,
        );

        match row {
            Ok(record) => Ok(record),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(VaultError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace all mutable fields and refresh `updated_at`. A zero-row
    /// match (wrong id or wrong owner) is the only failure signal.
    pub fn update(&self, owner_id: &str, record_id: i64, draft: &RecordDraft) -> VaultResult<()> {
        draft.validate()?;
        let now = epoch_secs();

        let conn = self.db.conn.lock();
        let changed = conn.execute(
            "UPDATE records
             SET name = ?1, login = ?2, encrypted_secret = ?3, iv = ?4, url = ?5, notes = ?6,
                 updated_at = ?7
             WHERE id = ?8 AND owner_id = ?9",
            rusqlite::params![
                draft.name,
                draft.login,
                draft.encrypted_secret,
                draft.iv,
                draft.url,
                draft.notes,
                now,
                record_id,
                owner_id,
            ],
        )?;

        if changed == 0 {
            return Err(VaultError::NotFound);
        }
        Ok(())
    }

    /// Delete a record. Idempotent in effect: a second delete reports
    /// `NotFound`, never a crash.
    pub fn delete(&self, owner_id: &str, record_id: i64) -> VaultResult<()> {
        let conn = self.db.conn.lock();
        let deleted = conn.execute(
            "DELETE FROM records WHERE id = ?1 AND owner_id = ?2",
            rusqlite::params![record_id, owner_id],
        )?;

        if deleted == 0 {
            return Err(VaultError::NotFound);
        }
        Ok(())
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> Result<Record, rusqlite::Error> {
    Ok(Record {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        login: row.get(3)?,
        encrypted_secret: row.get(4)?,
        iv: row.get(5)?,
        url: row.get(6)?,
        notes: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AccountStore;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        records: RecordStore,
        alice: String,
        bob: String,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let db = Db::open(&tmp.path().join("vault.db")).unwrap();
        db.migrate().unwrap();

        let accounts = AccountStore::new(Arc::clone(&db));
        let alice = accounts.create("alice", "longpassword1").unwrap();
        let bob = accounts.create("bob", "longpassword2").unwrap();

        Fixture {
            _tmp: tmp,
            records: RecordStore::new(db),
            alice,
            bob,
        }
    }

    fn draft(name: &str) -> RecordDraft {
        RecordDraft {
            name: name.into(),
            login: Some("user@example.com".into()),
            encrypted_secret: "abc".into(),
            iv: "xyz".into(),
            url: None,
            notes: None,
        }
    }

    #[test]
    fn create_and_get_round_trip() {
        let fx = fixture();

        let id = fx.records.create(&fx.alice, &draft("email")).unwrap();
        let record = fx.records.get(&fx.alice, id).unwrap();

        assert_eq!(record.id, id);
        assert_eq!(record.name, "email");
        assert_eq!(record.encrypted_secret, "abc");
        assert_eq!(record.iv, "xyz");
        assert_eq!(record.created_at, record.updated_at);
    }

    #[test]
    fn missing_required_fields_are_invalid_input() {
        let fx = fixture();

        let mut d = draft("email");
        d.encrypted_secret = "".into();
        assert!(matches!(
            fx.records.create(&fx.alice, &d).unwrap_err(),
            VaultError::InvalidInput(_)
        ));

        let mut d = draft("email");
        d.iv = "  ".into();
        assert!(matches!(
            fx.records.create(&fx.alice, &d).unwrap_err(),
            VaultError::InvalidInput(_)
        ));

        let d = draft("");
        assert!(matches!(
            fx.records.create(&fx.alice, &d).unwrap_err(),
            VaultError::InvalidInput(_)
        ));
    }

    #[test]
    fn cross_owner_access_is_not_found() {
        let fx = fixture();

        let id = fx.records.create(&fx.alice, &draft("email")).unwrap();

        assert!(matches!(
            fx.records.get(&fx.bob, id).unwrap_err(),
            VaultError::NotFound
        ));
        assert!(matches!(
            fx.records.update(&fx.bob, id, &draft("hijack")).unwrap_err(),
            VaultError::NotFound
        ));
        assert!(matches!(
            fx.records.delete(&fx.bob, id).unwrap_err(),
            VaultError::NotFound
        ));

        // Alice still sees her record untouched.
        let record = fx.records.get(&fx.alice, id).unwrap();
        assert_eq!(record.name, "email");
    }

    #[test]
    fn list_is_ordered_most_recently_updated_first() {
        let fx = fixture();

        let first = fx.records.create(&fx.alice, &draft("first")).unwrap();
        let second = fx.records.create(&fx.alice, &draft("second")).unwrap();

        // Equal updated_at: insertion order breaks the tie.
        let names: Vec<i64> = fx
            .records
            .list(&fx.alice)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(names, vec![first, second]);

        // Backdate both so the ordering is driven by distinct timestamps:
        // first at 5, second at 1.
        {
            let conn = fx.records.db.conn.lock();
            conn.execute("UPDATE records SET updated_at = 5 WHERE id = ?1", [first])
                .unwrap();
            conn.execute("UPDATE records SET updated_at = 1 WHERE id = ?1", [second])
                .unwrap();
        }

        let ids: Vec<i64> = fx
            .records
            .list(&fx.alice)
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![first, second]);

        // Updating the older record through the public path restamps it and
        // moves it to the front.
        fx.records.update(&fx.alice, second, &draft("second-v2")).unwrap();
        let top = &fx.records.list(&fx.alice).unwrap()[0];
        assert_eq!(top.id, second);
        assert_eq!(top.name, "second-v2");
    }

    #[test]
    fn list_only_returns_own_records() {
        let fx = fixture();

        fx.records.create(&fx.alice, &draft("a1")).unwrap();
        fx.records.create(&fx.bob, &draft("b1")).unwrap();

        let alice_list = fx.records.list(&fx.alice).unwrap();
        assert_eq!(alice_list.len(), 1);
        assert_eq!(alice_list[0].name, "a1");
    }

    #[test]
    fn update_replaces_all_fields_and_refreshes_updated_at() {
        let fx = fixture();

        let id = fx.records.create(&fx.alice, &draft("email")).unwrap();
        // Backdate so the refresh is observable even within one second.
        {
            let conn = fx.records.db.conn.lock();
            conn.execute("UPDATE records SET updated_at = 1, created_at = 1 WHERE id = ?1", [id])
                .unwrap();
        }

        let replacement = RecordDraft {
            name: "email-v2".into(),
            login: None,
            encrypted_secret: "def".into(),
            iv: "uvw".into(),
            url: Some("https://mail.example.com".into()),
            notes: Some("rotated".into()),
        };
        fx.records.update(&fx.alice, id, &replacement).unwrap();

        let record = fx.records.get(&fx.alice, id).unwrap();
        assert_eq!(record.name, "email-v2");
        assert_eq!(record.login, None);
        assert_eq!(record.encrypted_secret, "def");
        assert_eq!(record.url.as_deref(), Some("https://mail.example.com"));
        assert_eq!(record.created_at, 1);
        assert!(record.updated_at > 1);
    }

    #[test]
    fn delete_then_get_is_not_found_and_delete_is_idempotent() {
        let fx = fixture();

        let id = fx.records.create(&fx.alice, &draft("email")).unwrap();
        fx.records.delete(&fx.alice, id).unwrap();

        assert!(matches!(
            fx.records.get(&fx.alice, id).unwrap_err(),
            VaultError::NotFound
        ));
        assert!(matches!(
            fx.records.delete(&fx.alice, id).unwrap_err(),
            VaultError::NotFound
        ));
    }

    #[test]
    fn record_json_omits_owner_id() {
        let fx = fixture();
        let id = fx.records.create(&fx.alice, &draft("email")).unwrap();
        let record = fx.records.get(&fx.alice, id).unwrap();

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("owner_id").is_none());
        assert_eq!(json["name"], "email");
    }
}
