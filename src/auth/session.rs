//! In-process session table and the login/logout flow.
//!
//! Sessions are ephemeral: a restart logs everyone out. Tokens are 32
//! random bytes (hex), revealed to the client once and stored here only as
//! SHA-256 hashes. One account per token; an account may hold any number of
//! concurrent tokens.

use crate::auth::hasher;
use crate::auth::store::AccountStore;
use crate::db::epoch_secs;
use crate::error::{VaultError, VaultResult};
use parking_lot::Mutex;
use rand::Rng as _;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Token byte length before hex encoding (32 bytes = 64 hex chars).
const TOKEN_BYTES: usize = 32;

/// A successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Plaintext bearer token, revealed only once.
    pub token: String,
    pub account_id: String,
    /// Opaque per-account salt the client needs for local key derivation.
    pub vault_salt: String,
}

#[derive(Debug, Clone)]
struct SessionEntry {
    account_id: String,
    expires_at: i64,
}

/// Server-held association from token hash to account id.
pub struct SessionTable {
    entries: Mutex<HashMap<String, SessionEntry>>,
    ttl_secs: u64,
}

impl SessionTable {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl_secs,
        }
    }

    /// Mint a fresh session bound to the account id. Returns the plaintext
    /// token.
    pub fn mint(&self, account_id: &str) -> String {
        let token = generate_token();
        let entry = SessionEntry {
            account_id: account_id.to_string(),
            expires_at: epoch_secs().saturating_add(i64::try_from(self.ttl_secs).unwrap_or(i64::MAX)),
        };
        self.entries.lock().insert(hash_token(&token), entry);
        token
    }

    /// Resolve a token to its account id. Unknown and expired tokens are
    /// indistinguishable; expired entries are dropped on sight.
    pub fn resolve(&self, token: &str) -> Option<String> {
        let key = hash_token(token);
        let mut entries = self.entries.lock();
        match entries.get(&key) {
            Some(entry) if entry.expires_at > epoch_secs() => Some(entry.account_id.clone()),
            Some(_) => {
                entries.remove(&key);
                None
            }
            None => None,
        }
    }

    /// Invalidate a token. Idempotent: revoking an unknown or already
    /// expired token is not an error.
    pub fn revoke(&self, token: &str) {
        self.entries.lock().remove(&hash_token(token));
    }

    /// Drop every expired entry. Called opportunistically by the gateway.
    pub fn purge_expired(&self) -> usize {
        let now = epoch_secs();
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, entry| entry.expires_at > now);
        before - entries.len()
    }

    /// Number of live (non-purged) entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Verifies login attempts against the account store and manages the
/// resulting sessions.
pub struct Authenticator {
    sessions: SessionTable,
}

impl Authenticator {
    pub fn new(session_ttl_secs: u64) -> Self {
        Self {
            sessions: SessionTable::new(session_ttl_secs),
        }
    }

    /// Verify credentials and mint a session. Unknown username and wrong
    /// password produce the same error.
    pub fn login(
        &self,
        accounts: &AccountStore,
        username: &str,
        password: &str,
    ) -> VaultResult<LoginOutcome> {
        let Some(account) = accounts.find_by_username(username)? else {
            // Burn a derivation so the miss costs as much as a mismatch.
            hasher::dummy_derive(password);
            return Err(VaultError::InvalidCredentials);
        };

        if !hasher::verify(password, &account.password_salt, &account.password_hash) {
            return Err(VaultError::InvalidCredentials);
        }

        let token = self.sessions.mint(&account.id);
        tracing::info!(account_id = %account.id, "session established");
        Ok(LoginOutcome {
            token,
            account_id: account.id,
            vault_salt: account.vault_salt,
        })
    }

    /// Clear the session association unconditionally.
    pub fn logout(&self, token: &str) {
        self.sessions.revoke(token);
    }

    /// Resolve a bearer token to the owning account id.
    pub fn resolve(&self, token: &str) -> Option<String> {
        self.sessions.resolve(token)
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }
}

/// Generate a random session token (hex-encoded).
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Hash a session token (SHA-256, single pass — tokens are already
/// high-entropy).
fn hash_token(token: &str) -> String {
    let mut h = Sha256::new();
    h.update(token.as_bytes());
    hex::encode(h.finalize())
}
