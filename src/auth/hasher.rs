//! Password hashing: PBKDF2-HMAC-SHA256, salted, slow by design.
//!
//! Hash and salt are 32 bytes each, base64-encoded for storage. The
//! iteration count is the work factor; verification re-derives and compares
//! in constant time.

use base64::Engine;
use rand::Rng as _;

/// PBKDF2 iteration count. Sized against current offline brute-force
/// hardware; never lower this below 100_000.
pub const PBKDF2_ITERATIONS: u32 = 250_000;

/// Salt byte length before base64 encoding.
pub const SALT_BYTES: usize = 32;

/// Derived hash byte length.
pub const HASH_BYTES: usize = 32;

/// Derive a password hash. When `salt` is `None` a fresh random salt is
/// generated. Returns `(hash_b64, salt_b64)`.
pub fn derive(password: &str, salt: Option<&[u8]>) -> (String, String) {
    let salt_bytes: Vec<u8> = match salt {
        Some(s) => s.to_vec(),
        None => {
            let mut bytes = [0u8; SALT_BYTES];
            rand::rng().fill_bytes(&mut bytes);
            bytes.to_vec()
        }
    };

    let mut hash = [0u8; HASH_BYTES];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(
        password.as_bytes(),
        &salt_bytes,
        PBKDF2_ITERATIONS,
        &mut hash,
    );

    let engine = base64::engine::general_purpose::STANDARD;
    (engine.encode(hash), engine.encode(salt_bytes))
}

/// Re-derive with the stored salt and compare against the stored hash.
/// Returns `false` on any decoding failure rather than erroring, so a
/// corrupt row behaves like a wrong password.
pub fn verify(password: &str, salt_b64: &str, stored_hash_b64: &str) -> bool {
    let engine = base64::engine::general_purpose::STANDARD;
    let Ok(salt) = engine.decode(salt_b64) else {
        return false;
    };
    let (attempt_b64, _) = derive(password, Some(&salt));
    constant_time_eq(attempt_b64.as_bytes(), stored_hash_b64.as_bytes())
}

/// Generate a fresh per-account vault salt (32 random bytes, base64).
/// Handed to the client for local key derivation; the server stores and
/// returns it but never uses it cryptographically.
pub fn generate_vault_salt() -> String {
    let mut bytes = [0u8; SALT_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// Burn one derivation against a fixed salt. Used to level response timing
/// when the username does not exist.
pub fn dummy_derive(password: &str) {
    let _ = derive(password, Some(&[0u8; SALT_BYTES]));
}

/// Constant-time byte comparison to prevent timing attacks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
