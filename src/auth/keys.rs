use rand::RngCore;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

/// Prefix on every issued API key, so keys are recognizable in logs and
/// support tickets without revealing anything.
pub const KEY_PREFIX: &str = "tg_";

const KEY_BYTES: usize = 32;

/// Generate a fresh API key.
/// Returns (plaintext_key, key_hash); only the hash is ever stored.
pub fn generate_api_key() -> (String, String) {
    let mut random_bytes = [0u8; KEY_BYTES];
    rand::thread_rng().fill_bytes(&mut random_bytes);

    let plaintext = format!("{}{}", KEY_PREFIX, hex::encode(random_bytes));
    let hash = hash_api_key(&plaintext);
    (plaintext, hash)
}

/// SHA-256 hash of a presented key, hex-encoded. Identities are looked up
/// by this value.
pub fn hash_api_key(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

/// Compare two key hashes in constant time.
pub fn hashes_match(presented: &str, stored: &str) -> bool {
    let presented = presented.as_bytes();
    let stored = stored.as_bytes();
    // Hex SHA-256 digests are fixed-length; a mismatch here means one side
    // is not a digest at all.
    if presented.len() != stored.len() {
        return false;
    }
    presented.ct_eq(stored).into()
}
