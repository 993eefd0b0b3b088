use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Hex SHA-256 of a raw token. Only digests reach the ledgers.
pub fn hash_token(raw: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(raw.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Raw reset token: 32 random bytes in hex followed by the user id.
pub fn generate_reset_token(user_id: Uuid) -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    let hex_part: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
    format!("{}{}", hex_part, user_id)
}
