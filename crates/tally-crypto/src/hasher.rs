use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::canonical::canonical_json;

/// Lowercase hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// SHA-256 over the canonical JSON rendering of `value`.
pub fn hash_canonical(value: &Value) -> String {
    sha256_hex(canonical_json(value).as_bytes())
}
