//! Task ID generation.

use chrono::{DateTime, Utc};
use rand::Rng;
use sha2::{Digest, Sha256};
use std::fmt::Write;

/// Length of the hash portion of an id, in bytes (two hex chars each).
const ID_HASH_BYTES: usize = 5;

/// Generate a unique task ID: `tt-` followed by ten hex chars drawn from
/// SHA-256 over the title, the creation instant, and fresh entropy. The
/// random bytes keep identical titles created in the same nanosecond from
/// colliding.
pub fn generate_id(title: &str, created_at: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(created_at.timestamp_nanos_opt().unwrap_or(0).to_le_bytes());
    hasher.update(rand::rng().random::<[u8; 8]>());
    let hash = hasher.finalize();

    let mut id = String::with_capacity(3 + ID_HASH_BYTES * 2);
    id.push_str("tt-");
    for byte in &hash[..ID_HASH_BYTES] {
        // Writing to a String cannot fail
        let _ = write!(id, "{:02x}", byte);
    }
    id
}
