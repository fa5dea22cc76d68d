//! Content fingerprinting.
//!
//! The digest is taken over the original bytes, before any encryption, so a
//! recipient can check a decrypted download against the recorded hash.

use scribe_types::ContentHash;
use sha2::{Digest, Sha256};

/// SHA-256 of `data`, lowercase hex.
pub fn digest(data: &[u8]) -> ContentHash {
    let out: [u8; 32] = Sha256::digest(data).into();
    ContentHash::from_bytes(&out)
}

/// Whether `data` hashes to `expected`.
pub fn verify(data: &[u8], expected: &ContentHash) -> bool {
    digest(data) == *expected
}
