//! # scribe-crypto
//!
//! Cryptographic primitives for the document pipeline.
//!
//! ## Modules
//!
//! - [`content_hash`]: SHA-256 content fingerprint (dedup key, integrity check)
//! - [`aead`]: ChaCha20-Poly1305 seal/open with a detached key/IV/tag triple
//! - [`link`]: BLAKE3 chaining hash that orders split anchor units

pub mod aead;
pub mod content_hash;
pub mod link;

/// Error types for cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Authentication tag did not verify, or the key/IV/tag triple is not the
    /// one the blob was sealed with.
    #[error("ciphertext was tampered with or the key material is wrong")]
    TamperedOrWrongKey,

    /// The cipher could not be set up or refused to seal.
    #[error("encryption failed: {0}")]
    Encryption(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
