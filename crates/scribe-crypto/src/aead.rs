//! ChaCha20-Poly1305 document sealing (RFC 8439).
//!
//! Every call to [`seal`] draws a fresh 256-bit key and 96-bit nonce from the
//! OS RNG, so no (key, nonce) pair is ever reused across documents. The tag is
//! detached from the ciphertext and returned with the key and nonce as a hex
//! [`EncryptionMaterial`]; the caller decides where each part is kept.

use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    ChaCha20Poly1305, Key, Nonce, Tag,
};
use rand::rngs::OsRng;
use rand::RngCore;
use scribe_types::document::EncryptionMaterial;
use zeroize::Zeroizing;

use crate::{CryptoError, Result};

/// Key size (256 bits = 32 bytes).
pub const KEY_SIZE: usize = 32;

/// Nonce size (96 bits = 12 bytes).
pub const NONCE_SIZE: usize = 12;

/// Authentication tag size (128 bits = 16 bytes).
pub const TAG_SIZE: usize = 16;

/// Associated data bound into every document tag.
pub const DOCUMENT_AAD: &[u8] = b"scribe-document-v1";

/// Output of [`seal`].
#[derive(Debug)]
pub struct Sealed {
    /// Ciphertext, same length as the plaintext (tag is detached).
    pub ciphertext: Vec<u8>,
    pub material: EncryptionMaterial,
}

/// Encrypt `plaintext` under a fresh random key and nonce.
pub fn seal(plaintext: &[u8]) -> Result<Sealed> {
    let mut key = Zeroizing::new([0u8; KEY_SIZE]);
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut key[..]);
    OsRng.fill_bytes(&mut nonce);

    let (ciphertext, tag) = seal_with(&key, &nonce, plaintext)?;

    Ok(Sealed {
        ciphertext,
        material: EncryptionMaterial {
            key: hex::encode(&key[..]),
            iv: hex::encode(nonce),
            auth_tag: hex::encode(tag),
        },
    })
}

/// Decrypt a blob produced by [`seal`].
///
/// Returns [`CryptoError::TamperedOrWrongKey`] if the tag does not verify or the
/// material is malformed. No plaintext is returned on failure.
pub fn open(ciphertext: &[u8], material: &EncryptionMaterial) -> Result<Vec<u8>> {
    let key: Zeroizing<[u8; KEY_SIZE]> = Zeroizing::new(decode_fixed(&material.key)?);
    let nonce: [u8; NONCE_SIZE] = decode_fixed(&material.iv)?;
    let tag: [u8; TAG_SIZE] = decode_fixed(&material.auth_tag)?;

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key[..]));
    let mut buffer = ciphertext.to_vec();
    cipher
        .decrypt_in_place_detached(
            Nonce::from_slice(&nonce),
            DOCUMENT_AAD,
            &mut buffer,
            Tag::from_slice(&tag),
        )
        .map_err(|_| CryptoError::TamperedOrWrongKey)?;
    Ok(buffer)
}

fn seal_with(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
) -> Result<(Vec<u8>, [u8; TAG_SIZE])> {
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));
    let mut buffer = plaintext.to_vec();
    let tag = cipher
        .encrypt_in_place_detached(Nonce::from_slice(nonce), DOCUMENT_AAD, &mut buffer)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut tag_bytes = [0u8; TAG_SIZE];
    tag_bytes.copy_from_slice(tag.as_slice());
    Ok((buffer, tag_bytes))
}

fn decode_fixed<const N: usize>(hex_str: &str) -> Result<[u8; N]> {
    let mut out = [0u8; N];
    hex::decode_to_slice(hex_str, &mut out).map_err(|_| CryptoError::TamperedOrWrongKey)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_seal_open_roundtrip() {
        let sealed = seal(b"hello-doc-").expect("seal");
        assert_ne!(sealed.ciphertext, b"hello-doc-");
        assert_eq!(sealed.ciphertext.len(), 10);

        let opened = open(&sealed.ciphertext, &sealed.material).expect("open");
        assert_eq!(opened, b"hello-doc-");
    }

    #[test]
    fn test_material_lengths() {
        let sealed = seal(b"x").expect("seal");
        assert_eq!(sealed.material.key.len(), KEY_SIZE * 2);
        assert_eq!(sealed.material.iv.len(), NONCE_SIZE * 2);
        assert_eq!(sealed.material.auth_tag.len(), TAG_SIZE * 2);
    }

    #[test]
    fn test_fresh_key_and_nonce_per_call() {
        let a = seal(b"same plaintext").expect("seal");
        let b = seal(b"same plaintext").expect("seal");
        assert_ne!(a.material.key, b.material.key);
        assert_ne!(a.material.iv, b.material.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_fixed_key_matches_direct_seal() {
        let key = hex!("000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f");
        let nonce = hex!("0a0b0c0d0e0f101112131415");
        let (ciphertext, tag) = seal_with(&key, &nonce, b"fixed").expect("seal");

        let material = EncryptionMaterial {
            key: hex::encode(key),
            iv: hex::encode(nonce),
            auth_tag: hex::encode(tag),
        };
        assert_eq!(open(&ciphertext, &material).expect("open"), b"fixed");
    }

    #[test]
    fn test_wrong_key_fails() {
        let sealed = seal(b"secret").expect("seal");
        let other = seal(b"secret").expect("seal");
        let mut material = sealed.material.clone();
        material.key = other.material.key.clone();

        assert!(matches!(
            open(&sealed.ciphertext, &material),
            Err(CryptoError::TamperedOrWrongKey)
        ));
    }

    #[test]
    fn test_wrong_iv_fails() {
        let sealed = seal(b"secret").expect("seal");
        let mut material = sealed.material.clone();
        material.iv = "00".repeat(NONCE_SIZE);

        assert!(matches!(
            open(&sealed.ciphertext, &material),
            Err(CryptoError::TamperedOrWrongKey)
        ));
    }

    #[test]
    fn test_wrong_tag_fails() {
        let sealed = seal(b"secret").expect("seal");
        let mut material = sealed.material.clone();
        material.auth_tag = "ff".repeat(TAG_SIZE);

        assert!(matches!(
            open(&sealed.ciphertext, &material),
            Err(CryptoError::TamperedOrWrongKey)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let sealed = seal(b"secret").expect("seal");
        let mut ciphertext = sealed.ciphertext.clone();
        if let Some(byte) = ciphertext.first_mut() {
            *byte ^= 0x01;
        }
        assert!(matches!(
            open(&ciphertext, &sealed.material),
            Err(CryptoError::TamperedOrWrongKey)
        ));
    }

    #[test]
    fn test_malformed_material_fails() {
        let sealed = seal(b"secret").expect("seal");
        let mut material = sealed.material.clone();
        material.key = "not hex".to_string();
        assert!(matches!(
            open(&sealed.ciphertext, &material),
            Err(CryptoError::TamperedOrWrongKey)
        ));

        let mut material = sealed.material.clone();
        material.iv.truncate(4);
        assert!(matches!(
            open(&sealed.ciphertext, &material),
            Err(CryptoError::TamperedOrWrongKey)
        ));
    }

    #[test]
    fn test_empty_plaintext() {
        let sealed = seal(b"").expect("seal");
        assert!(sealed.ciphertext.is_empty());
        assert!(open(&sealed.ciphertext, &sealed.material)
            .expect("open")
            .is_empty());
    }
}
