//! Chaining hash for split anchor units.
//!
//! Each unit commits to its predecessor: `link_i = BLAKE3::keyed_hash(K, link_{i-1} || data_i)`
//! with `link_{-1} = [0; 32]` and `K = BLAKE3::derive_key(UNIT_LINK_CONTEXT, "")`.
//! A reader holding the units can verify both order and completeness.

/// Domain-separation context for unit links.
pub const UNIT_LINK_CONTEXT: &str = "scribe v1 stitch-unit-link";

/// Link value preceding the first unit.
pub const GENESIS_LINK: [u8; 32] = [0u8; 32];

/// Compute the link for a unit given its predecessor's link.
pub fn unit_link(prev: &[u8; 32], data: &[u8]) -> [u8; 32] {
    let key = ::blake3::derive_key(UNIT_LINK_CONTEXT, b"");
    let mut hasher = ::blake3::Hasher::new_keyed(&key);
    hasher.update(prev);
    hasher.update(data);
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_deterministic() {
        assert_eq!(unit_link(&GENESIS_LINK, b"a"), unit_link(&GENESIS_LINK, b"a"));
    }

    #[test]
    fn test_link_depends_on_predecessor() {
        let first = unit_link(&GENESIS_LINK, b"a");
        assert_ne!(unit_link(&first, b"b"), unit_link(&GENESIS_LINK, b"b"));
    }

    #[test]
    fn test_link_is_domain_separated() {
        let mut plain = Vec::from(GENESIS_LINK);
        plain.extend_from_slice(b"a");
        assert_ne!(unit_link(&GENESIS_LINK, b"a"), *::blake3::hash(&plain).as_bytes());
    }
}
