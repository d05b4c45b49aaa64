//! Deterministic 64-bit hashing for content fingerprints and simhash tokens.
//!
//! `DefaultHasher` is randomized per-process (HashDoS mitigation) and therefore
//! unsuitable for anything that needs a stable value across runs or machines.

const FNV_OFFSET_BASIS: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;

pub fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET_BASIS;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Stable content hash used for dedup lookups and cache keys.
pub fn content_hash(s: &str) -> String {
    format!("{:016x}", fnv1a(s.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_across_calls() {
        assert_eq!(fnv1a(b"hello"), fnv1a(b"hello"));
    }

    #[test]
    fn differs_for_different_input() {
        assert_ne!(fnv1a(b"hello"), fnv1a(b"world"));
    }

    #[test]
    fn content_hash_is_fixed_width_hex() {
        let h = content_hash("авария на водоканале");
        assert_eq!(h.len(), 16);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
