//! Content fingerprinting.
//!
//! Identity is derived from file bytes, never from the path — two copies of
//! the same document at different paths share one fingerprint.

use std::fmt::Write;

use sha2::{Digest, Sha256};

/// Returns the lowercase hex SHA-256 digest of the given bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        // Writing to a String cannot fail.
        let _ = write!(out, "{:02x}", byte);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_deterministic() {
        assert_eq!(content_hash(b"hello"), content_hash(b"hello"));
    }

    #[test]
    fn test_hash_differs_for_different_content() {
        assert_ne!(content_hash(b"hello"), content_hash(b"hello!"));
    }

    #[test]
    fn test_hash_is_64_hex_chars() {
        let h = content_hash(b"some document bytes");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_known_vector() {
        // SHA-256 of the empty input.
        assert_eq!(
            content_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
