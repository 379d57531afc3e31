//! Path hashing.
//!
//! Output paths embed a short path-derived digest so that two resources
//! with the same basename never collide in the output tree.

/// Width of the short digest embedded in output paths.
pub const SHORT_DIGEST_LEN: usize = 8;

/// Compute a short, fixed-width digest of a string.
///
/// Used for output path disambiguation; eight hex characters keep paths
/// readable while making accidental collisions vanishingly unlikely.
#[must_use]
pub fn short_hash(input: &str) -> String {
    let mut digest = blake3::hash(input.as_bytes()).to_hex().to_string();
    digest.truncate(SHORT_DIGEST_LEN);
    digest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_hash_is_fixed_width() {
        assert_eq!(short_hash("/project/src/pages/index.mini").len(), 8);
        assert_eq!(short_hash("").len(), 8);
    }

    #[test]
    fn test_short_hash_is_deterministic() {
        assert_eq!(short_hash("/a/b/c"), short_hash("/a/b/c"));
        assert_ne!(short_hash("/a/b/c"), short_hash("/a/b/d"));
    }
}
