//! ContentHasher trait for computing prompt input hashes.
//!
//! Defined in menagerie-core so the prompt compiler can hash content
//! without coupling to a specific hashing algorithm. The
//! `Sha256ContentHasher` adapter lives in menagerie-infra.

/// Abstraction over content hashing.
///
/// Used by the prompt compiler to fingerprint the inputs of a compiled
/// prompt so staleness can be detected by comparison on read.
pub trait ContentHasher: Send + Sync {
    /// Compute a hex-encoded hash of the given content.
    fn compute_hash(&self, content: &str) -> String;
}
