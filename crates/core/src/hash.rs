//! Content hashing for cache keys and provenance.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of `content`.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Incremental hasher over length-prefixed parts, so that
/// `["ab", "c"]` and `["a", "bc"]` never collide.
pub struct PartsHasher {
    inner: Sha256,
}

impl PartsHasher {
    pub fn new(domain: &str) -> Self {
        let mut h = Self {
            inner: Sha256::new(),
        };
        h.part(domain.as_bytes());
        h
    }

    pub fn part(&mut self, bytes: &[u8]) -> &mut Self {
        self.inner.update((bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
        self
    }

    pub fn str(&mut self, s: &str) -> &mut Self {
        self.part(s.as_bytes())
    }

    pub fn finish(self) -> String {
        hex::encode(self.inner.finalize())
    }
}
