//! The `Hasher` external collaborator contract: an incremental hasher that
//! is stable across processes, plus the one concrete implementation this
//! crate ships.
//!
//! File hashes and directory (context) hashes both go through the same
//! incremental hasher — a context hash is just the file-hash machinery fed
//! the sorted child names followed by the child hashes, in that order.

/// An incremental content hasher. Implementations must be stable across
/// processes and platforms: the same byte sequence fed through `update`
/// must always produce the same `finish_hex()` output.
pub trait ContentHasher: Default {
    /// Feed more bytes into the running digest.
    fn update(&mut self, bytes: &[u8]) -> &mut Self;

    /// Finalize and return the digest as a lowercase hex string.
    fn finish_hex(self) -> String;
}

/// The default hasher: BLAKE3, matching the hashing primitive already used
/// by the reference workspace's content-addressed caches.
#[derive(Default)]
pub struct Blake3Hasher(blake3::Hasher);

impl ContentHasher for Blake3Hasher {
    fn update(&mut self, bytes: &[u8]) -> &mut Self {
        self.0.update(bytes);
        self
    }

    fn finish_hex(self) -> String {
        self.0.finalize().to_hex().to_string()
    }
}

/// Hash a single buffer in one call.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Blake3Hasher::default();
    hasher.update(bytes);
    hasher.finish_hex()
}

/// Hash a directory's contents: the digest is formed over the sorted child
/// names, then over the child hashes, in that order (not interleaved
/// name/hash pairs).
#[must_use]
pub fn hash_context<'a>(sorted_names: impl Iterator<Item = &'a str>, child_hashes: &[String]) -> String {
    let mut hasher = Blake3Hasher::default();
    for name in sorted_names {
        hasher.update(name.as_bytes());
    }
    for child in child_hashes {
        hasher.update(child.as_bytes());
    }
    hasher.finish_hex()
}
