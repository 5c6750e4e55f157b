//! The tagged variant every stored entry's bytes live behind: either held
//! inline in memory, or addressed lazily into a memory-mapped pack file.

use cachekit_serde::LazyBlob;

#[derive(Clone)]
pub enum ContentRef {
    Inline(Vec<u8>),
    Lazy(LazyBlob),
}

impl ContentRef {
    pub fn len(&self) -> usize {
        match self {
            ContentRef::Inline(bytes) => bytes.len(),
            ContentRef::Lazy(blob) => blob.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, ContentRef::Lazy(_))
    }

    /// Materialize the bytes, copying out of the mmap for a lazy entry.
    pub fn to_vec(&self) -> Vec<u8> {
        match self {
            ContentRef::Inline(bytes) => bytes.clone(),
            ContentRef::Lazy(blob) => blob.bytes().to_vec(),
        }
    }
}
