//! Zero-copy views into a memory-mapped pack file.
//!
//! A [`LazyBlob`] is how `cachekit-pack` hands back entries stored in the
//! pack's data section: it never copies the bytes out of the mapping, it
//! just remembers the `(offset, length)` range and an `Arc` to the shared
//! mapping, so cloning a blob handle is cheap and many entries can share
//! one open file descriptor.

use std::fs::File;
use std::io;
use std::sync::Arc;

use camino::Utf8Path;
use memmap2::Mmap;

/// A read-only offset/length view into a shared memory mapping.
#[derive(Clone)]
pub struct LazyBlob {
    mmap: Arc<Mmap>,
    offset: usize,
    length: usize,
}

impl LazyBlob {
    /// # Safety-adjacent note
    /// `offset + length` must lie within `mmap`'s bounds; callers
    /// construct this only from offsets that `framing::read_pack_file`
    /// already validated against the buffer length.
    pub fn new(mmap: Arc<Mmap>, offset: usize, length: usize) -> Self {
        debug_assert!(offset + length <= mmap.len());
        Self { mmap, offset, length }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap[self.offset..self.offset + self.length]
    }

    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

impl std::fmt::Debug for LazyBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyBlob").field("offset", &self.offset).field("length", &self.length).finish()
    }
}

/// Memory-map `path` for shared, read-only access. The returned `Arc` is
/// cloned once per [`LazyBlob`] drawn from it.
pub fn open_mmap(path: &Utf8Path) -> io::Result<Arc<Mmap>> {
    let file = File::open(path.as_std_path())?;
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(Arc::new(mmap))
}
