//! On-disk framing for the pack file format: a small fixed header
//! followed by three length-prefixed sections (metadata, data, content
//! index). Keeping the data section as one contiguous byte range lets
//! `cachekit-pack` mmap it once and hand out zero-copy [`crate::LazyBlob`]
//! views into it instead of copying every lazily-stored entry into memory.
//!
//! ```text
//! [magic: 4 bytes]["CKP1"]
//! [format version: u32 LE]
//! [metadata length: u64 LE][metadata bytes: bincode]
//! [data length: u64 LE]    [data bytes: opaque]
//! [index length: u64 LE]   [index bytes: bincode]
//! ```

use std::io::{self, Read, Write};

use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

pub const MAGIC: &[u8; 4] = b"CKP1";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("not a cachekit pack file (bad magic bytes)")]
    BadMagic,

    #[error("pack file format version {found} is not supported (expected {expected})")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("pack file is truncated: expected {expected} more bytes, found {found}")]
    Truncated { expected: usize, found: usize },

    #[error("failed to encode section: {0}")]
    Encode(#[from] bincode::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Assembled pack file bytes, ready to be written out (atomically, by
/// `cachekit-pack-strategy`) as a single unit.
pub struct PackFileBytes {
    pub bytes: Vec<u8>,
    /// Byte offset of the data section within `bytes`, so the caller can
    /// mmap the whole file and construct [`crate::LazyBlob`]s against it
    /// without re-parsing the header.
    pub data_offset: usize,
    pub data_len: usize,
}

/// Serialize `metadata` and `index` with bincode and assemble them around
/// the already-encoded `data` section into a single framed buffer.
pub fn write_pack_file<M, I>(metadata: &M, data: &[u8], index: &I) -> Result<PackFileBytes, CodecError>
where
    M: Serialize,
    I: Serialize,
{
    let metadata_bytes = bincode::serialize(metadata)?;
    let index_bytes = bincode::serialize(index)?;

    let mut bytes = Vec::with_capacity(
        4 + 4 + 8 + metadata_bytes.len() + 8 + data.len() + 8 + index_bytes.len(),
    );
    bytes.write_all(MAGIC)?;
    bytes.write_all(&FORMAT_VERSION.to_le_bytes())?;

    bytes.write_all(&(metadata_bytes.len() as u64).to_le_bytes())?;
    bytes.write_all(&metadata_bytes)?;

    bytes.write_all(&(data.len() as u64).to_le_bytes())?;
    let data_offset = bytes.len();
    bytes.write_all(data)?;

    bytes.write_all(&(index_bytes.len() as u64).to_le_bytes())?;
    bytes.write_all(&index_bytes)?;

    Ok(PackFileBytes { bytes, data_offset, data_len: data.len() })
}

/// A parsed pack file: decoded metadata and index, plus the byte range of
/// the data section within the original buffer (the caller owns that
/// buffer, typically an mmap).
pub struct ParsedPackFile<M, I> {
    pub metadata: M,
    pub data_offset: usize,
    pub data_len: usize,
    pub index: I,
}

pub fn read_pack_file<M, I>(bytes: &[u8]) -> Result<ParsedPackFile<M, I>, CodecError>
where
    M: DeserializeOwned,
    I: DeserializeOwned,
{
    let mut cursor = bytes;

    let mut magic = [0u8; 4];
    read_exact(&mut cursor, &mut magic)?;
    if &magic != MAGIC {
        return Err(CodecError::BadMagic);
    }

    let version = u32::from_le_bytes(read_array(&mut cursor)?);
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion { found: version, expected: FORMAT_VERSION });
    }

    let metadata_len = u64::from_le_bytes(read_array(&mut cursor)?) as usize;
    let metadata_bytes = read_n(&mut cursor, metadata_len)?;
    let metadata = bincode::deserialize(metadata_bytes)?;

    let data_len = u64::from_le_bytes(read_array(&mut cursor)?) as usize;
    let data_offset = bytes.len() - cursor.len();
    let _data = read_n(&mut cursor, data_len)?;

    let index_len = u64::from_le_bytes(read_array(&mut cursor)?) as usize;
    let index_bytes = read_n(&mut cursor, index_len)?;
    let index = bincode::deserialize(index_bytes)?;

    Ok(ParsedPackFile { metadata, data_offset, data_len, index })
}

fn read_exact(cursor: &mut &[u8], buf: &mut [u8]) -> Result<(), CodecError> {
    if cursor.len() < buf.len() {
        return Err(CodecError::Truncated { expected: buf.len(), found: cursor.len() });
    }
    cursor.read_exact(buf)?;
    Ok(())
}

fn read_array<const N: usize>(cursor: &mut &[u8]) -> Result<[u8; N], CodecError> {
    let mut buf = [0u8; N];
    read_exact(cursor, &mut buf)?;
    Ok(buf)
}

fn read_n<'a>(cursor: &mut &'a [u8], n: usize) -> Result<&'a [u8], CodecError> {
    if cursor.len() < n {
        return Err(CodecError::Truncated { expected: n, found: cursor.len() });
    }
    let (head, tail) = cursor.split_at(n);
    *cursor = tail;
    Ok(head)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Meta {
        created_at: u64,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Index {
        keys: Vec<String>,
    }

    #[test]
    fn round_trips_metadata_data_and_index() {
        let meta = Meta { created_at: 1700000000 };
        let index = Index { keys: vec!["a".into(), "b".into()] };
        let data = b"inline-blob-bytes-go-here";

        let written = write_pack_file(&meta, data, &index).unwrap();
        let parsed: ParsedPackFile<Meta, Index> = read_pack_file(&written.bytes).unwrap();

        assert_eq!(parsed.metadata, meta);
        assert_eq!(parsed.index, index);
        assert_eq!(parsed.data_offset, written.data_offset);
        assert_eq!(parsed.data_len, data.len());
        assert_eq!(&written.bytes[parsed.data_offset..parsed.data_offset + parsed.data_len], data);
    }

    #[test]
    fn rejects_bad_magic() {
        let err = read_pack_file::<Meta, Index>(b"not-a-pack-file-at-all").unwrap_err();
        assert!(matches!(err, CodecError::BadMagic));
    }

    #[test]
    fn rejects_truncated_buffers() {
        let meta = Meta { created_at: 1 };
        let index = Index { keys: vec![] };
        let written = write_pack_file(&meta, b"x", &index).unwrap();
        let truncated = &written.bytes[..written.bytes.len() - 2];
        let err = read_pack_file::<Meta, Index>(truncated).unwrap_err();
        assert!(matches!(err, CodecError::Truncated { .. }));
    }
}
