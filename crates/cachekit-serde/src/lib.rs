//! Binary framing and storage primitives for the pack file format, shared
//! by `cachekit-pack` and `cachekit-pack-strategy`. Nothing in this crate
//! knows what a pack entry *means*; it only knows how to frame sections,
//! mmap the data section for zero-copy reads, and measure serialized size.

pub mod blob;
pub mod framing;
pub mod measure;

pub use blob::{open_mmap, LazyBlob};
pub use framing::{read_pack_file, write_pack_file, CodecError, ParsedPackFile, PackFileBytes};
pub use measure::MeasuringWriter;
