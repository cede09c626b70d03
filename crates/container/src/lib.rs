//! # Container: immutable key/value blob
//!
//! Read-only storage format for large static text tables (localization
//! strings, game data). A container is authored once from a tabular source,
//! written to disk, and then loaded whole into memory for point lookups.
//! Containers are **write-once, read-many**: there is no append and no
//! in-place update.
//!
//! ## Byte layout
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ FORMAT MARKER (1 byte)                        │
//! │   0x00 none | 0xC0 lz4 | 0xC1 zstd            │
//! │   any other value: legacy, no marker present  │
//! ├───────────────────────────────────────────────┤  ← decompressed region
//! │ HEADER                                        │
//! │                                               │
//! │ header_size (u32, counts itself)              │
//! │ key_len (u32) | key | value_offset (u64)      │
//! │ ... repeated for each entry ...               │
//! ├───────────────────────────────────────────────┤  ← header_size
//! │ VALUE REGION                                  │
//! │                                               │
//! │ value_len (u32) | value                       │
//! │ ... repeated, same order as the header ...    │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! All integers are little-endian. Offsets are measured from the start of
//! the decompressed region, so every `value_offset >= header_size`.
//!
//! ## Flow
//!
//! - encode: [`EntryMap`] → [`ContainerWriter`] (two passes) →
//!   [`compression::compress`] → bytes on disk.
//! - load: bytes → [`compression::decompress`] → [`OffsetIndex::parse`].

pub mod compression;
mod entries;
mod error;
mod format;
mod index;
mod intern;
mod source;
mod writer;

pub use compression::{Compression, Compressor};
pub use entries::EntryMap;
pub use error::{ContainerError, Result};
pub use format::{
    inspect, ContainerInfo, FormatMarker, HEADER_ENTRY_FIXED_BYTES, HEADER_SIZE_BYTES,
    LEN_PREFIX_BYTES, MARKER_LZ4, MARKER_NONE, MARKER_ZSTD,
};
pub use index::OffsetIndex;
pub use intern::KeyInterner;
pub use source::{encode, parse_table, read_table};
pub use writer::{ContainerWriter, Layout};
