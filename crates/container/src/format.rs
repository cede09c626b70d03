//! Container binary format constants and marker detection.
//!
//! The first byte of a stored container names the compression applied to
//! everything after it:
//!
//! ```text
//! [marker: u8][payload ...]
//! ```
//!
//! Containers written before markers existed start directly with the
//! header; those are recognised by *not* matching any marker.

use crate::compression::{self, Compression};
use crate::error::Result;
use crate::index::OffsetIndex;

/// Marker for an uncompressed payload.
pub const MARKER_NONE: u8 = 0x00;

/// Marker for an LZ4 block payload (size-prepended).
pub const MARKER_LZ4: u8 = 0xC0;

/// Marker for a zstd frame payload.
pub const MARKER_ZSTD: u8 = 0xC1;

/// Width of the `header_size` field at the start of the decompressed region.
pub const HEADER_SIZE_BYTES: u64 = 4;

/// Width of every length prefix (`key_len`, `value_len`).
pub const LEN_PREFIX_BYTES: u64 = 4;

/// Fixed part of one header entry: `key_len` (u32) + `value_offset` (u64).
pub const HEADER_ENTRY_FIXED_BYTES: u64 = LEN_PREFIX_BYTES + 8;

/// What the leading byte of a stored container says about its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatMarker {
    /// A recognised marker byte; the payload starts at offset 1.
    Tagged(Compression),
    /// No marker; the whole buffer is an uncompressed container.
    Legacy,
}

impl FormatMarker {
    /// Classifies a stored buffer by its first byte.
    ///
    /// An empty buffer is reported as [`FormatMarker::Legacy`]; callers are
    /// expected to reject empty input before getting here.
    pub fn detect(bytes: &[u8]) -> Self {
        match bytes.first().copied().and_then(Compression::from_marker) {
            Some(c) => FormatMarker::Tagged(c),
            None => FormatMarker::Legacy,
        }
    }

    /// The compression that applies to the payload.
    pub fn compression(self) -> Compression {
        match self {
            FormatMarker::Tagged(c) => c,
            FormatMarker::Legacy => Compression::None,
        }
    }

    /// Number of leading bytes that are not part of the payload.
    pub fn prefix_len(self) -> usize {
        match self {
            FormatMarker::Tagged(_) => 1,
            FormatMarker::Legacy => 0,
        }
    }
}

/// Summary of a stored container, for tooling and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub marker: FormatMarker,
    /// Size of the buffer as stored (marker included).
    pub stored_bytes: usize,
    /// Size of the decompressed region.
    pub payload_bytes: usize,
    pub header_size: u32,
    pub entries: usize,
}

/// Decompresses and parses `bytes` far enough to describe it.
///
/// Value bytes are never decoded; only the header is walked.
pub fn inspect(bytes: &[u8]) -> Result<ContainerInfo> {
    let marker = FormatMarker::detect(bytes);
    let payload = compression::decompress(bytes)?;
    let index = OffsetIndex::parse(&payload, None)?;
    Ok(ContainerInfo {
        marker,
        stored_bytes: bytes.len(),
        payload_bytes: payload.len(),
        header_size: index.header_size(),
        entries: index.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_recognised_markers() {
        assert_eq!(
            FormatMarker::detect(&[MARKER_NONE, 1, 2]),
            FormatMarker::Tagged(Compression::None)
        );
        assert_eq!(
            FormatMarker::detect(&[MARKER_LZ4]),
            FormatMarker::Tagged(Compression::Lz4)
        );
        assert_eq!(
            FormatMarker::detect(&[MARKER_ZSTD]),
            FormatMarker::Tagged(Compression::Zstd)
        );
    }

    #[test]
    fn unknown_first_byte_is_legacy() {
        let m = FormatMarker::detect(&[0x10, 0, 0, 0]);
        assert_eq!(m, FormatMarker::Legacy);
        assert_eq!(m.prefix_len(), 0);
        assert_eq!(m.compression(), Compression::None);
    }

    #[test]
    fn tagged_prefix_is_one_byte() {
        assert_eq!(FormatMarker::Tagged(Compression::Lz4).prefix_len(), 1);
    }
}
