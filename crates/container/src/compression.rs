//! Payload compression, tagged by a one-byte format marker.
//!
//! [`compress`] prefixes the marker; [`decompress`] reads it back, falling
//! back to the untagged legacy layout when the first byte is not a marker.
//! Either way the result is the complete decompressed region in a single
//! buffer, ready for [`OffsetIndex::parse`](crate::OffsetIndex::parse).

use tracing::debug;

use crate::error::{ContainerError, Result};
use crate::format::{FormatMarker, MARKER_LZ4, MARKER_NONE, MARKER_ZSTD};

/// Compression selector used when encoding a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    #[default]
    None,
    /// LZ4 block format with the uncompressed size prepended.
    Lz4,
    /// zstd frame at [`ZSTD_LEVEL`].
    Zstd,
}

/// Level used for zstd frames. Decompression does not depend on it.
pub const ZSTD_LEVEL: i32 = 3;

impl Compression {
    /// The marker byte written in front of a payload of this kind.
    pub fn marker(self) -> u8 {
        match self {
            Compression::None => MARKER_NONE,
            Compression::Lz4 => MARKER_LZ4,
            Compression::Zstd => MARKER_ZSTD,
        }
    }

    /// Maps a marker byte back to its compression, `None` if unrecognised.
    pub fn from_marker(byte: u8) -> Option<Self> {
        match byte {
            MARKER_NONE => Some(Compression::None),
            MARKER_LZ4 => Some(Compression::Lz4),
            MARKER_ZSTD => Some(Compression::Zstd),
            _ => None,
        }
    }

    /// The codec implementing this selector.
    pub fn compressor(self) -> &'static dyn Compressor {
        match self {
            Compression::None => &NoCompression,
            Compression::Lz4 => &Lz4Compressor,
            Compression::Zstd => &ZstdCompressor { level: ZSTD_LEVEL },
        }
    }
}

/// A byte-stream codec applied to the whole decompressed region.
pub trait Compressor: Send + Sync {
    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>>;
    fn decompress(&self, packed: &[u8]) -> Result<Vec<u8>>;
}

/// Identity codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCompression;

impl Compressor for NoCompression {
    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        Ok(raw.to_vec())
    }

    fn decompress(&self, packed: &[u8]) -> Result<Vec<u8>> {
        Ok(packed.to_vec())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Lz4Compressor;

impl Compressor for Lz4Compressor {
    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(raw))
    }

    fn decompress(&self, packed: &[u8]) -> Result<Vec<u8>> {
        lz4_flex::decompress_size_prepended(packed)
            .map_err(|e| ContainerError::Decompression(format!("lz4: {e}")))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ZstdCompressor {
    pub level: i32,
}

impl Compressor for ZstdCompressor {
    fn compress(&self, raw: &[u8]) -> Result<Vec<u8>> {
        zstd::encode_all(raw, self.level)
            .map_err(|e| ContainerError::Compression(format!("zstd: {e}")))
    }

    fn decompress(&self, packed: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(packed).map_err(|e| ContainerError::Decompression(format!("zstd: {e}")))
    }
}

/// Compresses `raw` and prefixes the matching format marker.
pub fn compress(raw: &[u8], compression: Compression) -> Result<Vec<u8>> {
    let packed = compression.compressor().compress(raw)?;
    let mut out = Vec::with_capacity(packed.len() + 1);
    out.push(compression.marker());
    out.extend_from_slice(&packed);

    if compression != Compression::None {
        debug!(
            ?compression,
            raw = raw.len(),
            packed = packed.len(),
            ratio = format_args!("{:.1}x", raw.len() as f64 / packed.len().max(1) as f64),
            "payload compressed"
        );
    }
    Ok(out)
}

/// Inspects the leading byte and returns the decompressed region.
///
/// A recognised marker is stripped and its codec applied to the rest. An
/// unrecognised first byte means a legacy container: the buffer is returned
/// whole, nothing stripped.
pub fn decompress(stored: &[u8]) -> Result<Vec<u8>> {
    let marker = FormatMarker::detect(stored);
    let body = &stored[marker.prefix_len()..];
    let payload = marker.compression().compressor().decompress(body)?;
    debug!(
        ?marker,
        stored = stored.len(),
        payload = payload.len(),
        "payload decompressed"
    );
    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<u8> {
        b"hello hello hello hello hello hello world".repeat(20)
    }

    #[test]
    fn marker_roundtrip() {
        for c in [Compression::None, Compression::Lz4, Compression::Zstd] {
            assert_eq!(Compression::from_marker(c.marker()), Some(c));
        }
        assert_eq!(Compression::from_marker(0x42), None);
    }

    #[test]
    fn compress_prefixes_marker() -> Result<()> {
        let raw = sample();
        assert_eq!(compress(&raw, Compression::None)?[0], MARKER_NONE);
        assert_eq!(compress(&raw, Compression::Lz4)?[0], MARKER_LZ4);
        assert_eq!(compress(&raw, Compression::Zstd)?[0], MARKER_ZSTD);
        Ok(())
    }

    #[test]
    fn uncompressed_payload_is_verbatim_after_marker() -> Result<()> {
        let raw = sample();
        let stored = compress(&raw, Compression::None)?;
        assert_eq!(&stored[1..], raw.as_slice());
        Ok(())
    }

    #[test]
    fn compressed_payloads_decompress_to_original() -> Result<()> {
        let raw = sample();
        for c in [Compression::Lz4, Compression::Zstd] {
            let stored = compress(&raw, c)?;
            assert!(stored.len() < raw.len(), "{c:?} should shrink repetitive input");
            assert_eq!(decompress(&stored)?, raw);
        }
        Ok(())
    }

    #[test]
    fn legacy_buffer_is_returned_untouched() -> Result<()> {
        // 0x10 is not a marker, so nothing is stripped.
        let legacy = vec![0x10, 0x00, 0x00, 0x00, 0xAA];
        assert_eq!(decompress(&legacy)?, legacy);
        Ok(())
    }

    #[test]
    fn truncated_lz4_fails() {
        let mut stored = compress(&sample(), Compression::Lz4).unwrap();
        stored.truncate(6);
        assert!(matches!(
            decompress(&stored),
            Err(ContainerError::Decompression(_))
        ));
    }

    #[test]
    fn garbage_zstd_fails() {
        let stored = vec![MARKER_ZSTD, 1, 2, 3, 4, 5];
        assert!(matches!(
            decompress(&stored),
            Err(ContainerError::Decompression(_))
        ));
    }
}
