use byteorder::{LittleEndian, WriteBytesExt};
use std::ffi::OsString;
use std::fs::{rename, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::compression::{self, Compression};
use crate::entries::EntryMap;
use crate::error::{ContainerError, Result};
use crate::format::{HEADER_ENTRY_FIXED_BYTES, HEADER_SIZE_BYTES, LEN_PREFIX_BYTES};

/// Offsets computed by the first pass, before a single byte is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// Length of the header block, including its own 4-byte size field.
    pub header_size: u32,
    /// Value offset for each entry, in [`EntryMap`] iteration order.
    pub offsets: Vec<u64>,
    /// Length of the whole decompressed region.
    pub total_len: u64,
}

impl Layout {
    /// First pass: sizes the header, then walks the entries again to assign
    /// each value slot its offset, starting right after the header.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::EntryTooLarge`] if a key, a value, or the
    /// header as a whole does not fit its `u32` length field.
    pub fn plan(entries: &EntryMap) -> Result<Self> {
        let mut header_size = HEADER_SIZE_BYTES;
        for (key, _) in entries.iter() {
            check_len(key.len())?;
            header_size += HEADER_ENTRY_FIXED_BYTES + key.len() as u64;
        }
        let header_size =
            u32::try_from(header_size).map_err(|_| ContainerError::EntryTooLarge(header_size as usize))?;

        let mut offsets = Vec::with_capacity(entries.len());
        let mut cursor = header_size as u64;
        for (_, value) in entries.iter() {
            check_len(value.len())?;
            offsets.push(cursor);
            cursor += LEN_PREFIX_BYTES + value.len() as u64;
        }

        Ok(Self {
            header_size,
            offsets,
            total_len: cursor,
        })
    }
}

fn check_len(len: usize) -> Result<()> {
    if u32::try_from(len).is_err() {
        return Err(ContainerError::EntryTooLarge(len));
    }
    Ok(())
}

/// Builds container bytes from an [`EntryMap`].
///
/// Stateless, like the rest of the write path: every call plans, serializes
/// and compresses from scratch.
pub struct ContainerWriter {}

impl ContainerWriter {
    /// Serializes `entries` into a decompressed region (no marker).
    ///
    /// # Layout
    ///
    /// ```text
    /// [HEADER] header_size(u32) | repeated: key_len(u32) | key | value_offset(u64)
    /// [VALUES] repeated: value_len(u32) | value
    /// ```
    ///
    /// Header entries and value slots are both emitted in `entries` order,
    /// the same order [`Layout::plan`] assigned offsets in.
    pub fn serialize(entries: &EntryMap) -> Result<Vec<u8>> {
        let layout = Layout::plan(entries)?;
        let mut buf = Vec::with_capacity(layout.total_len as usize);

        buf.write_u32::<LittleEndian>(layout.header_size)?;
        for ((key, _), offset) in entries.iter().zip(&layout.offsets) {
            buf.write_u32::<LittleEndian>(key.len() as u32)?;
            buf.extend_from_slice(key.as_bytes());
            buf.write_u64::<LittleEndian>(*offset)?;
        }
        debug_assert_eq!(buf.len() as u64, layout.header_size as u64);

        for (_, value) in entries.iter() {
            buf.write_u32::<LittleEndian>(value.len() as u32)?;
            buf.extend_from_slice(value.as_bytes());
        }
        debug_assert_eq!(buf.len() as u64, layout.total_len);

        Ok(buf)
    }

    /// Serializes and compresses `entries`, returning the stored form
    /// (marker byte + payload).
    pub fn encode(entries: &EntryMap, compression: Compression) -> Result<Vec<u8>> {
        let raw = Self::serialize(entries)?;
        compression::compress(&raw, compression)
    }

    /// Encodes `entries` and writes the result to `path`.
    ///
    /// # Crash Safety
    ///
    /// Writes to `<path>.tmp`, calls `sync_all()`, then atomically renames.
    /// A crash mid-write leaves only the temp file behind.
    pub fn write_to_path(path: &Path, entries: &EntryMap, compression: Compression) -> Result<()> {
        let bytes = Self::encode(entries, compression)?;

        let tmp_path = tmp_path_for(path);
        let mut file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;
        file.write_all(&bytes)?;
        file.flush()?;
        file.sync_all()?;

        rename(&tmp_path, path)?;

        debug!(
            path = %path.display(),
            entries = entries.len(),
            bytes = bytes.len(),
            ?compression,
            "container written"
        );
        Ok(())
    }
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name: OsString = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}
