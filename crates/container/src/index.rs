use byteorder::{LittleEndian, ReadBytesExt};
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::Arc;

use crate::error::{ContainerError, Result};
use crate::format::{HEADER_ENTRY_FIXED_BYTES, HEADER_SIZE_BYTES, LEN_PREFIX_BYTES};
use crate::intern::KeyInterner;

/// In-memory key → value-offset map, built by one forward scan of the header.
///
/// The index is rebuilt wholesale on every load and never updated after
/// that, so it needs no synchronization. Keys are kept in header order as
/// well, for stable [`keys`](OffsetIndex::keys) iteration.
#[derive(Debug, Clone, Default)]
pub struct OffsetIndex {
    header_size: u32,
    offsets: HashMap<Arc<str>, u64>,
    order: Vec<Arc<str>>,
}

impl OffsetIndex {
    /// Parses the header at the start of a decompressed region.
    ///
    /// Reads `header_size`, then `(key_len, key, value_offset)` triples until
    /// the cursor reaches `header_size`. No value bytes are touched beyond
    /// checking that each offset leaves room for a length prefix.
    ///
    /// When `interner` is given, every key is routed through it.
    ///
    /// # Validation
    ///
    /// - `header_size` must be at least 4 and fit inside `payload`.
    /// - Every header entry must end inside the header block.
    /// - Keys must be valid UTF-8.
    /// - Every `value_offset` must be `>= header_size` and leave 4 bytes for
    ///   the value length prefix.
    ///
    /// # Errors
    ///
    /// Returns [`ContainerError::Corrupt`] on the first violation.
    pub fn parse(payload: &[u8], interner: Option<&KeyInterner>) -> Result<Self> {
        let total = payload.len() as u64;
        if total < HEADER_SIZE_BYTES {
            return Err(ContainerError::corrupt("payload shorter than header size field"));
        }

        let mut cur = Cursor::new(payload);
        let header_size = cur.read_u32::<LittleEndian>()?;
        let header_end = header_size as u64;
        if header_end < HEADER_SIZE_BYTES || header_end > total {
            return Err(ContainerError::corrupt(format!(
                "header_size {header_size} outside payload of {total} bytes"
            )));
        }

        let mut offsets = HashMap::new();
        let mut order = Vec::new();

        while cur.position() < header_end {
            let entry_start = cur.position();
            if entry_start + HEADER_ENTRY_FIXED_BYTES > header_end {
                return Err(ContainerError::corrupt(format!(
                    "truncated header entry at byte {entry_start}"
                )));
            }
            let key_len = cur.read_u32::<LittleEndian>()? as u64;
            let key_start = cur.position();
            if key_start + key_len + 8 > header_end {
                return Err(ContainerError::corrupt(format!(
                    "key at byte {key_start} runs past header end {header_end}"
                )));
            }
            let key_bytes = &payload[key_start as usize..(key_start + key_len) as usize];
            let key = std::str::from_utf8(key_bytes).map_err(|_| {
                ContainerError::corrupt(format!("key at byte {key_start} is not valid utf-8"))
            })?;
            cur.set_position(key_start + key_len);

            let value_offset = cur.read_u64::<LittleEndian>()?;
            if value_offset < header_end || value_offset.saturating_add(LEN_PREFIX_BYTES) > total {
                return Err(ContainerError::corrupt(format!(
                    "value offset {value_offset} for key {key:?} outside value region"
                )));
            }

            let key: Arc<str> = match interner {
                Some(i) => i.intern(key),
                None => Arc::from(key),
            };
            // The encoder deduplicates; if a foreign writer did not, keep the first.
            if !offsets.contains_key(&key) {
                offsets.insert(Arc::clone(&key), value_offset);
                order.push(key);
            }
        }

        Ok(Self {
            header_size,
            offsets,
            order,
        })
    }

    /// Byte offset of the value slot for `key`.
    pub fn get(&self, key: &str) -> Option<u64> {
        self.offsets.get(key).copied()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.offsets.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn header_size(&self) -> u32 {
        self.header_size
    }

    /// Keys in header order.
    pub fn keys(&self) -> impl Iterator<Item = &Arc<str>> {
        self.order.iter()
    }

    /// `(key, offset)` pairs in header order.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<str>, u64)> {
        self.order.iter().map(move |k| (k, self.offsets[k]))
    }

    /// The `i`-th entry in header order.
    pub fn entry(&self, i: usize) -> Option<(&Arc<str>, u64)> {
        let key = self.order.get(i)?;
        Some((key, self.offsets[key]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ContainerWriter, EntryMap, Layout};
    use byteorder::WriteBytesExt;

    fn sample() -> EntryMap {
        [("greeting", "hello"), ("farewell", "bye"), ("empty", "")]
            .into_iter()
            .collect()
    }

    // -------------------- Happy path --------------------

    #[test]
    fn parse_matches_planned_offsets() -> Result<()> {
        let entries = sample();
        let layout = Layout::plan(&entries)?;
        let raw = ContainerWriter::serialize(&entries)?;
        let index = OffsetIndex::parse(&raw, None)?;

        assert_eq!(index.len(), 3);
        assert_eq!(index.header_size(), layout.header_size);
        for ((key, _), offset) in entries.iter().zip(&layout.offsets) {
            assert_eq!(index.get(key), Some(*offset));
        }
        assert_eq!(index.get("missing"), None);
        Ok(())
    }

    #[test]
    fn keys_follow_header_order() -> Result<()> {
        let raw = ContainerWriter::serialize(&sample())?;
        let index = OffsetIndex::parse(&raw, None)?;
        let keys: Vec<&str> = index.keys().map(|k| &**k).collect();
        assert_eq!(keys, vec!["greeting", "farewell", "empty"]);
        Ok(())
    }

    #[test]
    fn empty_container_has_no_keys() -> Result<()> {
        let raw = ContainerWriter::serialize(&EntryMap::new())?;
        let index = OffsetIndex::parse(&raw, None)?;
        assert!(index.is_empty());
        assert_eq!(index.header_size(), 4);
        Ok(())
    }

    #[test]
    fn interner_is_shared_across_indexes() -> Result<()> {
        let interner = KeyInterner::new();
        let en: EntryMap = [("title", "Hello")].into_iter().collect();
        let fr: EntryMap = [("title", "Bonjour")].into_iter().collect();
        let a = OffsetIndex::parse(&ContainerWriter::serialize(&en)?, Some(&interner))?;
        let b = OffsetIndex::parse(&ContainerWriter::serialize(&fr)?, Some(&interner))?;

        let ka = a.keys().next().unwrap();
        let kb = b.keys().next().unwrap();
        assert!(Arc::ptr_eq(ka, kb));
        assert_eq!(interner.len(), 1);
        Ok(())
    }

    // -------------------- Validation --------------------

    #[test]
    fn rejects_short_payload() {
        assert!(matches!(
            OffsetIndex::parse(&[1, 0], None),
            Err(ContainerError::Corrupt(_))
        ));
    }

    #[test]
    fn rejects_header_size_past_end() {
        let raw = 100u32.to_le_bytes();
        assert!(matches!(
            OffsetIndex::parse(&raw, None),
            Err(ContainerError::Corrupt(_))
        ));
    }

    #[test]
    fn rejects_header_size_below_minimum() {
        let raw = [2u8, 0, 0, 0, 0, 0];
        assert!(OffsetIndex::parse(&raw, None).is_err());
    }

    #[test]
    fn rejects_offset_outside_buffer() -> anyhow::Result<()> {
        // One entry whose offset points far past the end.
        let mut raw = Vec::new();
        raw.write_u32::<LittleEndian>(4 + 12 + 1)?;
        raw.write_u32::<LittleEndian>(1)?;
        raw.push(b'k');
        raw.write_u64::<LittleEndian>(10_000)?;
        raw.write_u32::<LittleEndian>(0)?;

        assert!(matches!(
            OffsetIndex::parse(&raw, None),
            Err(ContainerError::Corrupt(_))
        ));
        Ok(())
    }

    #[test]
    fn rejects_offset_inside_header() -> anyhow::Result<()> {
        let mut raw = Vec::new();
        raw.write_u32::<LittleEndian>(4 + 12 + 1)?;
        raw.write_u32::<LittleEndian>(1)?;
        raw.push(b'k');
        raw.write_u64::<LittleEndian>(0)?;
        raw.write_u32::<LittleEndian>(0)?;

        assert!(OffsetIndex::parse(&raw, None).is_err());
        Ok(())
    }

    #[test]
    fn rejects_key_running_past_header() -> anyhow::Result<()> {
        let mut raw = Vec::new();
        raw.write_u32::<LittleEndian>(4 + 12 + 1)?;
        raw.write_u32::<LittleEndian>(50)?; // claims a 50-byte key
        raw.push(b'k');
        raw.write_u64::<LittleEndian>(17)?;
        raw.write_u32::<LittleEndian>(0)?;

        assert!(OffsetIndex::parse(&raw, None).is_err());
        Ok(())
    }

    #[test]
    fn rejects_non_utf8_key() -> anyhow::Result<()> {
        let mut raw = Vec::new();
        raw.write_u32::<LittleEndian>(4 + 12 + 1)?;
        raw.write_u32::<LittleEndian>(1)?;
        raw.push(0xFF);
        raw.write_u64::<LittleEndian>(17)?;
        raw.write_u32::<LittleEndian>(0)?;

        assert!(OffsetIndex::parse(&raw, None).is_err());
        Ok(())
    }
}
