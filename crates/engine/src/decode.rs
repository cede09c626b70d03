//! Length-prefixed value decoding.
//!
//! A value slot is `value_len (u32 LE) | value (utf-8)`. Short values are read
//! into a stack array; longer ones borrow a buffer from a [`BufferPool`] and
//! hand it back afterwards. Callers see the same `String` either way.

use byteorder::{LittleEndian, ReadBytesExt};
use parking_lot::Mutex;
use std::io::{Read, Seek, SeekFrom};
use std::ops::{Deref, DerefMut};

use crate::error::{EngineError, Result};

/// Values up to this many bytes are decoded without touching the heap
/// until the final `String`.
pub const STACK_DECODE_LIMIT: usize = 256;

/// Buffers that grew past this are dropped rather than pooled.
const MAX_POOLED_CAPACITY: usize = 1 << 20;

/// Reusable scratch buffers for decoding long values.
#[derive(Debug)]
pub struct BufferPool {
    buffers: Mutex<Vec<Vec<u8>>>,
    max_retained: usize,
}

impl BufferPool {
    pub fn new(max_retained: usize) -> Self {
        Self {
            buffers: Mutex::new(Vec::with_capacity(max_retained)),
            max_retained,
        }
    }

    /// Hands out a zeroed buffer of exactly `len` bytes.
    pub fn rent(&self, len: usize) -> PooledBuffer<'_> {
        let mut buf = self.buffers.lock().pop().unwrap_or_default();
        buf.clear();
        buf.resize(len, 0);
        PooledBuffer { buf, pool: self }
    }

    /// Buffers currently waiting for reuse.
    pub fn available(&self) -> usize {
        self.buffers.lock().len()
    }

    fn give_back(&self, buf: Vec<u8>) {
        if buf.capacity() > MAX_POOLED_CAPACITY {
            return;
        }
        let mut buffers = self.buffers.lock();
        if buffers.len() < self.max_retained {
            buffers.push(buf);
        }
    }
}

/// A rented buffer; returns itself to the pool on drop.
pub struct PooledBuffer<'a> {
    buf: Vec<u8>,
    pool: &'a BufferPool,
}

impl Deref for PooledBuffer<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.buf
    }
}

impl DerefMut for PooledBuffer<'_> {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.buf
    }
}

impl Drop for PooledBuffer<'_> {
    fn drop(&mut self) {
        self.pool.give_back(std::mem::take(&mut self.buf));
    }
}

/// Seeks to `offset`, reads the length prefix, and decodes the value.
///
/// `region_len` is the length of the whole decompressed region; a value
/// whose declared length runs past it is rejected instead of read.
pub fn decode_value<R: Read + Seek>(
    r: &mut R,
    offset: u64,
    region_len: u64,
    pool: &BufferPool,
) -> Result<String> {
    r.seek(SeekFrom::Start(offset))?;
    let len = r.read_u32::<LittleEndian>()? as usize;

    let end = offset + 4 + len as u64;
    if end > region_len {
        return Err(EngineError::Corrupt(format!(
            "value at offset {offset} declares {len} bytes, region ends at {region_len}"
        )));
    }

    if len <= STACK_DECODE_LIMIT {
        let mut stack = [0u8; STACK_DECODE_LIMIT];
        let bytes = &mut stack[..len];
        r.read_exact(bytes)?;
        to_string(bytes, offset)
    } else {
        let mut heap = pool.rent(len);
        r.read_exact(&mut heap)?;
        to_string(&heap, offset)
    }
}

fn to_string(bytes: &[u8], offset: u64) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| EngineError::InvalidUtf8 { offset })
}
