//! Chunk
//!
//! A fixed-capacity page of raw bytes with a live length and a last-touch time.

use std::time::Instant;

/// One page of a logical buffer
///
/// The backing array always has `capacity` bytes; only `[0, len)` is content.
/// Every operation refreshes `last_touch`, which drives idle eviction.
#[derive(Debug)]
pub struct Chunk {
    buf: Box<[u8]>,
    len: usize,
    last_touch: Instant,
}

impl Chunk {
    /// Create an empty chunk with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity].into_boxed_slice(),
            len: 0,
            last_touch: Instant::now(),
        }
    }

    /// Wrap a buffer read back from storage; `len` bytes of it are content
    pub fn from_parts(buf: Box<[u8]>, len: usize) -> Self {
        debug_assert!(len <= buf.len());
        Self {
            buf,
            len,
            last_touch: Instant::now(),
        }
    }

    /// Copy `[src_offset, min(len, src_end))` into `dst` at `target_offset`
    ///
    /// Returns the number of bytes copied.
    pub fn copy_to(
        &mut self,
        dst: &mut [u8],
        target_offset: usize,
        src_offset: usize,
        src_end: usize,
    ) -> usize {
        self.touch();
        let end = src_end.min(self.len);
        if src_offset >= end || target_offset >= dst.len() {
            return 0;
        }
        let count = (end - src_offset).min(dst.len() - target_offset);
        dst[target_offset..target_offset + count]
            .copy_from_slice(&self.buf[src_offset..src_offset + count]);
        count
    }

    /// Write `src` at `target_offset`
    ///
    /// Without `can_extend` only existing content is overwritten; with it the
    /// write may run up to capacity and the length grows to cover it.
    /// Returns the number of bytes written.
    pub fn write(&mut self, src: &[u8], target_offset: usize, can_extend: bool) -> usize {
        self.touch();
        let limit = if can_extend { self.buf.len() } else { self.len };
        if target_offset >= limit {
            return 0;
        }
        let count = src.len().min(limit - target_offset);
        self.buf[target_offset..target_offset + count].copy_from_slice(&src[..count]);
        if target_offset + count > self.len {
            self.len = target_offset + count;
        }
        count
    }

    /// Remove up to `count` bytes starting at `start`, closing the gap
    ///
    /// Returns the number of bytes actually removed (clamped at chunk end).
    pub fn remove(&mut self, start: usize, count: usize) -> usize {
        self.touch();
        if start >= self.len {
            return 0;
        }
        let count = count.min(self.len - start);
        self.buf.copy_within(start + count..self.len, start);
        self.len -= count;
        count
    }

    /// Move the bytes at and after `offset` right by `delta`
    ///
    /// Bytes pushed past capacity are dropped and the length is clamped.
    pub fn shift(&mut self, offset: usize, delta: usize) {
        self.touch();
        let capacity = self.buf.len();
        if offset >= self.len || offset + delta >= capacity {
            self.len = (self.len + delta).min(capacity);
            return;
        }
        let kept = (self.len - offset).min(capacity - offset - delta);
        self.buf.copy_within(offset..offset + kept, offset + delta);
        self.len = (self.len + delta).min(capacity);
    }

    /// Drop everything at and after `len`
    pub fn truncate(&mut self, len: usize) {
        self.touch();
        self.len = self.len.min(len);
    }

    /// Reset the length to zero
    pub fn clear(&mut self) {
        self.touch();
        self.len = 0;
    }

    /// Live content
    pub fn bytes(&self) -> &[u8] {
        &self.buf[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Bytes still free before the chunk is full
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.len
    }

    pub fn last_touch(&self) -> Instant {
        self.last_touch
    }

    fn touch(&mut self) {
        self.last_touch = Instant::now();
    }
}
