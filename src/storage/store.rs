//! Chunk Store
//!
//! One logical byte buffer kept as an ordered sequence of fixed-capacity
//! chunks, some resident and some evicted to their backing records.
//!
//! ## Bookkeeping
//! - `lengths[n]` is the live length of chunk `n` and is always resident,
//!   so offset math never loads bytes.
//! - `resident[n]` holds the chunk bytes while it is in memory.
//! - `Σ lengths == length` after every public operation.
//!
//! A chunk's position is its address: inserting a chunk renumbers every
//! chunk after it, including the records of evicted ones.

use std::io::Write;
use std::path::Path;

use crate::config::StoreOptions;
use crate::error::{ChunkpadError, Result};

use super::{Chunk, ChunkRecords};

/// Paged, disk-backed byte buffer
pub struct ChunkStore {
    /// Backing records for this buffer
    records: ChunkRecords,

    /// Chunk capacity and eviction threshold
    options: StoreOptions,

    /// Logical length of the buffer
    length: usize,

    /// Length of every chunk, resident or not
    lengths: Vec<usize>,

    /// Chunk bytes for the resident working set
    resident: Vec<Option<Chunk>>,
}

impl ChunkStore {
    /// Open or create a store in the given directory
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Rebuild the length table from the contiguous chunk records
    /// 3. Cross-check against the persisted total length
    ///
    /// No chunk bytes are loaded; chunks page in on first touch.
    pub fn open(dir: &Path, options: StoreOptions) -> Result<Self> {
        if options.chunk_size == 0 {
            return Err(ChunkpadError::Config("chunk_size must be non-zero".to_string()));
        }

        let records = ChunkRecords::open(dir)?;
        let lengths = records.scan_lengths()?;

        if let Some((n, len)) = lengths
            .iter()
            .enumerate()
            .find(|(_, len)| **len > options.chunk_size)
        {
            return Err(ChunkpadError::Corruption(format!(
                "chunk record {} in {} holds {} bytes, more than the chunk size {}",
                n,
                dir.display(),
                len,
                options.chunk_size
            )));
        }

        let length: usize = lengths.iter().sum();
        if let Some(persisted) = records.read_length()? {
            if persisted != length {
                tracing::warn!(
                    "Length record for {} says {} bytes but chunk records hold {}; using records",
                    dir.display(),
                    persisted,
                    length
                );
            }
        }

        if length > 0 {
            tracing::debug!(
                "Reopened {} with {} bytes in {} chunks",
                dir.display(),
                length,
                lengths.len()
            );
        }

        let resident = lengths.iter().map(|_| None).collect();

        Ok(Self {
            records,
            options,
            length,
            lengths,
            resident,
        })
    }

    // =========================================================================
    // Reads and Writes
    // =========================================================================

    /// Read up to `length` bytes starting at `offset`
    ///
    /// The result is clamped to the end of the buffer; an offset at or past
    /// the end yields an empty vector.
    pub fn read(&mut self, offset: usize, length: usize) -> Result<Vec<u8>> {
        if offset >= self.length {
            return Ok(Vec::new());
        }
        let length = length.min(self.length - offset);

        let mut out = vec![0u8; length];
        let (mut n, mut intra) = self.resolve(offset);
        let mut copied = 0;

        while copied < length {
            let chunk = self.chunk_mut(n)?;
            copied += chunk.copy_to(&mut out, copied, intra, intra + (length - copied));
            n += 1;
            intra = 0;
        }

        Ok(out)
    }

    /// Overwrite bytes starting at `offset`, extending the buffer if the
    /// write runs past its end
    ///
    /// Only the trailing chunk grows; interior chunks are overwritten in
    /// place and the remainder spills into the chunks that follow.
    pub fn write(&mut self, data: &[u8], offset: usize) -> Result<()> {
        if offset > self.length {
            return Err(ChunkpadError::OutOfBounds {
                offset,
                length: self.length,
            });
        }
        if data.is_empty() {
            return Ok(());
        }

        let (mut n, mut intra) = self.resolve(offset);
        let mut written = 0;

        loop {
            self.ensure_chunk(n);
            let trailing = n + 1 == self.lengths.len();

            let (count, len) = {
                let chunk = self.chunk_mut(n)?;
                (chunk.write(&data[written..], intra, trailing), chunk.len())
            };
            self.lengths[n] = len;
            written += count;

            if written == data.len() {
                break;
            }
            n += 1;
            intra = 0;
        }

        self.length = self.length.max(offset + data.len());
        self.check_lengths();
        Ok(())
    }

    /// Replace `replace_length` bytes at `offset` with `data`
    ///
    /// Grows or shrinks the buffer in one pass. `data` must fit in a single
    /// chunk; larger payloads are rejected without touching the buffer.
    /// A span running past the end of the buffer is clamped to it.
    pub fn replace(&mut self, data: &[u8], offset: usize, replace_length: usize) -> Result<()> {
        if data.len() > self.options.chunk_size {
            return Err(ChunkpadError::PayloadTooLarge {
                len: data.len(),
                capacity: self.options.chunk_size,
            });
        }
        if offset > self.length {
            return Err(ChunkpadError::OutOfBounds {
                offset,
                length: self.length,
            });
        }
        let replace_length = replace_length.min(self.length - offset);

        if offset == self.length || data.len() == replace_length {
            return self.write(data, offset);
        }

        if data.len() < replace_length {
            self.shrink(data, offset, replace_length)?;
        } else {
            self.grow(data, offset, replace_length)?;
        }

        self.check_lengths();
        Ok(())
    }

    /// Overwrite with the shorter data, then drain the surplus old bytes
    fn shrink(&mut self, data: &[u8], offset: usize, replace_length: usize) -> Result<()> {
        self.write(data, offset)?;

        let surplus = replace_length - data.len();
        let mut to_remove = surplus;
        let (mut n, mut intra) = self.locate(offset + data.len());

        while to_remove > 0 {
            let (removed, len) = {
                let chunk = self.chunk_mut(n)?;
                (chunk.remove(intra, to_remove), chunk.len())
            };
            self.lengths[n] = len;
            to_remove -= removed;
            n += 1;
            intra = 0;
        }

        self.length -= surplus;
        Ok(())
    }

    /// Stream `data` followed by the end chunk's tail over the replaced span
    fn grow(&mut self, data: &[u8], offset: usize, replace_length: usize) -> Result<()> {
        let chunk_size = self.options.chunk_size;
        let diff = data.len() - replace_length;
        let (start_n, start_intra) = self.locate(offset);
        let (end_n, end_intra) = self.locate(offset + replace_length);

        // Span inside one chunk with room to spare: open the gap in place
        if start_n == end_n && self.lengths[start_n] + diff <= chunk_size {
            let len = {
                let chunk = self.chunk_mut(start_n)?;
                chunk.shift(end_intra, diff);
                chunk.write(data, start_intra, true);
                chunk.len()
            };
            self.lengths[start_n] = len;
            self.length += diff;
            return Ok(());
        }

        let tail = {
            let chunk = self.chunk_mut(end_n)?;
            let len = chunk.len();
            let mut tail = vec![0u8; len - end_intra];
            chunk.copy_to(&mut tail, 0, end_intra, len);
            tail
        };
        let mut payload = Vec::with_capacity(data.len() + tail.len());
        payload.extend_from_slice(data);
        payload.extend_from_slice(&tail);

        let mut n = start_n;
        let mut intra = start_intra;
        let mut written = 0;

        loop {
            if n > end_n {
                self.insert_chunk(n)?;
            }

            let (count, len) = {
                // Chunks past the first are fully overwritten, so skip loading them
                let chunk = if n == start_n {
                    self.chunk_mut(n)?
                } else {
                    self.fresh_chunk(n)?
                };
                chunk.truncate(intra);
                (chunk.write(&payload[written..], intra, true), chunk.len())
            };
            self.lengths[n] = len;
            written += count;

            if written == payload.len() {
                break;
            }
            n += 1;
            intra = 0;
        }

        // Stale bytes in chunks of the old span that the payload never reached
        for k in n + 1..=end_n {
            self.fresh_chunk(k)?;
            self.lengths[k] = 0;
        }

        self.length += diff;
        Ok(())
    }

    /// Splice an empty chunk in at position `n`
    ///
    /// Every chunk at or after `n` moves up by one; records of evicted
    /// chunks are renamed to match.
    pub fn insert_chunk(&mut self, n: usize) -> Result<()> {
        if n > self.lengths.len() {
            return Err(ChunkpadError::Storage(format!(
                "cannot insert chunk {} into a store of {} chunks",
                n,
                self.lengths.len()
            )));
        }

        for i in (n..self.lengths.len()).rev() {
            self.records.rename_chunk(i, i + 1)?;
        }

        self.lengths.insert(n, 0);
        self.resident.insert(n, Some(Chunk::new(self.options.chunk_size)));
        Ok(())
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Evict chunks idle past the threshold and persist the total length
    ///
    /// Returns the number of chunks evicted.
    pub fn clean_up(&mut self) -> Result<usize> {
        let evict_after = self.options.evict_after;
        let mut evicted = 0;

        for n in 0..self.resident.len() {
            if let Some(chunk) = &self.resident[n] {
                if chunk.last_touch().elapsed() >= evict_after {
                    self.records.write_chunk(n, chunk.bytes())?;
                    self.resident[n] = None;
                    evicted += 1;
                }
            }
        }

        self.records.write_length(self.length)?;

        if evicted > 0 {
            tracing::trace!(
                "Evicted {} chunks from {} ({} still resident)",
                evicted,
                self.records.dir().display(),
                self.loaded_chunks()
            );
        }
        Ok(evicted)
    }

    /// Repack the buffer into full chunks
    ///
    /// Afterwards there are `ceil(length / chunk_size)` chunks, all full but
    /// the last. The leading run of already-full chunks is left untouched.
    /// Evicted chunks are streamed from and back to their records, so the
    /// pass never grows the resident set. Returns whether anything moved.
    pub fn consolidate(&mut self) -> Result<bool> {
        let chunk_size = self.options.chunk_size;
        let count = self.lengths.len();
        let target = self.length.div_ceil(chunk_size);
        let first = self
            .lengths
            .iter()
            .position(|len| *len != chunk_size)
            .unwrap_or(count);

        if first + 1 >= count && count == target {
            return Ok(false);
        }

        let loaded_before = self.loaded_chunks();
        let mut rolling: Vec<u8> = Vec::with_capacity(2 * chunk_size);
        let mut scratch = vec![0u8; chunk_size];
        let mut out = first;

        for i in first..count {
            match &self.resident[i] {
                Some(chunk) => rolling.extend_from_slice(chunk.bytes()),
                None => {
                    let read = self.records.read_chunk(i, &mut scratch)?;
                    self.check_record(i, read)?;
                    rolling.extend_from_slice(&scratch[..read]);
                }
            }
            // out <= i here, so the slot being overwritten was already read
            while rolling.len() >= chunk_size {
                self.emit(out, &rolling[..chunk_size])?;
                rolling.drain(..chunk_size);
                out += 1;
            }
        }
        if !rolling.is_empty() {
            self.emit(out, &rolling)?;
            out += 1;
        }

        for k in out..count {
            self.records.remove_chunk(k)?;
        }
        self.lengths.truncate(out);
        self.resident.truncate(out);

        tracing::debug!(
            "Consolidated {}: {} chunks -> {} ({} resident, {} before)",
            self.records.dir().display(),
            count,
            out,
            self.loaded_chunks(),
            loaded_before
        );
        self.check_lengths();
        Ok(true)
    }

    /// Write every resident chunk and the total length without evicting
    pub fn flush(&mut self) -> Result<()> {
        for (n, slot) in self.resident.iter().enumerate() {
            if let Some(chunk) = slot {
                self.records.write_chunk(n, chunk.bytes())?;
            }
        }
        self.records.write_length(self.length)
    }

    /// Stream the buffer's content, chunk by chunk, into `sink`
    ///
    /// Evicted chunks are read straight from their records and stay evicted.
    /// Returns the number of bytes written.
    pub fn write_to_stream<W: Write>(&self, sink: &mut W) -> Result<u64> {
        let mut scratch = vec![0u8; self.options.chunk_size];
        let mut total = 0u64;

        for (n, slot) in self.resident.iter().enumerate() {
            match slot {
                Some(chunk) => {
                    sink.write_all(chunk.bytes())?;
                    total += chunk.len() as u64;
                }
                None => {
                    let read = self.records.read_chunk(n, &mut scratch)?;
                    self.check_record(n, read)?;
                    sink.write_all(&scratch[..read])?;
                    total += read as u64;
                }
            }
        }

        sink.flush()?;
        Ok(total)
    }

    /// Delete the backing directory and drop all chunks
    pub fn destroy(&mut self) -> Result<()> {
        self.resident.clear();
        self.lengths.clear();
        self.length = 0;
        self.records.destroy()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Logical length of the buffer
    pub fn len(&self) -> usize {
        self.length
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn chunk_size(&self) -> usize {
        self.options.chunk_size
    }

    /// Number of chunks, resident or not
    pub fn chunk_count(&self) -> usize {
        self.lengths.len()
    }

    /// Number of chunks currently in memory
    pub fn loaded_chunks(&self) -> usize {
        self.resident.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn chunk_lengths(&self) -> &[usize] {
        &self.lengths
    }

    pub fn is_resident(&self, n: usize) -> bool {
        matches!(self.resident.get(n), Some(Some(_)))
    }

    pub fn dir(&self) -> &Path {
        self.records.dir()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Translate a logical offset into (chunk, intra-chunk offset)
    ///
    /// An offset on a chunk boundary stays at the end of the earlier chunk.
    fn locate(&self, offset: usize) -> (usize, usize) {
        let mut n = 0;
        let mut offset = offset;
        while n < self.lengths.len() && offset > self.lengths[n] {
            offset -= self.lengths[n];
            n += 1;
        }
        (n, offset)
    }

    /// Like `locate`, but an offset at the very end of a full chunk rolls
    /// over to the start of the next one
    fn resolve(&self, offset: usize) -> (usize, usize) {
        match self.locate(offset) {
            (n, intra) if intra == self.options.chunk_size => (n + 1, 0),
            found => found,
        }
    }

    /// Append empty chunks until chunk `n` exists
    fn ensure_chunk(&mut self, n: usize) {
        while self.lengths.len() <= n {
            self.lengths.push(0);
            self.resident.push(Some(Chunk::new(self.options.chunk_size)));
        }
    }

    /// Get chunk `n`, paging it in from its record if evicted
    fn chunk_mut(&mut self, n: usize) -> Result<&mut Chunk> {
        if n >= self.lengths.len() {
            return Err(ChunkpadError::Storage(format!(
                "chunk {} does not exist in {} ({} chunks)",
                n,
                self.records.dir().display(),
                self.lengths.len()
            )));
        }

        if self.resident[n].is_none() {
            let mut buf = vec![0u8; self.options.chunk_size].into_boxed_slice();
            let read = self.records.read_chunk(n, &mut buf)?;
            self.check_record(n, read)?;
            self.resident[n] = Some(Chunk::from_parts(buf, read));
        }

        self.resident[n].as_mut().ok_or_else(|| {
            ChunkpadError::Storage(format!("chunk {} failed to page in", n))
        })
    }

    /// Replace chunk `n` with an empty resident chunk, discarding its bytes
    ///
    /// An existing record is emptied as well, so it never outlives the
    /// bytes it held. It is rewritten in full on the next eviction.
    fn fresh_chunk(&mut self, n: usize) -> Result<&mut Chunk> {
        if self.records.exists(n) {
            self.records.write_chunk(n, &[])?;
        }
        let chunk_size = self.options.chunk_size;
        let chunk = self.resident[n].get_or_insert_with(|| Chunk::new(chunk_size));
        chunk.clear();
        Ok(chunk)
    }

    /// Overwrite slot `n` with one consolidated page
    ///
    /// A resident slot is rewritten in memory; an evicted one is written
    /// straight to its record and stays evicted.
    fn emit(&mut self, n: usize, page: &[u8]) -> Result<()> {
        match self.resident[n].as_mut() {
            Some(chunk) => {
                chunk.clear();
                chunk.write(page, 0, true);
            }
            None => self.records.write_chunk(n, page)?,
        }
        self.lengths[n] = page.len();
        Ok(())
    }

    /// A record read back must match the resident length table
    fn check_record(&self, n: usize, read: usize) -> Result<()> {
        if read != self.lengths[n] {
            return Err(ChunkpadError::Corruption(format!(
                "chunk record {} in {} holds {} bytes, expected {}",
                n,
                self.records.dir().display(),
                read,
                self.lengths[n]
            )));
        }
        Ok(())
    }

    fn check_lengths(&self) {
        debug_assert_eq!(
            self.lengths.iter().sum::<usize>(),
            self.length,
            "chunk lengths out of sync with buffer length"
        );
    }
}
