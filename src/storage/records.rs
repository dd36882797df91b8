//! Chunk Records
//!
//! Backing records for evicted chunks, one directory per session.
//!
//! ## Layout
//! ```text
//! {session_dir}/
//!   ├── 0        raw bytes of chunk 0, sized to its length
//!   ├── 1        raw bytes of chunk 1
//!   ├── ...
//!   └── length   decimal total length of the buffer
//! ```
//!
//! All access is synchronous so a chunk's resident/evicted transition never
//! straddles two operations.

use std::fs::{self, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use crate::error::{ChunkpadError, Result};

/// Name of the record holding the total length
const LENGTH_RECORD: &str = "length";

/// Handle on one session's record directory
#[derive(Debug, Clone)]
pub struct ChunkRecords {
    dir: PathBuf,
}

impl ChunkRecords {
    /// Open the directory, creating it if it doesn't exist
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether a record exists for chunk `n`
    pub fn exists(&self, n: usize) -> bool {
        self.chunk_path(n).is_file()
    }

    /// Read record `n` into `buf`
    ///
    /// Returns the number of bytes read; a missing record reads as empty.
    pub fn read_chunk(&self, n: usize, buf: &mut [u8]) -> Result<usize> {
        let mut file = match File::open(self.chunk_path(n)) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(read) => filled += read,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(filled)
    }

    /// Replace record `n` with `bytes`
    pub fn write_chunk(&self, n: usize, bytes: &[u8]) -> Result<()> {
        let mut file = File::create(self.chunk_path(n))?;
        file.write_all(bytes)?;
        Ok(())
    }

    /// Move record `from` to `to`, if `from` exists
    pub fn rename_chunk(&self, from: usize, to: usize) -> Result<()> {
        match fs::rename(self.chunk_path(from), self.chunk_path(to)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Delete record `n`, if it exists
    pub fn remove_chunk(&self, n: usize) -> Result<()> {
        match fs::remove_file(self.chunk_path(n)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Sizes of the contiguous records `0..n`
    pub fn scan_lengths(&self) -> Result<Vec<usize>> {
        let mut lengths = Vec::new();
        loop {
            match fs::metadata(self.chunk_path(lengths.len())) {
                Ok(meta) if meta.is_file() => lengths.push(meta.len() as usize),
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::NotFound => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(lengths)
    }

    /// Read the persisted total length, if present
    pub fn read_length(&self) -> Result<Option<usize>> {
        let text = match fs::read_to_string(self.dir.join(LENGTH_RECORD)) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        text.trim().parse().map(Some).map_err(|_| {
            ChunkpadError::Corruption(format!(
                "length record in {} is not a number: {:?}",
                self.dir.display(),
                text
            ))
        })
    }

    /// Persist the total length as decimal text
    pub fn write_length(&self, length: usize) -> Result<()> {
        fs::write(self.dir.join(LENGTH_RECORD), length.to_string())?;
        Ok(())
    }

    /// Delete the whole directory
    pub fn destroy(&self) -> Result<()> {
        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Generate the record path for chunk `n`
    fn chunk_path(&self, n: usize) -> PathBuf {
        self.dir.join(n.to_string())
    }
}
