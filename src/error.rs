//! Error types for Chunkpad
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using ChunkpadError
pub type Result<T> = std::result::Result<T, ChunkpadError>;

/// Unified error type for Chunkpad operations
#[derive(Debug, Error)]
pub enum ChunkpadError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Chunk record corruption detected: {0}")]
    Corruption(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Replace payload of {len} bytes exceeds chunk capacity of {capacity} bytes")]
    PayloadTooLarge { len: usize, capacity: usize },

    #[error("Offset {offset} is beyond the end of a {length} byte buffer")]
    OutOfBounds { offset: usize, length: usize },

    // -------------------------------------------------------------------------
    // Protocol Errors
    // -------------------------------------------------------------------------
    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Network Errors
    // -------------------------------------------------------------------------
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid room code: {0:?}")]
    InvalidRoom(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ChunkpadError {
    /// Backing-storage failures are not recovered locally; the server stops
    /// when one of these reaches it.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ChunkpadError::Io(_) | ChunkpadError::Corruption(_) | ChunkpadError::Storage(_)
        )
    }
}
