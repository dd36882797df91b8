//! Storage Module
//!
//! Paged, disk-backed document buffer.
//!
//! ## Responsibilities
//! - Offset-addressed read/write/replace over fixed-capacity chunks
//! - Lazy paging: chunks load from their records on first touch
//! - Idle eviction bounds memory to the recently-touched working set
//! - Periodic consolidation repacks chunks left half-full by edits
//!
//! ## Paging Model
//! ```text
//!   logical buffer:  [.................... length L ....................]
//!                     │           │           │           │
//!   chunks:          [  chunk 0  ][  chunk 1  ][  chunk 2  ][ chunk 3 ]
//!   lengths table:      4096         1733         4096        812      (always resident)
//!   resident:           bytes        evicted      bytes       bytes
//!                                    │
//!                                    ▼
//!   records:        {session_dir}/1  (raw bytes, sized to the chunk length)
//! ```

mod chunk;
mod records;
mod store;

pub use chunk::Chunk;
pub use records::ChunkRecords;
pub use store::ChunkStore;
