//! Session Module
//!
//! Per-document session logic: who is attached, what a command does to the
//! buffer, and who hears about it.
//!
//! ## Flow
//! ```text
//!   frame ──► decode ──► Document::execute(sender, command)
//!                              │
//!               ┌──────────────┼──────────────────┐
//!               ▼              ▼                  ▼
//!          ChunkStore     broadcast to       private reply
//!          (DATA)         all but sender     (FETCH_RESPONSE)
//! ```

mod client;
mod document;
mod registry;

pub use client::{Client, ClientId, Outbox};
pub use document::{Document, DocumentStats};
pub use registry::{validate_room, FailureSink, Registry, SharedDocument, MAX_ROOM_LEN};
