//! # Chunkpad
//!
//! A backend for real-time collaborative plain-text editing with:
//! - A paged, disk-backed buffer so documents larger than memory stay editable
//! - Idle chunk eviction and periodic consolidation
//! - A compact binary command protocol over WebSocket
//! - Per-document fan-out of edits to every other attached client
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   WebSocket Server                           │
//! │                  (Multiple Clients)                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  room code
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Registry                                │
//! │              (room code → Document)                          │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │  Document   │ ───────► │  Broadcast  │
//!   │ (dispatch)  │          │  (fan-out)  │
//!   └──────┬──────┘          └─────────────┘
//!          │
//!          ▼
//!   ┌─────────────┐
//!   │ ChunkStore  │ ──► chunk records on disk
//!   │  (paging)   │
//!   └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod storage;
pub mod protocol;
pub mod session;
pub mod network;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{ChunkpadError, Result};
pub use config::{Config, StoreOptions};
pub use storage::ChunkStore;
pub use session::{Document, Registry};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of Chunkpad
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
