//! Document
//!
//! One collaboratively edited buffer plus its attached clients.
//!
//! ## Dispatch
//! - DATA         → replace in the store, broadcast to everyone else
//! - CURSOR       → stamp the sender, broadcast to everyone else
//! - FETCH        → private FETCH_RESPONSE to the sender (nothing if empty)
//! - TOGGLE_DEBUG → flip the sender's debug subscription
//! - server → client commands arriving from a client are dropped
//!
//! Edits are applied strictly in arrival order; overlapping edits are not
//! merged.

use std::path::Path;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::config::StoreOptions;
use crate::error::{ChunkpadError, Result};
use crate::protocol::{encode_command, Command};
use crate::storage::ChunkStore;

use super::{Client, ClientId, Outbox};

/// Snapshot of a document's buffer, as pushed in Debug frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentStats {
    pub length: usize,
    pub total_chunks: usize,
    pub loaded_chunks: usize,
    pub chunk_size: usize,
}

/// A named editing session
pub struct Document {
    /// Room code this document was opened under
    name: String,

    /// Authoritative buffer
    store: ChunkStore,

    /// Attached clients, in connection order
    clients: Vec<Client>,

    /// Next candidate client id
    next_client_id: ClientId,

    /// Last connect/disconnect, for idle reclamation
    last_accessed: Instant,
}

impl Document {
    /// Open the document stored in `dir`, creating it if needed
    pub fn open(name: impl Into<String>, dir: &Path, options: StoreOptions) -> Result<Self> {
        let store = ChunkStore::open(dir, options)?;
        Ok(Self {
            name: name.into(),
            store,
            clients: Vec::new(),
            next_client_id: 1,
            last_accessed: Instant::now(),
        })
    }

    // =========================================================================
    // Client Lifecycle
    // =========================================================================

    /// Attach a client and tell everyone the new client count
    pub fn connect(&mut self, outbox: Outbox) -> ClientId {
        let id = self.allocate_id();
        self.clients.push(Client::new(id, outbox));
        self.last_accessed = Instant::now();

        tracing::debug!(
            "Client {} joined {} ({} attached)",
            id,
            self.name,
            self.clients.len()
        );
        self.broadcast_stats();
        id
    }

    /// Detach a client and tell the rest the new client count
    pub fn disconnect(&mut self, id: ClientId) {
        let before = self.clients.len();
        self.clients.retain(|c| c.id() != id);
        if self.clients.len() == before {
            return;
        }
        self.last_accessed = Instant::now();

        tracing::debug!(
            "Client {} left {} ({} attached)",
            id,
            self.name,
            self.clients.len()
        );
        self.broadcast_stats();
    }

    // =========================================================================
    // Command Dispatch
    // =========================================================================

    /// Apply one command received from `sender`
    ///
    /// Only backing-storage failures come back as errors; anything a client
    /// got wrong is logged and dropped.
    pub fn execute(&mut self, sender: ClientId, command: Command) -> Result<()> {
        match command {
            Command::Data { start, end, bytes } => {
                if !self.apply_data(sender, start as usize, end as usize, &bytes)? {
                    return Ok(());
                }
                let frame = encode_command(&Command::Data { start, end, bytes });
                self.broadcast(frame, Some(sender));
            }
            Command::Cursor { pos, .. } => {
                let frame = encode_command(&Command::Cursor {
                    pos,
                    client: sender,
                });
                self.broadcast(frame, Some(sender));
            }
            Command::Fetch { offset, len } => {
                let bytes = self.store.read(offset as usize, len as usize)?;
                if bytes.is_empty() {
                    return Ok(());
                }
                let frame = encode_command(&Command::FetchResponse {
                    start: offset,
                    end: offset,
                    bytes: Bytes::from(bytes),
                });
                self.send_to(sender, frame);
            }
            Command::ToggleDebug { enabled } => {
                if let Some(client) = self.clients.iter_mut().find(|c| c.id() == sender) {
                    client.set_debug(enabled);
                }
            }
            Command::Stats { .. } | Command::Debug { .. } | Command::FetchResponse { .. } => {
                tracing::trace!(
                    "Ignoring server-only {:?} from client {} in {}",
                    command.command_type(),
                    sender,
                    self.name
                );
            }
        }
        Ok(())
    }

    /// Replace `[start, end)` with `bytes`, splitting payloads larger than a chunk
    ///
    /// Returns false when the edit was dropped as out of range.
    fn apply_data(&mut self, sender: ClientId, start: usize, end: usize, bytes: &[u8]) -> Result<bool> {
        if start > end || start > self.store.len() {
            tracing::warn!(
                "Dropping DATA [{}, {}) from client {} in {}: buffer is {} bytes",
                start,
                end,
                sender,
                self.name,
                self.store.len()
            );
            return Ok(false);
        }

        match self.splice(start, end, bytes) {
            Ok(()) => Ok(true),
            Err(e @ (ChunkpadError::OutOfBounds { .. } | ChunkpadError::PayloadTooLarge { .. })) => {
                tracing::warn!("Dropping DATA from client {} in {}: {}", sender, self.name, e);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    /// One replace for the first chunk's worth, then chunk-sized inserts
    fn splice(&mut self, start: usize, end: usize, bytes: &[u8]) -> Result<()> {
        let chunk_size = self.store.chunk_size();
        let (head, rest) = bytes.split_at(bytes.len().min(chunk_size));

        self.store.replace(head, start, end - start)?;

        let mut at = start + head.len();
        for piece in rest.chunks(chunk_size) {
            self.store.replace(piece, at, 0)?;
            at += piece.len();
        }
        Ok(())
    }

    // =========================================================================
    // Fan-out
    // =========================================================================

    /// Send a frame to every client except `except`
    pub fn broadcast(&mut self, frame: Bytes, except: Option<ClientId>) {
        let lagging = self.deliver(&frame, |c| Some(c.id()) != except);
        self.drop_lagging(lagging);
    }

    /// Push Debug stats to every subscribed client
    pub fn push_debug(&mut self) {
        if !self.clients.iter().any(|c| c.debug()) {
            return;
        }

        let stats = self.stats();
        let frame = encode_command(&Command::Debug {
            length: saturate(stats.length),
            total_chunks: saturate(stats.total_chunks),
            loaded_chunks: saturate(stats.loaded_chunks),
            chunk_size: saturate(stats.chunk_size),
        });
        let lagging = self.deliver(&frame, Client::debug);
        self.drop_lagging(lagging);
    }

    fn broadcast_stats(&mut self) {
        let frame = encode_command(&Command::Stats {
            clients: saturate(self.clients.len()),
        });
        self.broadcast(frame, None);
    }

    fn send_to(&mut self, id: ClientId, frame: Bytes) {
        let lagging = self.deliver(&frame, |c| c.id() == id);
        self.drop_lagging(lagging);
    }

    /// Queue `frame` for every client matching `to`; returns the ids whose
    /// queues were full
    fn deliver(&self, frame: &Bytes, to: impl Fn(&Client) -> bool) -> Vec<ClientId> {
        self.clients
            .iter()
            .filter(|c| to(*c))
            .filter(|c| !c.send(frame.clone()))
            .map(|c| c.id())
            .collect()
    }

    /// Disconnect clients that stopped draining their queue
    ///
    /// Dropping a client drops its outbox sender, so its connection closes
    /// once the frames already queued are written.
    fn drop_lagging(&mut self, mut lagging: Vec<ClientId>) {
        while !lagging.is_empty() {
            for id in &lagging {
                tracing::warn!("Client {} in {} is not keeping up, disconnecting", id, self.name);
            }
            self.clients.retain(|c| !lagging.contains(&c.id()));
            self.last_accessed = Instant::now();

            let frame = encode_command(&Command::Stats {
                clients: saturate(self.clients.len()),
            });
            lagging = self.deliver(&frame, |_| true);
        }
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Evict idle chunks; returns how many were evicted
    pub fn clean_up(&mut self) -> Result<usize> {
        self.store.clean_up()
    }

    /// Repack the buffer; returns whether anything moved
    pub fn consolidate(&mut self) -> Result<bool> {
        self.store.consolidate()
    }

    /// Persist every resident chunk
    pub fn flush(&mut self) -> Result<()> {
        self.store.flush()
    }

    /// Delete the backing records; the document is empty afterwards
    pub fn destroy(&mut self) -> Result<()> {
        tracing::info!("Destroying document {}", self.name);
        self.store.destroy()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    pub fn last_accessed(&self) -> Instant {
        self.last_accessed
    }

    /// Whether the document has had no clients for at least `grace`
    pub fn is_idle(&self, grace: Duration) -> bool {
        self.clients.is_empty() && self.last_accessed.elapsed() >= grace
    }

    pub fn is_debug_subscribed(&self, id: ClientId) -> bool {
        self.clients.iter().any(|c| c.id() == id && c.debug())
    }

    pub fn stats(&self) -> DocumentStats {
        DocumentStats {
            length: self.store.len(),
            total_chunks: self.store.chunk_count(),
            loaded_chunks: self.store.loaded_chunks(),
            chunk_size: self.store.chunk_size(),
        }
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ChunkStore {
        &mut self.store
    }

    /// Next unused id, skipping 0 and ids still attached
    fn allocate_id(&mut self) -> ClientId {
        loop {
            let id = self.next_client_id;
            self.next_client_id = self.next_client_id.wrapping_add(1);
            if id != 0 && !self.clients.iter().any(|c| c.id() == id) {
                return id;
            }
        }
    }
}

/// Wire fields are u32
fn saturate(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}
