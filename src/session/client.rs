//! Client handle
//!
//! Per-connection identity as seen by a Document.

use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError};

/// Session-scoped client id; never 0
pub type ClientId = u32;

/// Bounded queue of encoded frames for one connection's writer
pub type Outbox = mpsc::Sender<Bytes>;

/// One attached connection
#[derive(Debug)]
pub struct Client {
    id: ClientId,
    debug: bool,
    outbox: Outbox,
}

impl Client {
    pub fn new(id: ClientId, outbox: Outbox) -> Self {
        Self {
            id,
            debug: false,
            outbox,
        }
    }

    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Whether this client receives periodic Debug pushes
    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn set_debug(&mut self, enabled: bool) {
        self.debug = enabled;
    }

    /// Queue a frame for the connection
    ///
    /// Returns false only when the queue is full. A closed connection counts
    /// as delivered; its disconnect is on its way.
    pub fn send(&self, frame: Bytes) -> bool {
        match self.outbox.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Closed(_)) => {
                tracing::trace!("Client {} outbox closed, frame dropped", self.id);
                true
            }
            Err(TrySendError::Full(_)) => false,
        }
    }
}
