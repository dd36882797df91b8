//! Connection Handler
//!
//! Bridges one WebSocket connection to the Document it is attached to.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::Message;

use crate::error::{ChunkpadError, Result};
use crate::protocol::{decode_command, Decoded};
use crate::session::{validate_room, ClientId, Registry, SharedDocument};

/// Handles a single client connection
pub struct Connection {
    /// Upgraded WebSocket stream
    ws: tokio_tungstenite::WebSocketStream<TcpStream>,

    /// Room code taken from the request path
    room: String,

    /// Session registry
    registry: Arc<Registry>,

    /// Peer address for logging
    peer_addr: SocketAddr,
}

impl Connection {
    /// Perform the WebSocket handshake
    ///
    /// The room code is the last segment of the request path; an invalid
    /// code is refused with 400 before the upgrade.
    pub async fn accept(
        stream: TcpStream,
        peer_addr: SocketAddr,
        registry: Arc<Registry>,
    ) -> Result<Self> {
        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let mut room = None;
        let callback = |request: &Request, response: Response| {
            let code = room_from_path(request.uri().path());
            match validate_room(code) {
                Ok(()) => {
                    room = Some(code.to_string());
                    Ok(response)
                }
                Err(e) => {
                    let mut refusal = ErrorResponse::new(Some(e.to_string()));
                    *refusal.status_mut() = StatusCode::BAD_REQUEST;
                    Err(refusal)
                }
            }
        };

        let ws = tokio_tungstenite::accept_hdr_async(stream, callback)
            .await
            .map_err(|e| ChunkpadError::Network(format!("handshake with {} failed: {}", peer_addr, e)))?;

        let room = room.ok_or_else(|| {
            ChunkpadError::Network(format!("handshake with {} carried no room", peer_addr))
        })?;

        Ok(Self {
            ws,
            room,
            registry,
            peer_addr,
        })
    }

    /// Handle the connection until the client goes away
    ///
    /// Inbound frames are decoded and executed against the document; frames
    /// queued for this client by the document are written out. Only fatal
    /// storage errors are returned.
    pub async fn handle(self) -> Result<()> {
        let Connection {
            ws,
            room,
            registry,
            peer_addr,
        } = self;

        let (outbox, mut queued) = mpsc::channel::<Bytes>(registry.config().outbox_capacity);
        let (document, id) = registry.attach(&room, outbox)?;
        tracing::debug!("Connection {} attached to {} as client {}", peer_addr, room, id);

        let (mut ws_sender, mut ws_receiver) = ws.split();

        let outcome = loop {
            tokio::select! {
                // Incoming WebSocket message
                msg = ws_receiver.next() => {
                    match msg {
                        Some(Ok(Message::Binary(frame))) => {
                            if let Err(e) = execute(&document, id, &frame) {
                                break Err(e);
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            tracing::debug!("Client {} disconnected", peer_addr);
                            break Ok(());
                        }
                        Some(Ok(_)) => {
                            // Text, ping and pong carry no commands
                        }
                        Some(Err(e)) => {
                            tracing::debug!("Connection to {} dropped: {}", peer_addr, e);
                            break Ok(());
                        }
                    }
                }

                // Outgoing frame queued by the document; the queue closes
                // when the document drops this client for lagging
                frame = queued.recv() => {
                    let Some(frame) = frame else {
                        tracing::debug!("Client {} dropped by {}", peer_addr, room);
                        break Ok(());
                    };
                    if let Err(e) = ws_sender.send(Message::Binary(frame)).await {
                        tracing::debug!(
                            "Client {} disconnected before a frame could be sent: {}",
                            peer_addr, e
                        );
                        break Ok(());
                    }
                }
            }
        };

        registry.detach(&document, id);
        let _ = ws_sender.close().await;
        outcome
    }

    /// Room code this connection asked for
    pub fn room(&self) -> &str {
        &self.room
    }

    /// Get the peer address
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }
}

/// Decode one frame and run it against the document
fn execute(document: &SharedDocument, id: ClientId, frame: &[u8]) -> Result<()> {
    match decode_command(frame) {
        Decoded::Command(command) => {
            tracing::trace!("Client {} sent {:?}", id, command.command_type());
            document.lock().execute(id, command)
        }
        Decoded::NoCommand => Ok(()),
    }
}

/// Last non-empty segment of a request path
pub fn room_from_path(path: &str) -> &str {
    path.rsplit('/').find(|segment| !segment.is_empty()).unwrap_or("")
}
