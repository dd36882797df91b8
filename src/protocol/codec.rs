//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Payload by Command Type
//! ```text
//! DATA            │ start (4) │ end (4)  │ bytes ...                    │
//! FETCH           │ offset (4)│ len (4)  │
//! STATS           │ clients (4)│
//! CURSOR          │ pos (4)   │ sender (4, on encode)│
//! TOGGLE_DEBUG    │ value (4) │
//! DEBUG           │ length (4)│ chunks (4)│ loaded (4)│ chunk size (4)│
//! FETCH_RESPONSE  │ start (4) │ end (4)  │ bytes ...                    │
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{ChunkpadError, Result};
use super::{Command, CommandType, Decoded};

/// Tag size: every frame starts with one tag byte
pub const TAG_SIZE: usize = 1;

// =============================================================================
// Encoding
// =============================================================================

/// Encode a command to one frame
///
/// Format: tag (1) + payload
pub fn encode_command(command: &Command) -> Bytes {
    let mut frame = BytesMut::with_capacity(TAG_SIZE + command.payload_len());
    frame.put_u8(command.command_type() as u8);

    match command {
        Command::Data { start, end, bytes } | Command::FetchResponse { start, end, bytes } => {
            frame.put_u32(*start);
            frame.put_u32(*end);
            frame.put_slice(bytes);
        }
        Command::Fetch { offset, len } => {
            frame.put_u32(*offset);
            frame.put_u32(*len);
        }
        Command::Stats { clients } => frame.put_u32(*clients),
        Command::Cursor { pos, client } => {
            frame.put_u32(*pos);
            frame.put_u32(*client);
        }
        Command::ToggleDebug { enabled } => frame.put_u32(u32::from(*enabled)),
        Command::Debug {
            length,
            total_chunks,
            loaded_chunks,
            chunk_size,
        } => {
            frame.put_u32(*length);
            frame.put_u32(*total_chunks);
            frame.put_u32(*loaded_chunks);
            frame.put_u32(*chunk_size);
        }
    }

    frame.freeze()
}

// =============================================================================
// Decoding
// =============================================================================

/// Decode one frame
///
/// Never fails: unknown tags and malformed payloads yield `NoCommand`.
pub fn decode_command(frame: &[u8]) -> Decoded {
    match try_decode_command(frame) {
        Ok(command) => Decoded::Command(command),
        Err(e) => {
            tracing::trace!("Dropping frame of {} bytes: {}", frame.len(), e);
            Decoded::NoCommand
        }
    }
}

/// Decode one frame, reporting why it was rejected
pub fn try_decode_command(frame: &[u8]) -> Result<Command> {
    let Some((&tag, mut payload)) = frame.split_first() else {
        return Err(ChunkpadError::Protocol("empty frame".to_string()));
    };

    let command_type = CommandType::from_tag(tag).ok_or_else(|| {
        ChunkpadError::Protocol(format!("Unknown command tag: 0x{:02x}", tag))
    })?;

    let command = match command_type {
        CommandType::Data => {
            require(&payload, 8, "DATA")?;
            let start = payload.get_u32();
            let end = payload.get_u32();
            Command::Data {
                start,
                end,
                bytes: Bytes::copy_from_slice(payload),
            }
        }
        CommandType::FetchResponse => {
            require(&payload, 8, "FETCH_RESPONSE")?;
            let start = payload.get_u32();
            let end = payload.get_u32();
            Command::FetchResponse {
                start,
                end,
                bytes: Bytes::copy_from_slice(payload),
            }
        }
        CommandType::Fetch => {
            require_exact(&payload, 8, "FETCH")?;
            Command::Fetch {
                offset: payload.get_u32(),
                len: payload.get_u32(),
            }
        }
        CommandType::Stats => {
            require_exact(&payload, 4, "STATS")?;
            Command::Stats {
                clients: payload.get_u32(),
            }
        }
        CommandType::Cursor => {
            // Clients send only the position; server frames carry the sender too
            if payload.len() != 4 && payload.len() != 8 {
                return Err(ChunkpadError::Protocol(format!(
                    "CURSOR command: expected 4 or 8 payload bytes, got {}",
                    payload.len()
                )));
            }
            let pos = payload.get_u32();
            let client = if payload.has_remaining() {
                payload.get_u32()
            } else {
                0
            };
            Command::Cursor { pos, client }
        }
        CommandType::ToggleDebug => {
            require_exact(&payload, 4, "TOGGLE_DEBUG")?;
            Command::ToggleDebug {
                enabled: payload.get_u32() != 0,
            }
        }
        CommandType::Debug => {
            require_exact(&payload, 16, "DEBUG")?;
            Command::Debug {
                length: payload.get_u32(),
                total_chunks: payload.get_u32(),
                loaded_chunks: payload.get_u32(),
                chunk_size: payload.get_u32(),
            }
        }
    };

    Ok(command)
}

/// Payload must hold at least the fixed header
fn require(payload: &[u8], len: usize, name: &str) -> Result<()> {
    if payload.len() < len {
        return Err(ChunkpadError::Protocol(format!(
            "{} command: expected at least {} payload bytes, got {}",
            name,
            len,
            payload.len()
        )));
    }
    Ok(())
}

/// Payload must be exactly the fixed layout
fn require_exact(payload: &[u8], len: usize, name: &str) -> Result<()> {
    if payload.len() != len {
        return Err(ChunkpadError::Protocol(format!(
            "{} command: expected {} payload bytes, got {}",
            name,
            len,
            payload.len()
        )));
    }
    Ok(())
}
