//! Command definitions
//!
//! The closed set of commands exchanged with clients.

use bytes::Bytes;

/// Command tags (first byte of every frame)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    Data = 0,
    Fetch = 1,
    Stats = 2,
    Cursor = 3,
    ToggleDebug = 4,
    Debug = 5,
    FetchResponse = 6,
}

impl CommandType {
    /// Map a tag byte back to its command type
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CommandType::Data),
            1 => Some(CommandType::Fetch),
            2 => Some(CommandType::Stats),
            3 => Some(CommandType::Cursor),
            4 => Some(CommandType::ToggleDebug),
            5 => Some(CommandType::Debug),
            6 => Some(CommandType::FetchResponse),
            _ => None,
        }
    }
}

/// A parsed command
///
/// The connection that sent a command is never part of it; the transport
/// passes it alongside, and it is gone by the time a command is re-encoded
/// for other clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Replace `[start, end)` with `bytes`
    Data { start: u32, end: u32, bytes: Bytes },

    /// Ask for `len` bytes starting at `offset` (client → server)
    Fetch { offset: u32, len: u32 },

    /// Number of clients attached to the document (server → client)
    Stats { clients: u32 },

    /// Caret position of a client; `client` is 0 until the server stamps
    /// the originator's id on it
    Cursor { pos: u32, client: u32 },

    /// Subscribe to or unsubscribe from debug pushes (client → server)
    ToggleDebug { enabled: bool },

    /// Buffer diagnostics (server → client)
    Debug {
        length: u32,
        total_chunks: u32,
        loaded_chunks: u32,
        chunk_size: u32,
    },

    /// Private answer to a Fetch (server → client)
    FetchResponse { start: u32, end: u32, bytes: Bytes },
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::Data { .. } => CommandType::Data,
            Command::Fetch { .. } => CommandType::Fetch,
            Command::Stats { .. } => CommandType::Stats,
            Command::Cursor { .. } => CommandType::Cursor,
            Command::ToggleDebug { .. } => CommandType::ToggleDebug,
            Command::Debug { .. } => CommandType::Debug,
            Command::FetchResponse { .. } => CommandType::FetchResponse,
        }
    }

    /// Size of the encoded payload, excluding the tag byte
    pub fn payload_len(&self) -> usize {
        match self {
            Command::Data { bytes, .. } | Command::FetchResponse { bytes, .. } => 8 + bytes.len(),
            Command::Fetch { .. } | Command::Cursor { .. } => 8,
            Command::Stats { .. } | Command::ToggleDebug { .. } => 4,
            Command::Debug { .. } => 16,
        }
    }
}

/// Outcome of decoding one frame
///
/// Unknown tags and malformed payloads decode to `NoCommand`, which callers
/// drop silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Command(Command),
    NoCommand,
}

impl Decoded {
    /// The command, if the frame held one
    pub fn into_command(self) -> Option<Command> {
        match self {
            Decoded::Command(command) => Some(command),
            Decoded::NoCommand => None,
        }
    }
}
