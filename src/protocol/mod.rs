//! Protocol Module
//!
//! Defines the binary wire protocol exchanged with clients.
//!
//! ## Frame Format
//! ```text
//! ┌──────────┬──────────────────────────────────────┐
//! │ Tag (1)  │     Fixed-layout payload             │
//! └──────────┴──────────────────────────────────────┘
//! ```
//! Integers are big-endian u32. There is no length prefix: the transport
//! delivers whole messages.
//!
//! ### Commands
//! - 0: DATA           - start, end, bytes (rest)
//! - 1: FETCH          - offset, len                       (client → server)
//! - 2: STATS          - client count                      (server → client)
//! - 3: CURSOR         - pos [, sender id]
//! - 4: TOGGLE_DEBUG   - value (0 = off)                   (client → server)
//! - 5: DEBUG          - length, chunks, loaded, chunk size (server → client)
//! - 6: FETCH_RESPONSE - start, end, bytes (rest)          (server → client)

mod command;
mod codec;

pub use command::{Command, CommandType, Decoded};
pub use codec::{decode_command, encode_command, try_decode_command, TAG_SIZE};
