//! Network Module
//!
//! WebSocket transport in front of the session layer.
//!
//! ## Architecture
//! - Single acceptor task
//! - One task per connection, all on the same current-thread runtime
//! - Frames routed through the connection's Document
//! - Fatal storage failures from any task stop the server

mod server;
mod connection;

pub use server::Server;
pub use connection::{room_from_path, Connection};
