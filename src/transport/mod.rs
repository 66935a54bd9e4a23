//! The `transport` module is responsible for the network side of a session.
//!
//! It defines the JSON frames exchanged with the broker and implements the
//! WebSocket connection, including the login handshake.

pub mod message;
pub mod websocket;

pub use message::{ClientFrame, ServerFrame};
pub use websocket::{Inbound, WsStream};

#[cfg(test)]
mod tests;
