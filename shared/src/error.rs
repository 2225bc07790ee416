use thiserror::Error;

use crate::{CodecError, ConnectionError, PacketId, PacketIdError};

/// Every error the engine can report, either to a caller or through the
/// error handlers
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetError {
    /// Connection error
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),

    /// Packet id error
    #[error("Packet id error: {0}")]
    PacketId(#[from] PacketIdError),

    /// Codec error
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// A packet handler reported a failure
    #[error("Handler for packet {packet_id} failed: {message}")]
    Handler { packet_id: PacketId, message: String },

    /// A packet handler panicked; the dispatch loop caught it
    #[error("Handler for packet {packet_id} panicked: {message}")]
    HandlerPanicked { packet_id: PacketId, message: String },
}

impl NetError {
    /// Convenience constructor for handlers reporting their own failures
    pub fn handler(packet_id: PacketId, message: impl Into<String>) -> Self {
        NetError::Handler {
            packet_id,
            message: message.into(),
        }
    }

    /// Whether the connection this error came from can no longer be used
    pub fn is_broken(&self) -> bool {
        matches!(self, NetError::Connection(error) if error.is_broken())
    }
}
