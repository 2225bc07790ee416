use std::{io, net::SocketAddr};

use thiserror::Error;

use crate::CodecError;

/// Errors raised while establishing a connection or moving packets over it
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// The host name could not be resolved to any socket address
    #[error("Could not resolve host {host:?}: {reason}")]
    HostResolution { host: String, reason: String },

    /// The TCP handshake did not complete in time
    #[error("Connecting to {addr} timed out after {timeout_ms}ms")]
    ConnectTimeout { addr: SocketAddr, timeout_ms: u64 },

    /// Nothing is listening at the remote address
    #[error("Connection to {addr} was refused")]
    ConnectionRefused { addr: SocketAddr },

    /// The peer reset or closed the connection while we were using it
    #[error("Connection to {addr} is broken (peer reset or closed it)")]
    ConnectionBroken { addr: SocketAddr },

    /// Bytes received from the peer could not be turned into a packet
    #[error("Corrupted network stream from {addr}: {source}")]
    CorruptStream { addr: SocketAddr, source: CodecError },

    /// A packet could not be encoded for sending
    #[error("Failed to encode packet: {0}")]
    Encode(CodecError),

    /// The node has no live connection
    #[error("Not connected to a remote node")]
    NotConnected,

    /// The connection was closed locally
    #[error("Connection to {addr} is closed")]
    Closed { addr: SocketAddr },

    /// Any other I/O failure
    #[error("I/O error ({kind:?}): {message}")]
    Io { kind: io::ErrorKind, message: String },
}

impl ConnectionError {
    pub fn io(error: &io::Error) -> Self {
        ConnectionError::Io {
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    /// Maps an error from an established stream, recognising the kinds that
    /// mean the peer went away
    pub fn from_stream_io(addr: SocketAddr, error: &io::Error) -> Self {
        if is_broken_kind(error.kind()) {
            ConnectionError::ConnectionBroken { addr }
        } else {
            Self::io(error)
        }
    }

    /// Whether this error means the connection can no longer be used
    pub fn is_broken(&self) -> bool {
        matches!(
            self,
            ConnectionError::ConnectionBroken { .. } | ConnectionError::Closed { .. }
        )
    }
}

pub(crate) fn is_broken_kind(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}
