use std::{io, net::SocketAddr};

use thiserror::Error;

use idnet_shared::NetError;

/// Errors returned by [`Server`](crate::Server) operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServerError {
    /// The listening socket could not be set up
    #[error("Failed to bind {addr} ({kind:?}): {message}")]
    Bind {
        addr: SocketAddr,
        kind: io::ErrorKind,
        message: String,
    },

    /// `listen` was called on a server that is already listening
    #[error("Server is already listening")]
    AlreadyListening,

    #[error(transparent)]
    Net(#[from] NetError),
}

impl ServerError {
    pub(crate) fn bind(addr: SocketAddr, error: &io::Error) -> Self {
        ServerError::Bind {
            addr,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}
