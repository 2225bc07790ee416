use thiserror::Error;

use idnet_shared::{ConnectionError, NetError};

/// Errors returned by [`Client`](crate::Client) operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// `connect` was called while a connection is up or being set up
    #[error("Client is already connected")]
    AlreadyConnected,

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    /// The Engine refused the new connection, e.g. after shutting down
    #[error(transparent)]
    Net(#[from] NetError),
}
