//! # Idnet Server
//! A TCP server that accepts idnet clients, dispatches their packets by id
//! through the shared Engine and broadcasts packets to every connected
//! client.

#![deny(
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_import_braces
)]

pub mod shared {
    pub use idnet_shared::{
        error_handler_fn, ConnectEvent, Engine, EngineConfig, ErrorHandler, IdRange, NetError,
        Node, NodeId, NodeKind, NodeRef, NodeState, Packet, PacketId,
    };
}

mod error;
mod remote_client;
mod server;

pub use error::ServerError;
pub use remote_client::RemoteClient;
pub use server::{Server, ServerConfig};
