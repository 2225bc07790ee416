//! # Idnet Client
//! A TCP client that dials an idnet server and exchanges id-routed packets
//! with it through the shared Engine.

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

mod client;
mod client_config;
mod error;

pub use client::Client;
pub use client_config::ClientConfig;
pub use error::ClientError;
