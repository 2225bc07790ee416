//! # Idnet Shared
//! Common functionality shared between idnet-server & idnet-client crates:
//! packet ids, framing, connections, handlers and the dispatch engine.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod codec;
mod connection;
mod dispatch;
mod engine;
mod error;
mod events;
mod handler;
mod ids;
mod node;
mod packet;
mod sync;
mod types;

pub use codec::{BinaryCodec, CodecError, PacketCodec};
pub use connection::{
    connection::Connection,
    connection_config::ConnectionConfig,
    decoder::Decoder,
    encoder::{Encoder, FRAME_HEADER_LEN},
    error::ConnectionError,
};
pub use dispatch::{DispatchLoop, Registration};
pub use engine::{Engine, EngineConfig};
pub use error::NetError;
pub use events::{
    connect_event::{ConnectEvent, ConnectSlot},
    error_event::{error_handler_fn, ErrorHandler, ErrorHandlers, NodePredicate},
};
pub use handler::{HandlerRegistry, PacketHandler};
pub use ids::{
    error::PacketIdError,
    id_range::IdRange,
    reserved_ids::{ReservedIds, INTERNAL_RANGE_FROM, INTERNAL_RANGE_TO},
};
pub use node::{Node, NodeKind, NodeRef, NodeState};
pub use packet::Packet;
pub use sync::{LockExt, RwLockExt};
pub use types::{NodeId, PacketId};
