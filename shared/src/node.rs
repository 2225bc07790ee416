use std::{fmt, net::SocketAddr, sync::Arc};

use crate::{Connection, NetError, NodeId, Packet};

/// Which side of a connection a Node stands for
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// A local client dialing a server
    Client,
    /// The server-side end of an accepted connection
    RemoteClient,
    /// A listening server, standing for all of its remote clients
    Server,
}

/// Lifecycle of a Node. Only `Connected` nodes take part in dispatch.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
    Closed,
}

impl NodeState {
    pub fn is_connected(&self) -> bool {
        *self == NodeState::Connected
    }
}

/// Any addressable endpoint capable of sending packets
pub trait Node: Send + Sync {
    /// Identity of this node inside its Engine
    fn id(&self) -> NodeId;

    fn kind(&self) -> NodeKind;

    /// Sends a packet to the remote side; a Server sends to every client
    fn send_packet(&self, packet: &Packet) -> Result<(), NetError>;

    /// Closes this node's connection(s). Calling it again is a no-op.
    fn disconnect(&self) -> Result<(), NetError>;

    /// Address of the remote peer (the bound address for a Server)
    fn remote_address(&self) -> Result<SocketAddr, NetError>;

    /// Called by the dispatch loop when `connection`, registered for this
    /// node, turned out closed. A node that has since moved on to another
    /// connection must leave that one alone.
    fn connection_closed(&self, _connection: &Arc<Connection>) -> Result<(), NetError> {
        self.disconnect()
    }
}

/// Shared handle to a Node, as handed to packet and event handlers
pub type NodeRef = Arc<dyn Node>;

impl fmt::Debug for dyn Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .finish()
    }
}
