use std::{
    net::SocketAddr,
    sync::{Arc, Mutex, Weak},
};

use log::info;

use idnet_shared::{
    Connection, ConnectionError, LockExt, NetError, Node, NodeId, NodeKind, NodeRef, NodeState,
    Packet,
};

use crate::server::ServerShared;

/// The server-side end of one accepted connection.
///
/// Owned by its Server's client set; the back-reference to the Server is
/// weak, so a RemoteClient never keeps a stopped Server alive.
pub struct RemoteClient {
    id: NodeId,
    server: Weak<ServerShared>,
    connection: Arc<Connection>,
    state: Mutex<NodeState>,
}

impl RemoteClient {
    pub(crate) fn new(id: NodeId, server: Weak<ServerShared>, connection: Arc<Connection>) -> Self {
        Self {
            id,
            server,
            connection,
            state: Mutex::new(NodeState::Connected),
        }
    }

    pub fn state(&self) -> NodeState {
        *self.state.lock_or_recover()
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.connection.peer_addr()
    }

    /// The Server this client connected to, while it still exists
    pub fn server(&self) -> Option<NodeRef> {
        let server: NodeRef = self.server.upgrade()?;
        Some(server)
    }

    pub(crate) fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Closes the connection without touching the server's client set
    pub(crate) fn close(&self) {
        self.connection.close();
        *self.state.lock_or_recover() = NodeState::Closed;
    }
}

impl Node for RemoteClient {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::RemoteClient
    }

    fn send_packet(&self, packet: &Packet) -> Result<(), NetError> {
        Ok(self.connection.send(packet)?)
    }

    fn disconnect(&self) -> Result<(), NetError> {
        {
            let mut state = self.state.lock_or_recover();
            if matches!(*state, NodeState::Closing | NodeState::Closed) {
                return Ok(());
            }
            *state = NodeState::Closing;
        }

        if let Some(server) = self.server.upgrade() {
            server.remove_client(self.id);
        }
        self.close();
        info!("remote client {} ({}) disconnected", self.id, self.peer_addr());
        Ok(())
    }

    fn remote_address(&self) -> Result<SocketAddr, NetError> {
        if !self.state().is_connected() {
            return Err(ConnectionError::NotConnected.into());
        }
        Ok(self.connection.peer_addr())
    }
}
