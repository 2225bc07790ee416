use std::{
    io,
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    sync::{Arc, Mutex, Weak},
    time::Duration,
};

use log::{debug, info};

use idnet_shared::{
    ConnectEvent, ConnectSlot, Connection, ConnectionError, Engine, ErrorHandler, LockExt,
    NetError, Node, NodeId, NodeKind, NodeRef, NodeState, Packet,
};

use crate::{ClientConfig, ClientError};

/// Client can dial a Server and send/receive packets over the resulting
/// connection. Incoming packets are dispatched by the Engine's handlers.
///
/// A disconnected Client may connect again. Dropping it disconnects.
pub struct Client {
    inner: Arc<ClientShared>,
}

impl Client {
    /// Create a new Client
    pub fn new(engine: &Arc<Engine>, config: ClientConfig) -> Self {
        let inner = Arc::new_cyclic(|this| ClientShared {
            id: engine.next_node_id(),
            this: this.clone(),
            engine: engine.clone(),
            config,
            connection: Mutex::new(None),
            state: Mutex::new(NodeState::Disconnected),
            on_connect: ConnectSlot::new(),
        });
        Self { inner }
    }

    /// Connects to `host:port` within the configured connect timeout.
    /// Returns the address that accepted the connection.
    pub fn connect(&self, host: &str, port: u16) -> Result<SocketAddr, ClientError> {
        let timeout = self.inner.config.connect_timeout;
        self.inner.connect(host, port, timeout)
    }

    /// Like [`connect`](Client::connect) with an explicit timeout; a zero
    /// timeout means no timeout
    pub fn connect_timeout(
        &self,
        host: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<SocketAddr, ClientError> {
        let timeout = if timeout.is_zero() {
            None
        } else {
            Some(timeout)
        };
        self.inner.connect(host, port, timeout)
    }

    /// Closes the connection. Calling it again is a no-op.
    pub fn disconnect(&self) {
        self.inner.close();
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn state(&self) -> NodeState {
        *self.inner.state.lock_or_recover()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Local address of the live connection
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner
            .connection
            .lock_or_recover()
            .as_ref()
            .map(|connection| connection.local_addr())
    }

    /// This client as a Node, the way handlers and events see it
    pub fn as_node(&self) -> NodeRef {
        self.inner.clone()
    }

    /// Replaces the callback fired with `(client, client)` once a connection
    /// is established
    pub fn set_on_connect(&self, event: Option<ConnectEvent>) {
        self.inner.on_connect.set(event);
    }

    /// Runs `event` after the callbacks already set
    pub fn add_on_connect(&self, event: ConnectEvent) {
        self.inner.on_connect.add(event);
    }

    /// Handles errors raised while serving this client's connection
    pub fn add_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        self.inner
            .engine
            .register_node_error_handler(self.inner.id, handler);
    }
}

impl Node for Client {
    fn id(&self) -> NodeId {
        self.inner.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Client
    }

    fn send_packet(&self, packet: &Packet) -> Result<(), NetError> {
        self.inner.send_packet(packet)
    }

    fn disconnect(&self) -> Result<(), NetError> {
        self.inner.close();
        Ok(())
    }

    fn remote_address(&self) -> Result<SocketAddr, NetError> {
        self.inner.remote_address()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.inner.close();
    }
}

struct ClientShared {
    id: NodeId,
    this: Weak<ClientShared>,
    engine: Arc<Engine>,
    config: ClientConfig,
    connection: Mutex<Option<Arc<Connection>>>,
    state: Mutex<NodeState>,
    on_connect: ConnectSlot,
}

impl ClientShared {
    fn connect(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<SocketAddr, ClientError> {
        {
            let mut state = self.state.lock_or_recover();
            if matches!(*state, NodeState::Connecting | NodeState::Connected) {
                return Err(ClientError::AlreadyConnected);
            }
            *state = NodeState::Connecting;
        }

        let result = self
            .dial(host, port, timeout)
            .and_then(|stream| self.attach(stream));
        if result.is_err() {
            *self.state.lock_or_recover() = NodeState::Disconnected;
        }
        result
    }

    /// Tries every address `host` resolves to and returns the first stream
    /// that connects
    fn dial(
        &self,
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<TcpStream, ClientError> {
        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|error| ConnectionError::HostResolution {
                host: host.to_string(),
                reason: error.to_string(),
            })?;

        let mut last_error = ConnectionError::HostResolution {
            host: host.to_string(),
            reason: "no addresses found".to_string(),
        };
        for addr in addrs {
            let attempt = match timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => return Ok(stream),
                Err(error) => {
                    debug!("client {}: connecting to {} failed: {}", self.id, addr, error);
                    last_error = connect_error(addr, timeout, &error);
                }
            }
        }

        Err(last_error.into())
    }

    fn attach(&self, stream: TcpStream) -> Result<SocketAddr, ClientError> {
        let connection = Arc::new(Connection::open(
            stream,
            &self.engine.config().connection,
            self.engine.codec(),
        )?);
        let peer_addr = connection.peer_addr();
        let node: NodeRef = self
            .this
            .upgrade()
            .ok_or(ConnectionError::Closed { addr: peer_addr })?;

        *self.connection.lock_or_recover() = Some(connection.clone());
        *self.state.lock_or_recover() = NodeState::Connected;
        info!("client {} connected to {}", self.id, peer_addr);

        // runs before the first packet can be dispatched
        self.on_connect.fire(&node, &node);

        if let Err(error) = self.engine.register_connection(node, connection) {
            self.close();
            return Err(error.into());
        }
        Ok(peer_addr)
    }

    fn close(&self) {
        self.close_matching(None);
    }

    /// Closes the live connection; with `expected` set, only if that is the
    /// live one
    fn close_matching(&self, expected: Option<&Arc<Connection>>) {
        let connection = {
            let mut state = self.state.lock_or_recover();
            if *state != NodeState::Connected {
                return;
            }
            let mut live = self.connection.lock_or_recover();
            if let Some(expected) = expected {
                match live.as_ref() {
                    Some(connection) if Arc::ptr_eq(connection, expected) => {}
                    _ => return,
                }
            }
            *state = NodeState::Closing;
            live.take()
        };

        if let Some(connection) = connection {
            connection.close();
            info!("client {} disconnected from {}", self.id, connection.peer_addr());
        }
        *self.state.lock_or_recover() = NodeState::Closed;
    }

    fn live_connection(&self) -> Result<Arc<Connection>, ConnectionError> {
        self.connection
            .lock_or_recover()
            .clone()
            .ok_or(ConnectionError::NotConnected)
    }

    fn send_packet(&self, packet: &Packet) -> Result<(), NetError> {
        Ok(self.live_connection()?.send(packet)?)
    }

    fn remote_address(&self) -> Result<SocketAddr, NetError> {
        Ok(self.live_connection()?.peer_addr())
    }
}

impl Node for ClientShared {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Client
    }

    fn send_packet(&self, packet: &Packet) -> Result<(), NetError> {
        ClientShared::send_packet(self, packet)
    }

    fn disconnect(&self) -> Result<(), NetError> {
        self.close();
        Ok(())
    }

    fn remote_address(&self) -> Result<SocketAddr, NetError> {
        ClientShared::remote_address(self)
    }

    fn connection_closed(&self, connection: &Arc<Connection>) -> Result<(), NetError> {
        self.close_matching(Some(connection));
        Ok(())
    }
}

fn connect_error(addr: SocketAddr, timeout: Option<Duration>, error: &io::Error) -> ConnectionError {
    match error.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => ConnectionError::ConnectTimeout {
            addr,
            timeout_ms: timeout
                .map(|timeout| u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
                .unwrap_or(0),
        },
        io::ErrorKind::ConnectionRefused => ConnectionError::ConnectionRefused { addr },
        _ => ConnectionError::io(error),
    }
}
