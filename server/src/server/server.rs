use std::{
    io,
    mem,
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, Weak,
    },
    thread::{self, JoinHandle},
};

use log::{debug, info, warn};
use mio::{Events, Interest, Poll, Token, Waker};

use idnet_shared::{
    ConnectEvent, ConnectSlot, Connection, ConnectionError, Engine, ErrorHandler, LockExt,
    NetError, Node, NodeId, NodeKind, NodeRef, NodeState, Packet,
};

use crate::{RemoteClient, ServerConfig, ServerError};

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);

/// The running accept thread and the handle that interrupts its wait
struct Acceptor {
    handle: JoinHandle<()>,
    waker: Arc<Waker>,
}

/// A TCP server that accepts clients, hands their packets to the Engine's
/// handlers and broadcasts packets to all of them.
///
/// Dropping the Server stops listening and disconnects every client.
pub struct Server {
    inner: Arc<ServerShared>,
}

impl Server {
    /// Create a new Server
    pub fn new(engine: &Arc<Engine>, config: ServerConfig) -> Self {
        let inner = Arc::new_cyclic(|this| ServerShared {
            id: engine.next_node_id(),
            this: this.clone(),
            engine: engine.clone(),
            config,
            clients: Mutex::new(Vec::new()),
            state: Mutex::new(NodeState::Disconnected),
            local_addr: Mutex::new(None),
            listening: AtomicBool::new(false),
            acceptor: Mutex::new(None),
            on_connect: ConnectSlot::new(),
        });
        Self { inner }
    }

    /// Binds `port` on the configured address and starts accepting clients.
    /// Port 0 picks a free port; the bound address is returned.
    pub fn listen(&self, port: u16) -> Result<SocketAddr, ServerError> {
        self.inner.listen(port)
    }

    /// Disconnects every client and releases the listening socket before
    /// returning. Calling it again is a no-op.
    pub fn disconnect(&self) {
        self.inner.stop();
    }

    /// Sends a packet to every connected client
    pub fn broadcast(&self, packet: &Packet) -> Result<(), NetError> {
        self.inner.broadcast(packet)
    }

    pub fn id(&self) -> NodeId {
        self.inner.id
    }

    pub fn state(&self) -> NodeState {
        *self.inner.state.lock_or_recover()
    }

    pub fn is_listening(&self) -> bool {
        self.inner.listening.load(Ordering::SeqCst)
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.local_addr.lock_or_recover()
    }

    pub fn clients(&self) -> Vec<Arc<RemoteClient>> {
        self.inner.clients.lock_or_recover().clone()
    }

    pub fn client_count(&self) -> usize {
        self.inner.clients.lock_or_recover().len()
    }

    /// This server as a Node, the way handlers and events see it
    pub fn as_node(&self) -> NodeRef {
        self.inner.clone()
    }

    /// Replaces the callback fired with `(server, new remote client)` for
    /// every accepted connection
    pub fn set_on_connect(&self, event: Option<ConnectEvent>) {
        self.inner.on_connect.set(event);
    }

    /// Runs `event` after the callbacks already set
    pub fn add_on_connect(&self, event: ConnectEvent) {
        self.inner.on_connect.add(event);
    }

    /// Handles errors that happen on the accept loop
    pub fn add_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        self.inner
            .engine
            .register_node_error_handler(self.inner.id, handler);
    }
}

impl Node for Server {
    fn id(&self) -> NodeId {
        self.inner.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Server
    }

    fn send_packet(&self, packet: &Packet) -> Result<(), NetError> {
        self.inner.broadcast(packet)
    }

    fn disconnect(&self) -> Result<(), NetError> {
        self.inner.stop();
        Ok(())
    }

    fn remote_address(&self) -> Result<SocketAddr, NetError> {
        self.inner.remote_address()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.inner.stop();
    }
}

pub(crate) struct ServerShared {
    id: NodeId,
    this: Weak<ServerShared>,
    engine: Arc<Engine>,
    config: ServerConfig,
    clients: Mutex<Vec<Arc<RemoteClient>>>,
    state: Mutex<NodeState>,
    local_addr: Mutex<Option<SocketAddr>>,
    listening: AtomicBool,
    acceptor: Mutex<Option<Acceptor>>,
    on_connect: ConnectSlot,
}

impl ServerShared {
    fn listen(&self, port: u16) -> Result<SocketAddr, ServerError> {
        let mut acceptor = self.acceptor.lock_or_recover();
        if acceptor.is_some() {
            return Err(ServerError::AlreadyListening);
        }

        let addr = SocketAddr::new(self.config.bind_address, port);
        let listener = TcpListener::bind(addr).map_err(|error| ServerError::bind(addr, &error))?;
        listener
            .set_nonblocking(true)
            .map_err(|error| ServerError::bind(addr, &error))?;
        let local_addr = listener
            .local_addr()
            .map_err(|error| ServerError::bind(addr, &error))?;

        let poll = Poll::new().map_err(|error| io_failure(&error))?;
        let mut readiness = listener
            .try_clone()
            .map(mio::net::TcpListener::from_std)
            .map_err(|error| io_failure(&error))?;
        poll.registry()
            .register(&mut readiness, LISTENER, Interest::READABLE)
            .map_err(|error| io_failure(&error))?;
        let waker = Waker::new(poll.registry(), WAKER)
            .map(Arc::new)
            .map_err(|error| io_failure(&error))?;

        *self.local_addr.lock_or_recover() = Some(local_addr);
        self.listening.store(true, Ordering::SeqCst);

        let server = self.this.clone();
        let wakeups = AcceptWakeups {
            poll,
            readiness,
            events: Events::with_capacity(self.config.accept_events_capacity.max(1)),
        };
        let spawned = thread::Builder::new()
            .name(format!("idnet-accept-{}", local_addr.port()))
            .spawn(move || accept_loop(server, listener, wakeups));
        let handle = match spawned {
            Ok(handle) => handle,
            Err(error) => {
                self.listening.store(false, Ordering::SeqCst);
                *self.local_addr.lock_or_recover() = None;
                return Err(io_failure(&error));
            }
        };

        *acceptor = Some(Acceptor { handle, waker });
        *self.state.lock_or_recover() = NodeState::Connected;
        info!("server {} listening on {}", self.id, local_addr);
        Ok(local_addr)
    }

    /// Stops accepting, then disconnects every client
    fn stop(&self) {
        {
            let mut state = self.state.lock_or_recover();
            if *state != NodeState::Connected {
                return;
            }
            *state = NodeState::Closing;
        }

        self.listening.store(false, Ordering::SeqCst);
        let acceptor = self.acceptor.lock_or_recover().take();
        if let Some(Acceptor { handle, waker }) = acceptor {
            if let Err(error) = waker.wake() {
                warn!("could not wake accept thread of server {}: {}", self.id, error);
            }
            // the listener is released once the accept thread exits
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("accept thread of server {} panicked", self.id);
            }
        }

        let clients = mem::take(&mut *self.clients.lock_or_recover());
        for client in &clients {
            client.close();
        }

        *self.local_addr.lock_or_recover() = None;
        *self.state.lock_or_recover() = NodeState::Closed;
        info!(
            "server {} stopped, {} client(s) disconnected",
            self.id,
            clients.len()
        );
    }

    /// Sends to every client under the client-set lock. Clients whose
    /// connection is gone are dropped; the first other failure is returned
    /// once everyone else was served.
    fn broadcast(&self, packet: &Packet) -> Result<(), NetError> {
        if !self.listening.load(Ordering::SeqCst) {
            return Err(ConnectionError::NotConnected.into());
        }

        let mut failure = None;
        self.clients.lock_or_recover().retain(|client| {
            match client.connection().send(packet) {
                Ok(()) => true,
                Err(error) if error.is_broken() => {
                    debug!("dropping client {} from broadcast: {}", client.id(), error);
                    client.close();
                    false
                }
                Err(error) => {
                    warn!("broadcast to client {} failed: {}", client.id(), error);
                    if failure.is_none() {
                        failure = Some(error);
                    }
                    true
                }
            }
        });

        match failure {
            Some(error) => Err(error.into()),
            None => Ok(()),
        }
    }

    pub(crate) fn remove_client(&self, id: NodeId) {
        self.clients
            .lock_or_recover()
            .retain(|client| client.id() != id);
    }

    fn remote_address(&self) -> Result<SocketAddr, NetError> {
        self.local_addr
            .lock_or_recover()
            .ok_or_else(|| ConnectionError::NotConnected.into())
    }

    fn node(&self) -> Option<NodeRef> {
        let node: NodeRef = self.this.upgrade()?;
        Some(node)
    }

    fn should_accept(&self) -> bool {
        self.listening.load(Ordering::SeqCst) && self.engine.is_running()
    }

    fn accept(&self, stream: TcpStream, addr: SocketAddr) {
        let connection = match Connection::open(
            stream,
            &self.engine.config().connection,
            self.engine.codec(),
        ) {
            Ok(connection) => Arc::new(connection),
            Err(error) => {
                self.report(error.into());
                return;
            }
        };

        let client = Arc::new(RemoteClient::new(
            self.engine.next_node_id(),
            self.this.clone(),
            connection.clone(),
        ));
        self.clients.lock_or_recover().push(client.clone());
        info!("server {} accepted {} as {}", self.id, addr, client.id());

        // runs before the first packet from this client can be dispatched
        let client_node: NodeRef = client.clone();
        if let Some(server_node) = self.node() {
            self.on_connect.fire(&server_node, &client_node);
        }

        if let Err(error) = self.engine.register_connection(client_node, connection) {
            self.remove_client(client.id());
            client.close();
            self.report(error);
        }
    }

    fn report(&self, error: NetError) {
        warn!("server {}: {}", self.id, error);
        let node = self.node();
        self.engine.report_error(&error, node.as_ref());
    }
}

impl Node for ServerShared {
    fn id(&self) -> NodeId {
        self.id
    }

    fn kind(&self) -> NodeKind {
        NodeKind::Server
    }

    fn send_packet(&self, packet: &Packet) -> Result<(), NetError> {
        self.broadcast(packet)
    }

    fn disconnect(&self) -> Result<(), NetError> {
        self.stop();
        Ok(())
    }

    fn remote_address(&self) -> Result<SocketAddr, NetError> {
        ServerShared::remote_address(self)
    }
}

/// What the accept thread blocks on: a readiness view of the listener and
/// the Waker used by [`ServerShared::stop`]
struct AcceptWakeups {
    poll: Poll,
    readiness: mio::net::TcpListener,
    events: Events,
}

fn accept_loop(server: Weak<ServerShared>, listener: TcpListener, mut wakeups: AcceptWakeups) {
    'serve: loop {
        let Some(current) = server.upgrade() else {
            break;
        };
        let interval = current.config.accept_poll_interval;
        drop(current);

        if let Err(error) = wakeups.poll.poll(&mut wakeups.events, Some(interval)) {
            if error.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            if let Some(server) = server.upgrade() {
                if server.should_accept() {
                    server.report(ConnectionError::io(&error).into());
                }
            }
            break;
        }

        let Some(server) = server.upgrade() else {
            break;
        };
        if !server.should_accept() {
            break;
        }

        // drained on every wakeup, so a missed edge is picked up on the next one
        loop {
            match listener.accept() {
                Ok((stream, addr)) => server.accept(stream, addr),
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    if !server.should_accept() {
                        break 'serve;
                    }
                    server.report(ConnectionError::io(&error).into());
                    break;
                }
            }
        }
    }

    if let Err(error) = wakeups.poll.registry().deregister(&mut wakeups.readiness) {
        debug!("deregistering listener failed: {}", error);
    }
    if let Ok(addr) = listener.local_addr() {
        debug!("accept loop on {} stopped", addr);
    }
}

fn io_failure(error: &io::Error) -> ServerError {
    NetError::from(ConnectionError::io(error)).into()
}
