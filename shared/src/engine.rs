use std::{
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc, Mutex, Weak,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use log::{debug, info, warn};

use crate::{
    sync::LockExt, BinaryCodec, Connection, ConnectionConfig, ConnectionError, DispatchLoop,
    ErrorHandler, ErrorHandlers, HandlerRegistry, IdRange, NetError, NodeId, NodePredicate,
    NodeRef, Packet, PacketCodec, PacketHandler, PacketId, PacketIdError, Registration,
    ReservedIds, INTERNAL_RANGE_FROM, INTERNAL_RANGE_TO,
};

/// Contains Config properties which will be used by an Engine
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Framing and socket settings applied to every Connection
    pub connection: ConnectionConfig,
    /// How long the dispatch worker sleeps after a tick that dispatched
    /// nothing
    pub idle_sleep: Duration,
    /// Ranges reserved when the Engine is created
    pub reserved_ranges: Vec<IdRange>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            idle_sleep: Duration::from_millis(1),
            reserved_ranges: vec![IdRange::new(INTERNAL_RANGE_FROM, INTERNAL_RANGE_TO)],
        }
    }
}

/// The context every Client and Server belongs to.
///
/// Owns the reserved id pool, the packet handlers, the error handlers, the
/// codec and the dispatch worker. Nodes created against different Engines
/// share nothing.
pub struct Engine {
    config: EngineConfig,
    codec: Arc<dyn PacketCodec>,
    reserved: Mutex<ReservedIds>,
    handlers: HandlerRegistry,
    errors: ErrorHandlers,
    dispatch: DispatchLoop,
    worker: Mutex<Option<JoinHandle<()>>>,
    running: AtomicBool,
    next_node_id: AtomicU64,
}

impl Engine {
    /// Creates an Engine using [`BinaryCodec`]
    pub fn new(config: EngineConfig) -> Arc<Self> {
        Self::with_codec(config, Arc::new(BinaryCodec))
    }

    pub fn with_codec(config: EngineConfig, codec: Arc<dyn PacketCodec>) -> Arc<Self> {
        let reserved = ReservedIds::with_ranges(&config.reserved_ranges);
        Arc::new(Self {
            config,
            codec,
            reserved: Mutex::new(reserved),
            handlers: HandlerRegistry::new(),
            errors: ErrorHandlers::new(),
            dispatch: DispatchLoop::new(),
            worker: Mutex::new(None),
            running: AtomicBool::new(true),
            next_node_id: AtomicU64::new(0),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn codec(&self) -> Arc<dyn PacketCodec> {
        self.codec.clone()
    }

    // Packets

    /// Builds an application packet; fails on reserved ids
    pub fn packet(
        &self,
        id: PacketId,
        payload: impl Into<Vec<u8>>,
    ) -> Result<Packet, PacketIdError> {
        Packet::new(&self.reserved.lock_or_recover(), id, payload)
    }

    /// Builds a packet without checking the reserved ranges
    pub fn reserved_packet(&self, id: PacketId, payload: impl Into<Vec<u8>>) -> Packet {
        Packet::new_reserved(id, payload)
    }

    // Reserved ids

    pub fn add_reserved_range(&self, range: IdRange) {
        self.reserved.lock_or_recover().add_range(range);
    }

    pub fn remove_reserved_range(&self, range: IdRange) {
        self.reserved.lock_or_recover().remove_range(&range);
    }

    pub fn is_reserved(&self, id: PacketId) -> bool {
        self.reserved.lock_or_recover().is_reserved(id)
    }

    pub fn allocate_reserved_id(&self) -> Result<PacketId, PacketIdError> {
        self.reserved.lock_or_recover().allocate()
    }

    /// Ranges ids are still allocated from
    pub fn reserved_ranges(&self) -> Vec<IdRange> {
        self.reserved.lock_or_recover().active_ranges().to_vec()
    }

    // Packet handlers

    /// Registers the handler for packets of `id`, replacing any previous one.
    /// Reserved ids are rejected.
    pub fn register_handler<F>(&self, id: PacketId, handler: F) -> Result<(), PacketIdError>
    where
        F: Fn(&Packet, &NodeRef) -> Result<(), NetError> + Send + Sync + 'static,
    {
        self.register_packet_handler(id, Arc::new(handler))
    }

    /// Registers a handler even if `id` is reserved
    pub fn register_reserved_handler<F>(&self, id: PacketId, handler: F)
    where
        F: Fn(&Packet, &NodeRef) -> Result<(), NetError> + Send + Sync + 'static,
    {
        self.handlers.register_reserved(id, Arc::new(handler));
    }

    /// Like [`register_handler`](Engine::register_handler), for handler types
    /// other than closures
    pub fn register_packet_handler(
        &self,
        id: PacketId,
        handler: Arc<dyn PacketHandler>,
    ) -> Result<(), PacketIdError> {
        self.handlers
            .register(&self.reserved.lock_or_recover(), id, handler)
    }

    pub fn unregister_handler(&self, id: PacketId) -> bool {
        self.handlers.unregister(id)
    }

    pub fn has_handler(&self, id: PacketId) -> bool {
        self.handlers.contains(id)
    }

    // Error handlers

    /// Handles errors coming from the node with this id
    pub fn register_node_error_handler(&self, node: NodeId, handler: Arc<dyn ErrorHandler>) {
        self.errors.register_node(node, handler);
    }

    pub fn unregister_node_error_handlers(&self, node: NodeId) {
        self.errors.unregister_node(node);
    }

    /// Handles errors coming from every node `predicate` accepts
    pub fn register_dynamic_error_handler<P>(&self, predicate: P, handlers: Vec<Arc<dyn ErrorHandler>>)
    where
        P: Fn(&NodeRef) -> bool + Send + Sync + 'static,
    {
        let predicate: NodePredicate = Arc::new(predicate);
        self.errors.register_dynamic(predicate, handlers);
    }

    /// Handles errors no other handler matched, and errors of unknown origin
    pub fn register_unknown_error_handler(&self, handler: Arc<dyn ErrorHandler>) {
        self.errors.register_unknown(handler);
    }

    /// Routes a runtime error to the error handlers
    pub fn report_error(&self, error: &NetError, node: Option<&NodeRef>) -> bool {
        self.errors.report(error, node)
    }

    // Nodes & dispatch

    pub fn next_node_id(&self) -> NodeId {
        NodeId::from_u64(self.next_node_id.fetch_add(1, Ordering::SeqCst))
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of connections the dispatch worker currently services
    pub fn connection_count(&self) -> usize {
        self.dispatch.len()
    }

    /// Hands a freshly opened connection to the dispatch worker, starting the
    /// worker on first use. Fails once the Engine has shut down.
    pub fn register_connection(
        self: &Arc<Self>,
        node: NodeRef,
        connection: Arc<Connection>,
    ) -> Result<(), NetError> {
        let mut worker = self.worker.lock_or_recover();
        if !self.is_running() {
            connection.close();
            return Err(ConnectionError::Closed {
                addr: connection.peer_addr(),
            }
            .into());
        }

        self.dispatch.register(Registration::new(node, connection));

        if worker.is_none() {
            let engine = Arc::downgrade(self);
            let handle = thread::Builder::new()
                .name("idnet-dispatch".to_string())
                .spawn(move || run_worker(engine))
                .map_err(|error| ConnectionError::io(&error))?;
            debug!("dispatch worker started");
            *worker = Some(handle);
        }

        Ok(())
    }

    /// Services every registered connection once. Returns whether a packet
    /// was dispatched.
    pub(crate) fn tick(&self) -> bool {
        self.dispatch.tick(&self.handlers, &self.errors)
    }

    /// Stops the dispatch worker and disconnects every registered
    /// connection. Accept loops notice through
    /// [`is_running`](Engine::is_running) and exit. Calling it twice is a
    /// no-op.
    pub fn shutdown(&self) {
        let handle = {
            let mut worker = self.worker.lock_or_recover();
            if !self.running.swap(false, Ordering::SeqCst) {
                return;
            }
            worker.take()
        };

        if let Some(handle) = handle {
            if handle.thread().id() != thread::current().id() && handle.join().is_err() {
                warn!("dispatch worker panicked");
            }
        }

        self.dispatch.close_all(&self.errors);
        info!("engine shut down");
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        // the worker only holds a Weak, so it exits on its next tick
        self.running.store(false, Ordering::SeqCst);
        self.dispatch.close_all(&self.errors);
    }
}

fn run_worker(engine: Weak<Engine>) {
    loop {
        let Some(engine) = engine.upgrade() else {
            break;
        };
        if !engine.is_running() {
            break;
        }
        let dispatched = engine.tick();
        let idle_sleep = engine.config.idle_sleep;
        drop(engine);

        if !dispatched {
            thread::sleep(idle_sleep);
        }
    }
    debug!("dispatch worker stopped");
}
