use std::{
    any::Any,
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex},
};

use log::{debug, warn};

use crate::{
    sync::LockExt, Connection, ErrorHandlers, HandlerRegistry, NetError, NodeRef, Packet,
};

/// A live connection together with the node that owns it
#[derive(Clone)]
pub struct Registration {
    pub node: NodeRef,
    pub connection: Arc<Connection>,
}

impl Registration {
    pub fn new(node: NodeRef, connection: Arc<Connection>) -> Self {
        Self { node, connection }
    }
}

/// The set of connections waiting for packets, and the tick that services
/// them. The Engine drives [`tick`](DispatchLoop::tick) from its worker
/// thread.
#[derive(Default)]
pub struct DispatchLoop {
    pending: Mutex<Vec<Registration>>,
}

impl DispatchLoop {
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Adds a connection; it is serviced from the next tick on
    pub fn register(&self, registration: Registration) {
        self.pending.lock_or_recover().push(registration);
    }

    pub fn len(&self) -> usize {
        self.pending.lock_or_recover().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Services every pending connection once, in registration order, and
    /// reads at most one packet from each. Returns whether any packet was
    /// dispatched.
    pub fn tick(&self, handlers: &HandlerRegistry, errors: &ErrorHandlers) -> bool {
        let snapshot = self.pending.lock_or_recover().clone();
        let mut dispatched = false;

        for registration in &snapshot {
            let Registration { node, connection } = registration;

            if connection.is_closed() {
                debug!("evicting closed connection to {}", connection.peer_addr());
                Self::release_node(registration, errors);
                self.evict(connection);
                continue;
            }

            match connection.poll() {
                Ok(true) => {}
                Ok(false) => {
                    if connection.is_closed() {
                        Self::release_node(registration, errors);
                        self.evict(connection);
                    }
                    continue;
                }
                Err(error) => {
                    self.fail(registration, error.into(), errors);
                    continue;
                }
            }

            let packet = match connection.read_packet() {
                Ok(packet) => packet,
                Err(error) => {
                    self.fail(registration, error.into(), errors);
                    continue;
                }
            };
            dispatched = true;

            if let Err(error) = Self::run_handler(handlers, &packet, node) {
                warn!("packet {} from {:?} failed: {}", packet.id(), node, error);
                errors.report(&error, Some(node));
            }
        }

        dispatched
    }

    /// Empties the pending set, disconnecting every owning node
    pub fn close_all(&self, errors: &ErrorHandlers) {
        let drained: Vec<Registration> = self.pending.lock_or_recover().drain(..).collect();
        for registration in &drained {
            registration.connection.close();
            Self::release_node(registration, errors);
        }
    }

    fn run_handler(
        handlers: &HandlerRegistry,
        packet: &Packet,
        sender: &NodeRef,
    ) -> Result<(), NetError> {
        match panic::catch_unwind(AssertUnwindSafe(|| handlers.dispatch(packet, sender))) {
            Ok(result) => result,
            Err(payload) => Err(NetError::HandlerPanicked {
                packet_id: packet.id(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }

    /// A read-side failure: report it, then drop the node
    fn fail(&self, registration: &Registration, error: NetError, errors: &ErrorHandlers) {
        warn!("connection to {:?} failed: {}", registration.node, error);
        errors.report(&error, Some(&registration.node));
        registration.connection.close();
        Self::release_node(registration, errors);
        self.evict(&registration.connection);
    }

    /// Tells the owning node its connection is gone
    fn release_node(registration: &Registration, errors: &ErrorHandlers) {
        let Registration { node, connection } = registration;
        if let Err(error) = node.connection_closed(connection) {
            errors.report(&error, Some(node));
        }
    }

    fn evict(&self, connection: &Arc<Connection>) {
        self.pending
            .lock_or_recover()
            .retain(|registration| !Arc::ptr_eq(&registration.connection, connection));
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
