use std::{collections::HashMap, sync::Arc, sync::RwLock};

use log::trace;

use crate::{sync::RwLockExt, NetError, NodeRef, Packet, PacketId, PacketIdError, ReservedIds};

/// Reacts to packets of one id. Runs on the dispatch thread, so it must not
/// block for long: every other connection waits while it runs.
pub trait PacketHandler: Send + Sync {
    fn handle(&self, packet: &Packet, sender: &NodeRef) -> Result<(), NetError>;
}

impl<F> PacketHandler for F
where
    F: Fn(&Packet, &NodeRef) -> Result<(), NetError> + Send + Sync,
{
    fn handle(&self, packet: &Packet, sender: &NodeRef) -> Result<(), NetError> {
        self(packet, sender)
    }
}

/// Maps packet ids to their handlers. Registering an id twice replaces the
/// previous handler.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<PacketId, Arc<dyn PacketHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a handler for an ordinary (non-reserved) id
    pub fn register(
        &self,
        reserved: &ReservedIds,
        id: PacketId,
        handler: Arc<dyn PacketHandler>,
    ) -> Result<(), PacketIdError> {
        reserved.check(id)?;
        self.register_reserved(id, handler);
        Ok(())
    }

    /// Registers a handler without checking the reserved ranges
    pub fn register_reserved(&self, id: PacketId, handler: Arc<dyn PacketHandler>) {
        self.handlers.write_or_recover().insert(id, handler);
    }

    pub fn unregister(&self, id: PacketId) -> bool {
        self.handlers.write_or_recover().remove(&id).is_some()
    }

    pub fn contains(&self, id: PacketId) -> bool {
        self.handlers.read_or_recover().contains_key(&id)
    }

    /// Invokes the handler registered for `packet`'s id, if any. Packets
    /// nobody handles are dropped, so peers may send ids we don't know yet.
    pub fn dispatch(&self, packet: &Packet, sender: &NodeRef) -> Result<(), NetError> {
        // release the lock before running user code
        let handler = self.handlers.read_or_recover().get(&packet.id()).cloned();
        match handler {
            Some(handler) => handler.handle(packet, sender),
            None => {
                trace!("dropping packet {} from {:?}: no handler", packet.id(), sender);
                Ok(())
            }
        }
    }
}
