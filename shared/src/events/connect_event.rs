use std::sync::{Arc, Mutex};

use crate::{sync::LockExt, NodeRef};

type ConnectFn = dyn Fn(&NodeRef, &NodeRef) + Send + Sync;

/// Callback fired when a connection is established: receives the local node
/// that got connected and the node on the other side (a Client passes itself
/// twice, a Server passes itself and the new RemoteClient).
#[derive(Clone)]
pub struct ConnectEvent {
    callback: Arc<ConnectFn>,
}

impl ConnectEvent {
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&NodeRef, &NodeRef) + Send + Sync + 'static,
    {
        Self {
            callback: Arc::new(callback),
        }
    }

    pub fn fire(&self, connected: &NodeRef, connector: &NodeRef) {
        (self.callback)(connected, connector);
    }

    /// Composes two events into one that runs `self`, then `next`
    pub fn then(self, next: ConnectEvent) -> ConnectEvent {
        ConnectEvent::new(move |connected: &NodeRef, connector: &NodeRef| {
            self.fire(connected, connector);
            next.fire(connected, connector);
        })
    }

    /// Combines two optional events; a missing operand yields the other one
    /// unchanged
    pub fn add(first: Option<ConnectEvent>, second: Option<ConnectEvent>) -> Option<ConnectEvent> {
        match (first, second) {
            (None, second) => second,
            (first, None) => first,
            (Some(first), Some(second)) => Some(first.then(second)),
        }
    }
}

/// The single on-connect slot a Client or Server carries
#[derive(Default)]
pub struct ConnectSlot {
    event: Mutex<Option<ConnectEvent>>,
}

impl ConnectSlot {
    pub fn new() -> Self {
        Self {
            event: Mutex::new(None),
        }
    }

    /// Replaces whatever is in the slot
    pub fn set(&self, event: Option<ConnectEvent>) {
        *self.event.lock_or_recover() = event;
    }

    /// Chains `event` after whatever is already in the slot
    pub fn add(&self, event: ConnectEvent) {
        let mut slot = self.event.lock_or_recover();
        *slot = ConnectEvent::add(slot.take(), Some(event));
    }

    pub fn is_set(&self) -> bool {
        self.event.lock_or_recover().is_some()
    }

    pub fn fire(&self, connected: &NodeRef, connector: &NodeRef) {
        let event = self.event.lock_or_recover().clone();
        if let Some(event) = event {
            event.fire(connected, connector);
        }
    }
}
