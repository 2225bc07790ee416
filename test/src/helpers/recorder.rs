use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use idnet_shared::{Engine, LockExt, NetError, NodeId, NodeKind, NodeRef, Packet, PacketId};

use super::wait_until;

/// One packet as seen by a handler
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Received {
    pub packet_id: PacketId,
    pub payload: Vec<u8>,
    pub sender: NodeId,
    pub sender_kind: NodeKind,
    pub sender_addr: Option<SocketAddr>,
}

/// Packet handler that remembers everything it was given
#[derive(Clone, Default)]
pub struct Recorder {
    received: Arc<Mutex<Vec<Received>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers this recorder as the handler for `id` on `engine`
    pub fn register(&self, engine: &Engine, id: PacketId) {
        let recorder = self.clone();
        engine
            .register_handler(id, move |packet: &Packet, sender: &NodeRef| {
                recorder.record(packet, sender);
                Ok::<(), NetError>(())
            })
            .expect("test handlers use ordinary ids");
    }

    pub fn record(&self, packet: &Packet, sender: &NodeRef) {
        self.received.lock_or_recover().push(Received {
            packet_id: packet.id(),
            payload: packet.payload().to_vec(),
            sender: sender.id(),
            sender_kind: sender.kind(),
            sender_addr: sender.remote_address().ok(),
        });
    }

    pub fn received(&self) -> Vec<Received> {
        self.received.lock_or_recover().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock_or_recover().len()
    }

    /// Waits until at least `count` packets arrived
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.count() >= count)
    }
}
