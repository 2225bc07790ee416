/// Numeric id carried by every packet and used to select its handler.
pub type PacketId = i32;

/// Identity of a Node (client, remote client or server) inside one Engine.
#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub fn from_u64(value: u64) -> Self {
        NodeId(value)
    }

    pub fn to_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}
