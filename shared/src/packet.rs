use crate::{ids::error::PacketIdError, PacketId, ReservedIds};

/// An id-tagged unit of application data
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    id: PacketId,
    payload: Vec<u8>,
}

impl Packet {
    /// Creates a packet, rejecting ids that lie inside a reserved range
    pub fn new(
        reserved: &ReservedIds,
        id: PacketId,
        payload: impl Into<Vec<u8>>,
    ) -> Result<Self, PacketIdError> {
        reserved.check(id)?;
        Ok(Self::new_reserved(id, payload))
    }

    /// Creates a packet without checking the reserved ranges.
    ///
    /// Meant for library-internal packets and for packets rebuilt from the
    /// wire, whose ids were validated by the sender.
    pub fn new_reserved(id: PacketId, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id,
            payload: payload.into(),
        }
    }

    pub fn id(&self) -> PacketId {
        self.id
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }
}
