use thiserror::Error;

use crate::PacketId;

/// Errors raised while constructing packets or handlers, or while drawing ids
/// from the reserved pool. These are programmer errors, not network faults.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketIdError {
    /// The id lies inside a reserved range and no override was given
    #[error("Packet id {id} lies inside a reserved id range. Pick another id or construct the packet with the reserved override")]
    ReservedIdViolation { id: PacketId },

    /// No active reserved range has ids left to hand out
    #[error("No reserved id ranges left to allocate from")]
    IdSpaceExhausted,
}
