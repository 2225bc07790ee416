use thiserror::Error;

use crate::{Packet, PacketId};

/// Errors that can occur while encoding or decoding packet bodies and frames
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Fewer bytes than the smallest valid body or header
    #[error("Truncated data: got {len} bytes but needed at least {needed}")]
    Truncated { len: usize, needed: usize },

    /// A frame header announced more bytes than the connection accepts
    #[error("Frame of {len} bytes exceeds the maximum frame length of {max} bytes")]
    FrameTooLarge { len: usize, max: usize },

    /// A body too large to describe with the 4-byte length header
    #[error("Encoded packet of {len} bytes cannot be framed with a 4-byte length header")]
    PayloadTooLarge { len: usize },
}

/// Encode/decode boundary for packet bodies.
///
/// The engine wraps every encoded body in a length-prefixed frame, so a codec
/// only has to turn one packet into bytes and back.
pub trait PacketCodec: Send + Sync {
    fn encode(&self, packet: &Packet) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, body: &[u8]) -> Result<Packet, CodecError>;
}

/// Big-endian id followed by the raw payload
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryCodec;

const ID_LEN: usize = std::mem::size_of::<PacketId>();

impl PacketCodec for BinaryCodec {
    fn encode(&self, packet: &Packet) -> Result<Vec<u8>, CodecError> {
        let mut output = Vec::with_capacity(ID_LEN + packet.payload().len());
        output.extend_from_slice(&packet.id().to_be_bytes());
        output.extend_from_slice(packet.payload());
        Ok(output)
    }

    fn decode(&self, body: &[u8]) -> Result<Packet, CodecError> {
        let Some((id_bytes, payload)) = body.split_first_chunk::<ID_LEN>() else {
            return Err(CodecError::Truncated {
                len: body.len(),
                needed: ID_LEN,
            });
        };
        let id = PacketId::from_be_bytes(*id_bytes);
        // ids are validated by the sending side
        Ok(Packet::new_reserved(id, payload))
    }
}
