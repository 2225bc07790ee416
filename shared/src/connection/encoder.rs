use crate::CodecError;

/// Size of the big-endian length header in front of every frame body
pub const FRAME_HEADER_LEN: usize = 4;

/// Wraps encoded packet bodies in length-prefixed frames
#[derive(Clone, Debug)]
pub struct Encoder {
    max_frame_len: usize,
}

impl Encoder {
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    /// Prefixes `body` with its length
    pub fn encode(&self, body: &[u8]) -> Result<Vec<u8>, CodecError> {
        if body.len() > self.max_frame_len {
            return Err(CodecError::FrameTooLarge {
                len: body.len(),
                max: self.max_frame_len,
            });
        }
        let Ok(len) = u32::try_from(body.len()) else {
            return Err(CodecError::PayloadTooLarge { len: body.len() });
        };

        let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + body.len());
        frame.extend_from_slice(&len.to_be_bytes());
        frame.extend_from_slice(body);
        Ok(frame)
    }
}
