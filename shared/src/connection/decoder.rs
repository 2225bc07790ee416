use crate::CodecError;

use super::encoder::FRAME_HEADER_LEN;

/// Accumulates stream bytes and cuts them into frame bodies.
///
/// Only the fixed-size header is inspected to tell whether a whole frame is
/// buffered; bodies are handed out untouched for the codec to decode.
#[derive(Clone, Debug)]
pub struct Decoder {
    buffer: Vec<u8>,
    max_frame_len: usize,
}

impl Decoder {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame_len,
        }
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Body length announced by the frame at the front, if its header is in
    fn announced_len(&self) -> Result<Option<usize>, CodecError> {
        let Some(header) = self.buffer.first_chunk::<FRAME_HEADER_LEN>() else {
            return Ok(None);
        };
        let len = u32::from_be_bytes(*header) as usize;
        if len > self.max_frame_len {
            return Err(CodecError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        Ok(Some(len))
    }

    /// Whether a complete frame is buffered at the front
    pub fn has_frame(&self) -> Result<bool, CodecError> {
        Ok(match self.announced_len()? {
            Some(len) => self.buffer.len() >= FRAME_HEADER_LEN + len,
            None => false,
        })
    }

    /// Removes and returns the body of the front frame, if it is complete
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>, CodecError> {
        let Some(len) = self.announced_len()? else {
            return Ok(None);
        };
        let end = FRAME_HEADER_LEN + len;
        if self.buffer.len() < end {
            return Ok(None);
        }
        let body = self.buffer[FRAME_HEADER_LEN..end].to_vec();
        self.buffer.drain(..end);
        Ok(Some(body))
    }
}
