use std::{default::Default, time::Duration};

/// Contains Config properties which will be used by every Connection
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Largest frame body, in bytes, that will be sent or accepted. A peer
    /// announcing a bigger frame is treated as a corrupted stream.
    pub max_frame_len: usize,
    /// Size of the buffer used for each socket read
    pub read_chunk_len: usize,
    /// Longest single wait for the socket to become readable while the rest
    /// of a partial frame is expected. The closed flag is checked between
    /// waits.
    pub retry_interval: Duration,
    /// How long a send may wait for a peer that stopped reading. Once it
    /// passes, the connection is closed and the send fails with
    /// `ConnectionBroken`.
    pub send_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_frame_len: 16 * 1024 * 1024,
            read_chunk_len: 8 * 1024,
            retry_interval: Duration::from_millis(10),
            send_timeout: Duration::from_secs(5),
        }
    }
}
