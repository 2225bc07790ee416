use std::{
    io::{self, Read, Write},
    net::{Shutdown, SocketAddr, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::{Duration, Instant},
};

use log::{debug, warn};
use mio::{Events, Interest, Poll, Token};

use crate::{sync::LockExt, ConnectionConfig, Packet, PacketCodec};

use super::{decoder::Decoder, encoder::Encoder, error::ConnectionError};

const SOCKET: Token = Token(0);

/// One direction of the socket, with its own readiness source
struct Half {
    stream: mio::net::TcpStream,
    poll: Poll,
    events: Events,
    interest: Interest,
}

impl Half {
    fn new(stream: &TcpStream, interest: Interest) -> io::Result<Self> {
        let mut stream = mio::net::TcpStream::from_std(stream.try_clone()?);
        let poll = Poll::new()?;
        poll.registry().register(&mut stream, SOCKET, interest)?;
        Ok(Self {
            stream,
            poll,
            events: Events::with_capacity(4),
            interest,
        })
    }

    /// Blocks until the socket reports readiness in this direction or
    /// `timeout` passes. Re-registering first reports readiness that is
    /// already there.
    fn wait(&mut self, timeout: Duration) -> io::Result<()> {
        self.poll
            .registry()
            .reregister(&mut self.stream, SOCKET, self.interest)?;
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Err(error) if error.kind() == io::ErrorKind::Interrupted => Ok(()),
            result => result,
        }
    }
}

struct Incoming {
    half: Half,
    decoder: Decoder,
    scratch: Vec<u8>,
    end_of_stream: bool,
}

/// Owns one TCP socket and the framing state of both directions.
///
/// The socket runs in non-blocking mode: [`poll`](Connection::poll) only
/// drains what the OS already has, and [`send`](Connection::send) waits for
/// writable readiness on backpressure, up to `send_timeout`. Reads and
/// writes are guarded separately, so a handler can reply on the connection
/// it was dispatched from.
pub struct Connection {
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
    incoming: Mutex<Incoming>,
    outgoing: Mutex<Half>,
    control: TcpStream,
    closed: AtomicBool,
    encoder: Encoder,
    codec: Arc<dyn PacketCodec>,
    config: ConnectionConfig,
}

impl Connection {
    /// Takes over a connected stream
    pub fn open(
        stream: TcpStream,
        config: &ConnectionConfig,
        codec: Arc<dyn PacketCodec>,
    ) -> Result<Self, ConnectionError> {
        let peer_addr = stream.peer_addr().map_err(|e| ConnectionError::io(&e))?;
        let local_addr = stream.local_addr().map_err(|e| ConnectionError::io(&e))?;
        stream
            .set_nodelay(true)
            .map_err(|e| ConnectionError::io(&e))?;
        stream
            .set_nonblocking(true)
            .map_err(|e| ConnectionError::io(&e))?;
        let reader = Half::new(&stream, Interest::READABLE).map_err(|e| ConnectionError::io(&e))?;
        let writer = Half::new(&stream, Interest::WRITABLE).map_err(|e| ConnectionError::io(&e))?;

        Ok(Self {
            peer_addr,
            local_addr,
            incoming: Mutex::new(Incoming {
                half: reader,
                decoder: Decoder::new(config.max_frame_len),
                scratch: vec![0; config.read_chunk_len.max(1)],
                end_of_stream: false,
            }),
            outgoing: Mutex::new(writer),
            control: stream,
            closed: AtomicBool::new(false),
            encoder: Encoder::new(config.max_frame_len),
            codec,
            config: config.clone(),
        })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Returns whether a whole packet is buffered and ready to be read.
    ///
    /// Never waits for data. When the peer has closed its side, the
    /// connection closes itself once every buffered packet was read.
    pub fn poll(&self) -> Result<bool, ConnectionError> {
        if self.is_closed() {
            return Ok(false);
        }

        let mut incoming = self.incoming.lock_or_recover();
        self.fill(&mut incoming)?;

        match incoming.decoder.has_frame() {
            Ok(true) => Ok(true),
            Ok(false) => {
                if incoming.end_of_stream {
                    drop(incoming);
                    debug!("peer {} closed the connection", self.peer_addr);
                    self.close();
                }
                Ok(false)
            }
            Err(source) => {
                drop(incoming);
                self.close();
                Err(ConnectionError::CorruptStream {
                    addr: self.peer_addr,
                    source,
                })
            }
        }
    }

    /// Reads one packet, waiting for the rest of it if only part of the
    /// frame has arrived. Call after [`poll`](Connection::poll) returned
    /// true to never wait.
    pub fn read_packet(&self) -> Result<Packet, ConnectionError> {
        let mut incoming = self.incoming.lock_or_recover();
        loop {
            match incoming.decoder.next_frame() {
                Ok(Some(body)) => {
                    drop(incoming);
                    return self.codec.decode(&body).map_err(|source| {
                        self.close();
                        ConnectionError::CorruptStream {
                            addr: self.peer_addr,
                            source,
                        }
                    });
                }
                Ok(None) => {}
                Err(source) => {
                    drop(incoming);
                    self.close();
                    return Err(ConnectionError::CorruptStream {
                        addr: self.peer_addr,
                        source,
                    });
                }
            }

            if self.is_closed() || incoming.end_of_stream {
                drop(incoming);
                self.close();
                return Err(ConnectionError::Closed {
                    addr: self.peer_addr,
                });
            }

            let before = incoming.decoder.buffered_len();
            self.fill(&mut incoming)?;
            if incoming.decoder.buffered_len() == before && !incoming.end_of_stream {
                incoming
                    .half
                    .wait(self.config.retry_interval)
                    .map_err(|error| ConnectionError::from_stream_io(self.peer_addr, &error))?;
            }
        }
    }

    /// Encodes, frames and writes a packet
    pub fn send(&self, packet: &Packet) -> Result<(), ConnectionError> {
        if self.is_closed() {
            return Err(ConnectionError::Closed {
                addr: self.peer_addr,
            });
        }

        let body = self.codec.encode(packet).map_err(ConnectionError::Encode)?;
        let frame = self.encoder.encode(&body).map_err(ConnectionError::Encode)?;

        let deadline = Instant::now() + self.config.send_timeout;
        let mut outgoing = self.outgoing.lock_or_recover();
        let mut written = 0;
        while written < frame.len() {
            if self.is_closed() {
                return Err(ConnectionError::Closed {
                    addr: self.peer_addr,
                });
            }
            let result = (&outgoing.stream).write(&frame[written..]);
            match result {
                Ok(0) => {
                    drop(outgoing);
                    self.close();
                    return Err(ConnectionError::ConnectionBroken {
                        addr: self.peer_addr,
                    });
                }
                Ok(count) => written += count,
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => {
                    let now = Instant::now();
                    if now >= deadline {
                        drop(outgoing);
                        warn!(
                            "peer {} stopped reading, closing after {:?}",
                            self.peer_addr, self.config.send_timeout
                        );
                        self.close();
                        return Err(ConnectionError::ConnectionBroken {
                            addr: self.peer_addr,
                        });
                    }
                    if let Err(error) = outgoing.wait(deadline - now) {
                        let error = ConnectionError::from_stream_io(self.peer_addr, &error);
                        drop(outgoing);
                        self.close();
                        return Err(error);
                    }
                }
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    let error = ConnectionError::from_stream_io(self.peer_addr, &error);
                    if error.is_broken() {
                        drop(outgoing);
                        self.close();
                    }
                    return Err(error);
                }
            }
        }

        Ok(())
    }

    /// Closes the connection. Closing twice is a no-op.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        // the peer may already be gone
        let _ = self.control.shutdown(Shutdown::Both);
    }

    /// Drains readable bytes into the decoder until the socket runs dry, the
    /// peer closes, or a whole frame is buffered
    fn fill(&self, incoming: &mut Incoming) -> Result<(), ConnectionError> {
        let Incoming {
            half,
            decoder,
            scratch,
            end_of_stream,
        } = incoming;

        while !*end_of_stream {
            match decoder.has_frame() {
                Ok(true) | Err(_) => return Ok(()),
                Ok(false) => {}
            }
            match (&half.stream).read(scratch) {
                Ok(0) => *end_of_stream = true,
                Ok(count) => decoder.extend(&scratch[..count]),
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    if self.is_closed() {
                        // shut down locally while reading
                        *end_of_stream = true;
                        return Ok(());
                    }
                    let error = ConnectionError::from_stream_io(self.peer_addr, &error);
                    if error.is_broken() {
                        self.close();
                    }
                    return Err(error);
                }
            }
        }

        Ok(())
    }
}
