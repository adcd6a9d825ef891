//! Reliable point-to-point frame transports.

use super::codec::{decode_hello, encode_hello, frame_codec, CodecError};
use async_trait::async_trait;
use bytes::Bytes;
use citygate_types::ProcessId;
use futures::{SinkExt, StreamExt};
use std::collections::{BTreeMap, HashMap};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info, warn};

/// Delay between connection attempts while peers are starting up.
const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// Errors raised by a transport.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("No route to peer {0}")]
    UnknownPeer(ProcessId),

    #[error("Connection to peer {0} is closed")]
    PeerClosed(ProcessId),

    #[error("Every inbound link is closed")]
    InboundClosed,

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to connect to peer {peer} at {address}: {source}")]
    Connect {
        peer: ProcessId,
        address: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error on link to peer {peer}: {source}")]
    Io {
        peer: ProcessId,
        #[source]
        source: std::io::Error,
    },

    #[error("Connection from {remote} failed before its handshake: {source}")]
    HandshakeIo {
        remote: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("Bad handshake from {remote}: {source}")]
    BadHandshake {
        remote: SocketAddr,
        #[source]
        source: CodecError,
    },

    #[error("Failed to encode handshake: {0}")]
    Codec(#[from] CodecError),
}

/// Reliable, FIFO-per-sender, point-to-point delivery of opaque frames.
///
/// Frames from one peer arrive in the order that peer sent them. There is no
/// ordering across peers.
#[async_trait]
pub trait Transport: Send {
    /// The local process.
    fn local_id(&self) -> ProcessId;

    /// Send a frame to one peer.
    async fn send(&self, to: ProcessId, frame: Bytes) -> Result<(), TransportError>;

    /// Take every frame that has already arrived, without waiting.
    ///
    /// A broken inbound link is reported as an error instead of its frames.
    fn try_recv_all(&mut self) -> Result<Vec<(ProcessId, Bytes)>, TransportError>;

    /// Wait for the next frame.
    ///
    /// Cancel safe: dropping the future loses nothing.
    async fn recv(&mut self) -> Result<(ProcessId, Bytes), TransportError>;
}

/// Inbound queue item: a frame tagged with its sender, or the failure of a
/// link.
type InboundItem = Result<(ProcessId, Bytes), TransportError>;
type Inbound = mpsc::UnboundedReceiver<InboundItem>;
type InboundSender = mpsc::UnboundedSender<InboundItem>;

/// Drain an inbound queue without blocking.
fn drain(inbound: &mut Inbound) -> Result<Vec<(ProcessId, Bytes)>, TransportError> {
    let mut frames = Vec::new();
    loop {
        match inbound.try_recv() {
            Ok(item) => frames.push(item?),
            Err(mpsc::error::TryRecvError::Empty) => return Ok(frames),
            Err(mpsc::error::TryRecvError::Disconnected) => {
                if frames.is_empty() {
                    return Err(TransportError::InboundClosed);
                }
                return Ok(frames);
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// In-process transport
// ═══════════════════════════════════════════════════════════════════════════

/// In-process transport over tokio channels.
///
/// Every node owns one unbounded inbox; each peer holds a sender into it, so
/// frames from one sender keep their order.
#[derive(Debug)]
pub struct ChannelTransport {
    local: ProcessId,
    peers: HashMap<ProcessId, InboundSender>,
    inbound: Inbound,
}

impl ChannelTransport {
    /// Build a fully connected mesh of `num_processes` transports.
    pub fn mesh(num_processes: u32) -> Vec<Self> {
        let (senders, receivers): (Vec<_>, Vec<_>) =
            (0..num_processes).map(|_| mpsc::unbounded_channel()).unzip();

        receivers
            .into_iter()
            .enumerate()
            .map(|(index, inbound)| {
                let local = ProcessId(index as u32);
                let peers = senders
                    .iter()
                    .enumerate()
                    .filter(|(peer, _)| *peer != index)
                    .map(|(peer, sender)| (ProcessId(peer as u32), sender.clone()))
                    .collect();
                Self {
                    local,
                    peers,
                    inbound,
                }
            })
            .collect()
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    fn local_id(&self) -> ProcessId {
        self.local
    }

    async fn send(&self, to: ProcessId, frame: Bytes) -> Result<(), TransportError> {
        let peer = self.peers.get(&to).ok_or(TransportError::UnknownPeer(to))?;
        peer.send(Ok((self.local, frame)))
            .map_err(|_| TransportError::PeerClosed(to))
    }

    fn try_recv_all(&mut self) -> Result<Vec<(ProcessId, Bytes)>, TransportError> {
        drain(&mut self.inbound)
    }

    async fn recv(&mut self) -> Result<(ProcessId, Bytes), TransportError> {
        self.inbound.recv().await.ok_or(TransportError::InboundClosed)?
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TCP transport
// ═══════════════════════════════════════════════════════════════════════════

type FrameWriter = FramedWrite<TcpStream, tokio_util::codec::LengthDelimitedCodec>;

/// TCP transport: one outbound connection per peer.
///
/// Each process dials every peer and writes only on its own connections; the
/// connections peers dial in are read-only. Each ordered pair therefore has a
/// single TCP stream, which gives per-sender FIFO.
pub struct TcpTransport {
    local: ProcessId,
    outbound: HashMap<ProcessId, Mutex<FrameWriter>>,
    inbound: Inbound,
    accept_task: JoinHandle<()>,
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("local", &self.local)
            .field("peers", &self.outbound.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TcpTransport {
    /// Listen on `listen`, then dial every peer, retrying until
    /// `connect_timeout` elapses.
    pub async fn connect(
        local: ProcessId,
        listen: SocketAddr,
        peers: BTreeMap<ProcessId, SocketAddr>,
        connect_timeout: Duration,
    ) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(listen)
            .await
            .map_err(|source| TransportError::Bind {
                address: listen,
                source,
            })?;
        info!(local = %local, address = %listen, "Listening for peers");

        let (inbound_tx, inbound) = mpsc::unbounded_channel();
        let accept_task = tokio::spawn(accept_loop(listener, inbound_tx));

        let deadline = Instant::now() + connect_timeout;
        let mut outbound = HashMap::new();
        for (peer, address) in peers {
            let stream = dial(peer, address, deadline).await?;
            let mut writer = FramedWrite::new(stream, frame_codec());
            writer
                .send(encode_hello(local)?)
                .await
                .map_err(|source| TransportError::Io { peer, source })?;
            info!(peer = %peer, address = %address, "Connected to peer");
            outbound.insert(peer, Mutex::new(writer));
        }

        Ok(Self {
            local,
            outbound,
            inbound,
            accept_task,
        })
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn dial(
    peer: ProcessId,
    address: SocketAddr,
    deadline: Instant,
) -> Result<TcpStream, TransportError> {
    loop {
        match TcpStream::connect(address).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(peer = %peer, error = %e, "Failed to disable Nagle");
                }
                return Ok(stream);
            }
            Err(source) if Instant::now() >= deadline => {
                return Err(TransportError::Connect {
                    peer,
                    address,
                    source,
                });
            }
            Err(e) => {
                debug!(peer = %peer, address = %address, error = %e, "Peer not up yet, retrying");
                tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
            }
        }
    }
}

async fn accept_loop(listener: TcpListener, inbound: InboundSender) {
    loop {
        let (stream, remote) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "Accept failed");
                continue;
            }
        };
        if let Err(e) = stream.set_nodelay(true) {
            debug!(remote = %remote, error = %e, "Failed to disable Nagle");
        }
        tokio::spawn(read_loop(stream, remote, inbound.clone()));
    }
}

/// Forward every frame of one inbound connection, tagged with the peer id
/// announced in its first frame.
///
/// A broken handshake or a frame the codec rejects is forwarded as an error
/// and ends the connection. A clean close before or after the handshake is
/// not an error.
async fn read_loop(stream: TcpStream, remote: SocketAddr, inbound: InboundSender) {
    let mut reader = FramedRead::new(stream, frame_codec());

    let peer = match reader.next().await {
        Some(Ok(frame)) => match decode_hello(&frame) {
            Ok(hello) => hello.process,
            Err(source) => {
                warn!(remote = %remote, error = %source, "Bad handshake");
                let _ = inbound.send(Err(TransportError::BadHandshake { remote, source }));
                return;
            }
        },
        Some(Err(source)) => {
            warn!(remote = %remote, error = %source, "Connection failed before handshake");
            let _ = inbound.send(Err(TransportError::HandshakeIo { remote, source }));
            return;
        }
        None => return,
    };
    debug!(peer = %peer, remote = %remote, "Inbound connection established");

    while let Some(frame) = reader.next().await {
        match frame {
            Ok(frame) => {
                if inbound.send(Ok((peer, frame.freeze()))).is_err() {
                    return;
                }
            }
            Err(source) => {
                warn!(peer = %peer, error = %source, "Inbound link failed");
                let _ = inbound.send(Err(TransportError::Io { peer, source }));
                return;
            }
        }
    }
    debug!(peer = %peer, "Inbound connection closed");
}

#[async_trait]
impl Transport for TcpTransport {
    fn local_id(&self) -> ProcessId {
        self.local
    }

    async fn send(&self, to: ProcessId, frame: Bytes) -> Result<(), TransportError> {
        let writer = self
            .outbound
            .get(&to)
            .ok_or(TransportError::UnknownPeer(to))?;
        writer
            .lock()
            .await
            .send(frame)
            .await
            .map_err(|source| TransportError::Io { peer: to, source })
    }

    fn try_recv_all(&mut self) -> Result<Vec<(ProcessId, Bytes)>, TransportError> {
        drain(&mut self.inbound)
    }

    async fn recv(&mut self) -> Result<(ProcessId, Bytes), TransportError> {
        self.inbound.recv().await.ok_or(TransportError::InboundClosed)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_mesh_keeps_sender_order() {
        let mut mesh = ChannelTransport::mesh(3);
        for i in 0..5u8 {
            mesh[0].send(ProcessId(2), Bytes::from(vec![i])).await.unwrap();
            mesh[1].send(ProcessId(2), Bytes::from(vec![100 + i])).await.unwrap();
        }

        let frames = mesh[2].try_recv_all().unwrap();
        let from_zero: Vec<u8> = frames
            .iter()
            .filter(|(p, _)| *p == ProcessId(0))
            .map(|(_, f)| f[0])
            .collect();
        assert_eq!(from_zero, vec![0, 1, 2, 3, 4]);
        assert_eq!(frames.len(), 10);
        assert!(mesh[2].try_recv_all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_channel_rejects_self_and_strangers() {
        let mesh = ChannelTransport::mesh(2);
        assert!(matches!(
            mesh[0].send(ProcessId(0), Bytes::new()).await,
            Err(TransportError::UnknownPeer(_))
        ));
        assert!(matches!(
            mesh[0].send(ProcessId(7), Bytes::new()).await,
            Err(TransportError::UnknownPeer(_))
        ));
    }

    /// Reserve an ephemeral local port.
    fn free_address() -> SocketAddr {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    }

    /// Open a raw inbound connection that has already sent its handshake.
    async fn handshaken(to: SocketAddr, from: ProcessId) -> FrameWriter {
        let stream = TcpStream::connect(to).await.unwrap();
        let mut writer = FramedWrite::new(stream, frame_codec());
        writer.send(encode_hello(from).unwrap()).await.unwrap();
        writer
    }

    #[tokio::test]
    async fn test_tcp_pair_exchanges_frames() {
        let a_listen = free_address();
        let b_listen = free_address();

        let timeout = Duration::from_secs(5);
        let a = TcpTransport::connect(
            ProcessId(0),
            a_listen,
            BTreeMap::from([(ProcessId(1), b_listen)]),
            timeout,
        );
        let b = TcpTransport::connect(
            ProcessId(1),
            b_listen,
            BTreeMap::from([(ProcessId(0), a_listen)]),
            timeout,
        );
        let (a, b) = tokio::join!(a, b);
        let (a, mut b) = (a.unwrap(), b.unwrap());

        for i in 0..3u8 {
            a.send(ProcessId(1), Bytes::from(vec![i])).await.unwrap();
        }
        let mut received = Vec::new();
        while received.len() < 3 {
            let (from, frame) = b.recv().await.unwrap();
            assert_eq!(from, ProcessId(0));
            received.push(frame[0]);
        }
        assert_eq!(received, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn test_tcp_oversized_frame_is_reported() {
        use tokio::io::AsyncWriteExt;

        let listen = free_address();
        let mut node = TcpTransport::connect(
            ProcessId(1),
            listen,
            BTreeMap::new(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        let mut writer = handshaken(listen, ProcessId(0)).await;
        writer.send(Bytes::from_static(b"fine")).await.unwrap();
        // A length header far beyond MAX_FRAME_LENGTH.
        let mut stream = writer.into_inner();
        stream.write_all(&10_000_000u32.to_be_bytes()).await.unwrap();
        stream.flush().await.unwrap();

        let within = Duration::from_secs(5);
        let (from, frame) = tokio::time::timeout(within, node.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!((from, &frame[..]), (ProcessId(0), &b"fine"[..]));

        let broken = tokio::time::timeout(within, node.recv()).await.unwrap();
        assert!(matches!(
            broken,
            Err(TransportError::Io {
                peer: ProcessId(0),
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_tcp_bad_handshake_is_reported() {
        let listen = free_address();
        let mut node = TcpTransport::connect(
            ProcessId(1),
            listen,
            BTreeMap::new(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        let stream = TcpStream::connect(listen).await.unwrap();
        let mut writer = FramedWrite::new(stream, frame_codec());
        writer.send(Bytes::from_static(b"not a hello")).await.unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), node.recv())
            .await
            .unwrap();
        assert!(matches!(result, Err(TransportError::BadHandshake { .. })));
    }

    #[tokio::test]
    async fn test_broken_link_fails_the_drain() {
        let listen = free_address();
        let mut node = TcpTransport::connect(
            ProcessId(1),
            listen,
            BTreeMap::new(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        let stream = TcpStream::connect(listen).await.unwrap();
        let mut writer = FramedWrite::new(stream, frame_codec());
        writer.send(Bytes::from_static(b"{}")).await.unwrap();

        // Wait for the reader task to report, then drain without blocking.
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match node.try_recv_all() {
                Ok(frames) => assert!(frames.is_empty()),
                Err(e) => {
                    assert!(matches!(e, TransportError::BadHandshake { .. }));
                    break;
                }
            }
            assert!(Instant::now() < deadline, "link failure never surfaced");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}
