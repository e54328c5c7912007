use std::{io, net::SocketAddr};

use bytes::Bytes;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpSocket},
    sync::broadcast,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    buffer::{FrameBuffer, InboundBuffer, ReadStats},
    config::ServerConfig,
    endpoint::Acceptor,
    error::Error,
    framing::{self, Packet},
};

/// Things that happen on the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A client became the peer.
    PeerAccepted(SocketAddr),

    /// A client connected while another was the peer, and was closed.
    PeerRefused(SocketAddr),

    /// The peer went away or was closed.
    PeerClosed(SocketAddr),

    /// A full frame was written to the peer.
    FrameSent,

    /// A full frame was assembled with nobody to send it to.
    FrameDropped,

    /// The input stream ended.
    InputClosed,
}

/// What the server did during its lifetime.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ServerReport {
    /// Input statistics.
    pub input: ReadStats,

    /// Reads from peers which carried data.
    pub valid_frames: u64,

    /// Reads from peers which were unreadable.
    pub invalid_frames: u64,
}

struct Peer<S> {
    stream: S,
    addr: SocketAddr,
}

/// Pushes frames from an input stream to at most one client.
///
/// Clients come from an [`Acceptor`], normally a TCP listener.
pub struct BroadcastServer<A = TcpListener> {
    config: ServerConfig,
    acceptor: A,
    events: broadcast::Sender<ServerEvent>,
}

async fn read_frame<I>(input: &mut I, frames: &mut FrameBuffer) -> io::Result<usize>
where
    I: AsyncRead + Unpin,
{
    input.read_buf(&mut frames.read_window()).await
}

async fn read_peer<S>(peer: &mut Option<Peer<S>>, inbound: &mut InboundBuffer) -> io::Result<Packet>
where
    S: AsyncRead + Unpin,
{
    match peer {
        Some(peer) => framing::read_packet(&mut peer.stream, inbound).await,
        None => std::future::pending().await,
    }
}

impl BroadcastServer<TcpListener> {
    /// Create the listening endpoint on `0.0.0.0` at the configured port.
    ///
    /// Must be called from within a tokio runtime.
    pub fn bind(config: ServerConfig) -> Result<Self, Error> {
        config.validate()?;

        let port = config.port;
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        let socket = TcpSocket::new_v4().map_err(|source| Error::Bind { port, source })?;

        if let Err(e) = socket.set_reuseaddr(true) {
            warn!(%e, "Error setting SO_REUSEADDR");
        }

        socket
            .bind(addr)
            .map_err(|source| Error::Bind { port, source })?;

        let listener = socket
            .listen(1)
            .map_err(|source| Error::Listen { port, source })?;

        let server = Self::new(config, listener)?;

        info!(addr = %server.local_addr()?, frame_size = server.config.frame_size, "Listening");

        Ok(server)
    }

    /// Where the server listens.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.acceptor.local_addr()?)
    }
}

impl<A: Acceptor> BroadcastServer<A> {
    /// A server taking its clients from `acceptor`.
    pub fn new(config: ServerConfig, acceptor: A) -> Result<Self, Error> {
        config.validate()?;

        let (events, _) = broadcast::channel(1024);

        Ok(Self {
            config,
            acceptor,
            events,
        })
    }

    /// Subscribe to [`ServerEvent`]s.
    pub fn events(&self) -> broadcast::Receiver<ServerEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: ServerEvent) {
        // Nobody subscribed is the normal case.
        if let Ok(listeners) = self.events.send(event) {
            trace!("Event to {listeners} listener(s)");
        }
    }

    /// Run until the token is cancelled.
    ///
    /// Frames are read from `input` and pushed to the peer if there is one,
    /// otherwise dropped. Reading the input never waits on the peer existing.
    pub async fn run<I>(mut self, mut input: I, token: CancellationToken) -> ServerReport
    where
        I: AsyncRead + Unpin,
    {
        let mut frames = FrameBuffer::new(self.config.frame_size);
        let mut stats = ReadStats::default();
        let mut inbound = InboundBuffer::with_capacity(self.config.frame_size);
        let mut peer: Option<Peer<A::Stream>> = None;
        let mut input_open = true;

        while !token.is_cancelled() {
            tokio::select! {
                packet = read_peer(&mut peer, &mut inbound), if peer.is_some() => {
                    match packet {
                        Ok(Packet::Data(n)) => trace!(%n, "Bytes from peer"),
                        Ok(Packet::Malformed) => {}
                        Ok(Packet::EndOfStream) => self.close_peer(&mut peer),
                        Err(e) => {
                            warn!(%e, "Read from peer failed");
                            self.close_peer(&mut peer);
                        }
                    }

                    inbound.clear();
                }
                accepted = self.acceptor.accept() => self.admit(accepted, &mut peer),
                read = read_frame(&mut input, &mut frames), if input_open => match read {
                    Ok(n) => {
                        stats.record(n);

                        if n == 0 {
                            warn!("Input stream ended");
                            input_open = false;
                            self.emit(ServerEvent::InputClosed);
                        }

                        if let Some(frame) = frames.take_frame() {
                            self.push(frame, &mut peer).await;
                        }
                    }
                    Err(e) => warn!(%e, "Read from input failed"),
                },
                _ = tokio::time::sleep(self.config.poll_timeout()) => {}
            }

            tokio::time::sleep(self.config.idle_delay()).await;
        }

        info!("Shutting down...");
        self.close_peer(&mut peer);

        let report = ServerReport {
            input: stats,
            valid_frames: inbound.valid_frames(),
            invalid_frames: inbound.invalid_frames(),
        };

        info!(
            bytes = report.input.bytes_read,
            average_read = report.input.avg_read,
            "Input summary"
        );
        debug!(
            valid = report.valid_frames,
            invalid = report.invalid_frames,
            "Peer reads"
        );

        report
    }

    fn admit(
        &self,
        accepted: io::Result<(A::Stream, SocketAddr)>,
        peer: &mut Option<Peer<A::Stream>>,
    ) {
        let (stream, addr) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(%e, "accept() error");
                return;
            }
        };

        info!(%addr, "New connection");

        match peer {
            None => {
                info!(%addr, "Connection accepted");
                *peer = Some(Peer { stream, addr });
                self.emit(ServerEvent::PeerAccepted(addr));
            }
            Some(current) => {
                info!(%addr, current = %current.addr, "Connection refused");
                drop(stream);
                self.emit(ServerEvent::PeerRefused(addr));
            }
        }
    }

    async fn push(&self, frame: Bytes, peer: &mut Option<Peer<A::Stream>>) {
        let Some(current) = peer.as_mut() else {
            trace!("No peer, frame dropped");
            self.emit(ServerEvent::FrameDropped);
            return;
        };

        match current.stream.write_all(&frame).await {
            Ok(()) => {
                trace!(len = frame.len(), "Frame sent");
                self.emit(ServerEvent::FrameSent);
            }
            Err(e) => {
                warn!(%e, addr = %current.addr, "Write to peer failed");
                self.close_peer(peer);
            }
        }
    }

    fn close_peer(&self, peer: &mut Option<Peer<A::Stream>>) {
        if let Some(closed) = peer.take() {
            info!(addr = %closed.addr, "Connection closed");
            self.emit(ServerEvent::PeerClosed(closed.addr));
        }
    }
}
