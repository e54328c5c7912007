#![allow(dead_code)]

use std::{
    collections::VecDeque,
    io,
    net::{Ipv4Addr, SocketAddr},
    pin::Pin,
    sync::{Arc, Mutex},
    task::{Context, Poll},
    time::{Duration, Instant},
};

use color_eyre::Result;
use serial_relay::{
    config::{BridgeConfig, ServerConfig},
    endpoint::{Acceptor, Connector},
    server::{BroadcastServer, ServerEvent},
};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, DuplexStream, ReadBuf},
    net::TcpStream,
    sync::{
        broadcast::{self, error::RecvError},
        mpsc,
    },
    task::JoinHandle,
    time::timeout,
};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// How long a test waits for something it expects before giving up.
pub const PATIENCE: Duration = Duration::from_secs(5);

pub fn bridge_config() -> BridgeConfig {
    BridgeConfig {
        retry_interval_ms: 100,
        connect_timeout_ms: 1000,
        poll_timeout_ms: 50,
        idle_delay_ms: 1,
        ..Default::default()
    }
}

pub fn server_config(frame_size: usize) -> ServerConfig {
    ServerConfig {
        port: 0,
        frame_size,
        poll_timeout_ms: 50,
        idle_delay_ms: 1,
    }
}

/// A port nobody listens on (at least right now).
pub fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    listener.local_addr().unwrap().port()
}

/// Hands out connection results in order.
/// When the script runs out, every attempt is refused.
pub struct ScriptedConnector<S = DuplexStream> {
    script: VecDeque<io::Result<S>>,
    attempts: Arc<Mutex<Vec<Instant>>>,
}

impl<S> ScriptedConnector<S> {
    pub fn new(script: Vec<io::Result<S>>) -> (Self, Arc<Mutex<Vec<Instant>>>) {
        let attempts = Arc::new(Mutex::new(vec![]));

        (
            Self {
                script: script.into(),
                attempts: attempts.clone(),
            },
            attempts,
        )
    }
}

impl<S> Connector for ScriptedConnector<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    type Stream = S;

    async fn connect(&mut self) -> io::Result<S> {
        self.attempts.lock().unwrap().push(Instant::now());

        self.script
            .pop_front()
            .unwrap_or_else(|| Err(io::ErrorKind::ConnectionRefused.into()))
    }
}

pub fn refused<S>() -> io::Result<S> {
    Err(io::ErrorKind::ConnectionRefused.into())
}

/// A connection attempt which never completes.
pub struct HangingConnector;

impl Connector for HangingConnector {
    type Stream = DuplexStream;

    async fn connect(&mut self) -> io::Result<DuplexStream> {
        std::future::pending().await
    }
}

/// Wait until `n` connection attempts have been made.
pub async fn wait_for_attempts(attempts: &Arc<Mutex<Vec<Instant>>>, n: usize) -> Result<()> {
    let wait = async {
        while attempts.lock().unwrap().len() < n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };

    Ok(timeout(PATIENCE, wait).await?)
}

/// A duplex stream whose first read and/or first write fail.
/// Everything after that is passed through.
#[derive(Debug)]
pub struct Flaky {
    inner: DuplexStream,
    read_error: Option<io::ErrorKind>,
    write_error: Option<io::ErrorKind>,
}

impl Flaky {
    pub fn healthy(inner: DuplexStream) -> Self {
        Self {
            inner,
            read_error: None,
            write_error: None,
        }
    }

    pub fn failing_read(inner: DuplexStream, kind: io::ErrorKind) -> Self {
        Self {
            read_error: Some(kind),
            ..Self::healthy(inner)
        }
    }

    pub fn failing_write(inner: DuplexStream, kind: io::ErrorKind) -> Self {
        Self {
            write_error: Some(kind),
            ..Self::healthy(inner)
        }
    }
}

impl AsyncRead for Flaky {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        match this.read_error.take() {
            Some(kind) => Poll::Ready(Err(kind.into())),
            None => Pin::new(&mut this.inner).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Flaky {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();

        match this.write_error.take() {
            Some(kind) => Poll::Ready(Err(kind.into())),
            None => Pin::new(&mut this.inner).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

/// Clients pushed through the sender are handed out in order.
pub struct ScriptedAcceptor<S> {
    clients: mpsc::UnboundedReceiver<(S, SocketAddr)>,
}

impl<S> ScriptedAcceptor<S> {
    pub fn new() -> (Self, mpsc::UnboundedSender<(S, SocketAddr)>) {
        let (sender, clients) = mpsc::unbounded_channel();

        (Self { clients }, sender)
    }
}

impl<S> Acceptor for ScriptedAcceptor<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    type Stream = S;

    async fn accept(&mut self) -> io::Result<(S, SocketAddr)> {
        match self.clients.recv().await {
            Some(client) => Ok(client),
            None => std::future::pending().await,
        }
    }
}

/// Read exactly `n` bytes, or fail after [`PATIENCE`].
pub async fn receive_exact<R: AsyncReadExt + Unpin>(reader: &mut R, n: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0; n];
    timeout(PATIENCE, reader.read_exact(&mut buf)).await??;

    Ok(buf)
}

/// True if nothing at all arrives within `quiet`.
pub async fn stays_silent<R: AsyncReadExt + Unpin>(reader: &mut R, quiet: Duration) -> bool {
    let mut buf = [0; 1];
    timeout(quiet, reader.read(&mut buf)).await.is_err()
}

pub struct RunningServer {
    pub addr: SocketAddr,
    pub events: broadcast::Receiver<ServerEvent>,
    pub token: CancellationToken,
    pub handle: JoinHandle<serial_relay::server::ServerReport>,
}

pub async fn start_server(config: ServerConfig, input: DuplexStream) -> Result<RunningServer> {
    let server = BroadcastServer::bind(config)?;

    let port = server.local_addr()?.port();
    let addr = SocketAddr::from((Ipv4Addr::LOCALHOST, port));
    let events = server.events();
    let token = CancellationToken::new();

    let handle = tokio::spawn(server.run(input, token.clone()));

    info!(%addr, "Server started");

    Ok(RunningServer {
        addr,
        events,
        token,
        handle,
    })
}

pub async fn connect(addr: SocketAddr) -> Result<TcpStream> {
    Ok(timeout(PATIENCE, TcpStream::connect(addr)).await??)
}

/// Wait until an event matching `matches` arrives.
pub async fn wait_for_event<F>(
    events: &mut broadcast::Receiver<ServerEvent>,
    matches: F,
) -> Result<ServerEvent>
where
    F: Fn(&ServerEvent) -> bool,
{
    let wait = async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return Ok(event),
                Ok(_) | Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => {
                    return Err(color_eyre::eyre::eyre!("Server stopped"));
                }
            }
        }
    };

    timeout(PATIENCE, wait).await?
}
