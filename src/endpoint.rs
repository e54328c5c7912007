use std::{
    future::Future,
    io,
    net::{SocketAddr, SocketAddrV4},
    time::Duration,
};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::{TcpListener, TcpStream},
};
use tracing::{debug, warn};

/// Something which can (re-)establish the remote endpoint of a bridge.
pub trait Connector {
    /// The established byte channel.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Make one connection attempt.
    ///
    /// Must not block forever; a hung attempt should end as
    /// [`io::ErrorKind::TimedOut`].
    fn connect(&mut self) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Something which hands out the inbound connections of a server.
pub trait Acceptor {
    /// An accepted byte channel.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Wait for the next client.
    ///
    /// Must be cancel safe, since it is raced against other sources.
    fn accept(&mut self) -> impl Future<Output = io::Result<(Self::Stream, SocketAddr)>> + Send;
}

impl Acceptor for TcpListener {
    type Stream = TcpStream;

    async fn accept(&mut self) -> io::Result<(TcpStream, SocketAddr)> {
        let (stream, addr) = TcpListener::accept(self).await?;

        if let Err(e) = stream.set_nodelay(true) {
            warn!(%e, "Could not set TCP_NODELAY");
        }

        Ok((stream, addr))
    }
}

/// Connects over plain TCP/IPv4.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    addr: SocketAddrV4,
    timeout: Duration,
}

impl TcpConnector {
    /// Connect to `addr`, giving up on each attempt after `timeout`.
    pub fn new(addr: SocketAddrV4, timeout: Duration) -> Self {
        Self { addr, timeout }
    }

    /// The remote address.
    pub fn addr(&self) -> SocketAddrV4 {
        self.addr
    }
}

impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&mut self) -> io::Result<TcpStream> {
        debug!(addr = %self.addr, "Connecting");

        let stream = match tokio::time::timeout(self.timeout, TcpStream::connect(self.addr)).await
        {
            Ok(result) => result?,
            Err(_elapsed) => {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("no answer from {} within {:?}", self.addr, self.timeout),
                ))
            }
        };

        // Relayed bytes should not wait for more to coalesce with.
        if let Err(e) = stream.set_nodelay(true) {
            warn!(?e, "Could not set TCP_NODELAY");
        }

        Ok(stream)
    }
}
