use std::fmt::Display;

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    sync::watch,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::{
    buffer::InboundBuffer,
    config::BridgeConfig,
    endpoint::Connector,
    error::{Error, ErrorKind},
    framing::{self, Packet},
};

/// Where the bridge is in its connection life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No remote endpoint.
    Disconnected,

    /// Attempting to establish the remote endpoint.
    Connecting,

    /// Relaying.
    Connected,
}

impl Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };

        write!(f, "{s}")
    }
}

#[derive(Debug, PartialEq, Eq)]
enum SessionEnd {
    /// Go back to reconnecting.
    PeerLost,

    /// The token was cancelled.
    Shutdown,
}

/// Relays bytes between a local endpoint and a remote one,
/// re-establishing the remote whenever it is lost.
pub struct Bridge<C> {
    config: BridgeConfig,
    connector: C,
    state: watch::Sender<ConnectionState>,
}

impl<C: Connector> Bridge<C> {
    /// A bridge which connects using `connector`.
    pub fn new(config: BridgeConfig, connector: C) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            config,
            connector,
            state,
        }
    }

    /// Observe state transitions.
    pub fn state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn transition(&self, to: ConnectionState) {
        self.state.send_if_modified(|state| {
            if *state == to {
                return false;
            }

            debug!(from = %state, %to, "Connection state");
            *state = to;
            true
        });
    }

    /// Keep relaying until the token is cancelled.
    ///
    /// Transient connect errors are retried forever at a fixed interval.
    /// Lost sessions are re-established.
    /// Only a non-transient connect error or the local endpoint closing
    /// stop the bridge early.
    ///
    /// Connection attempts and retry delays are abandoned as soon as the
    /// token is cancelled.
    ///
    /// The local endpoint is borrowed, never closed here.
    pub async fn run<L>(&mut self, local: &mut L, token: CancellationToken) -> Result<(), Error>
    where
        L: AsyncRead + AsyncWrite + Unpin,
    {
        let mut attempts: u64 = 0;

        let result = loop {
            if token.is_cancelled() {
                info!("Shutdown requested");
                break Ok(());
            }

            self.transition(ConnectionState::Connecting);
            attempts += 1;

            let connected = tokio::select! {
                connected = self.connector.connect() => connected,
                _ = token.cancelled() => {
                    info!("Shutdown requested while connecting");
                    break Ok(());
                }
            };

            match connected {
                Ok(mut remote) => {
                    info!(%attempts, "Connected");
                    attempts = 0;
                    self.transition(ConnectionState::Connected);

                    let end = self.relay(local, &mut remote, &token).await;

                    drop(remote);
                    self.transition(ConnectionState::Disconnected);

                    match end {
                        Ok(SessionEnd::PeerLost) => warn!("Disconnected, will reconnect"),
                        Ok(SessionEnd::Shutdown) => info!("Disconnected"),
                        Err(e) => break Err(e),
                    }
                }
                Err(e) => match ErrorKind::of_connect(&e) {
                    ErrorKind::Transient => {
                        warn!(
                            %e,
                            %attempts,
                            retry_in = ?self.config.retry_interval(),
                            "Connect error"
                        );

                        tokio::select! {
                            _ = tokio::time::sleep(self.config.retry_interval()) => {}
                            _ = token.cancelled() => {}
                        }
                    }
                    _ => {
                        error!(%e, "Connect error, giving up");
                        break Err(Error::Connect(e));
                    }
                },
            }
        };

        self.transition(ConnectionState::Disconnected);

        result
    }

    async fn relay<L>(
        &self,
        local: &mut L,
        remote: &mut C::Stream,
        token: &CancellationToken,
    ) -> Result<SessionEnd, Error>
    where
        L: AsyncRead + AsyncWrite + Unpin,
    {
        let mut from_local = vec![0; self.config.chunk_size];
        let mut from_remote = InboundBuffer::with_capacity(self.config.chunk_size);

        let end = loop {
            if token.is_cancelled() {
                break SessionEnd::Shutdown;
            }

            tokio::select! {
                read = local.read(&mut from_local) => match read {
                    Ok(0) => {
                        error!("Local endpoint closed");
                        return Err(Error::LocalClosed);
                    }
                    Ok(n) => {
                        trace!(%n, "Local -> remote");

                        if let Err(e) = remote.write_all(&from_local[..n]).await {
                            warn!(%e, "Write to remote failed");
                            break SessionEnd::PeerLost;
                        }
                    }
                    Err(e) => {
                        warn!(%e, "Read from local endpoint failed");
                        break SessionEnd::PeerLost;
                    }
                },
                packet = framing::read_packet(remote, &mut from_remote) => match packet {
                    Ok(Packet::Data(n)) => {
                        trace!(%n, "Remote -> local");

                        let written = local.write_all(from_remote.as_bytes()).await;
                        from_remote.clear();

                        if let Err(e) = written {
                            warn!(%e, "Write to local endpoint failed");
                            break SessionEnd::PeerLost;
                        }
                    }
                    Ok(Packet::Malformed) => from_remote.clear(),
                    Ok(Packet::EndOfStream) => {
                        info!("Remote closed the connection");
                        break SessionEnd::PeerLost;
                    }
                    Err(e) => {
                        warn!(%e, "Read from remote failed");
                        break SessionEnd::PeerLost;
                    }
                },
                _ = tokio::time::sleep(self.config.poll_timeout()) => {}
            }

            tokio::time::sleep(self.config.idle_delay()).await;
        };

        debug!(
            valid = from_remote.valid_frames(),
            invalid = from_remote.invalid_frames(),
            "Session ended"
        );

        Ok(end)
    }
}
