use std::io;

use thiserror::Error;

/// Errors thay may occur in this library.
#[derive(Debug, Error)]
pub enum Error {
    /// The local device could not be opened or configured.
    #[error("Could not open local endpoint `{path}`. Problem: {problem}")]
    OpenLocal {
        /// The device path.
        path: String,

        /// What went wrong.
        problem: String,
    },

    /// The listening socket could not be created or bound.
    #[error("Could not bind to port {port}")]
    Bind {
        /// The port we tried to bind.
        port: u16,

        /// The underlying problem.
        #[source]
        source: io::Error,
    },

    /// The bound socket could not start listening.
    #[error("Could not listen on port {port}")]
    Listen {
        /// The port we tried to listen on.
        port: u16,

        /// The underlying problem.
        #[source]
        source: io::Error,
    },

    /// Connecting to the remote failed in a way retrying will not fix.
    #[error("Could not connect to remote")]
    Connect(#[source] io::Error),

    /// The local endpoint reached end-of-stream, nothing more can be relayed.
    #[error("The local endpoint closed")]
    LocalClosed,

    /// The configuration is not usable.
    #[error("Bad configuration: {0}")]
    BadConfig(String),

    /// IO related errors.
    #[error("Underlying IO problem")]
    Io(#[from] io::Error),
}

impl Error {
    /// Get the message if this is a [`Error::BadConfig`].
    pub fn try_into_bad_config(self) -> Option<String> {
        match self {
            Error::BadConfig(message) => Some(message),
            _ => None,
        }
    }

    /// True if the process should still exit successfully after stopping on this error.
    ///
    /// A remote which can never be reached ends the bridge, but it is not a
    /// fault of the bridge itself.
    pub fn is_clean_exit(&self) -> bool {
        matches!(self, Error::Connect(_))
    }
}

/// How an IO failure should be treated by the relay loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Expected to go away by itself, try again later.
    Transient,

    /// Retrying will not help.
    Fatal,

    /// The peer went away or the session broke.
    /// Tear down the session, but keep the process alive.
    PeerClosed,

    /// A chunk was unreadable. Counted, never escalated.
    Malformed,
}

impl ErrorKind {
    /// Classify an error from a connection attempt.
    pub fn of_connect(error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::ConnectionRefused | io::ErrorKind::TimedOut => Self::Transient,
            _ if is_network_unreachable(error) => Self::Transient,
            _ => Self::Fatal,
        }
    }

    /// Classify an error seen while a session is up.
    pub fn of_session(error: &io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::InvalidData => Self::Malformed,
            _ => Self::PeerClosed,
        }
    }
}

#[cfg(unix)]
fn is_network_unreachable(error: &io::Error) -> bool {
    error.raw_os_error() == Some(nix::errno::Errno::ENETUNREACH as i32)
}

#[cfg(not(unix))]
fn is_network_unreachable(_error: &io::Error) -> bool {
    false
}
