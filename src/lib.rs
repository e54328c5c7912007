#![deny(missing_docs)]

//! This crate relays bytes between a local endpoint and a remote TCP peer.
//!
//! Two daemons are built on it:
//!
//! - `relay-bridge` opens a serial port and keeps a connection to a fixed server.
//!   Bytes are copied both ways. If the network goes away, the bridge reconnects.
//! - `relay-server` reads fixed-size frames from its standard input and pushes each
//!   complete frame to its single client. A second client is turned away
//!   while the first one is connected.
//!
//! Both run a single loop waiting for readiness on a handful of sources,
//! with a bounded timeout so a shutdown request is noticed promptly.

/// The reconnecting bridge.
pub mod bridge;

/// The single-client broadcast server.
pub mod server;

/// Frame and inbound buffers, and read statistics.
pub mod buffer;

/// Classifies reads from a peer as data, end-of-stream or garbage.
pub mod framing;

/// Ways to establish remote endpoints: outbound for the bridge, inbound for the server.
pub mod endpoint;

/// Opening the local serial device.
pub mod serial;

/// The command line interfaces.
pub mod cli;

/// Relates to config files.
pub mod config;

/// Turning process signals into cancellation.
pub mod shutdown;

/// Possible errors in this library.
pub mod error;

/// Logging/tracing setup.
pub mod logging;
