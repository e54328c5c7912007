use std::{
    net::{Ipv4Addr, SocketAddrV4},
    path::Path,
    time::Duration,
};

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::error::Error;

/// Environment variable which may point to a RON file with tunables.
pub const CONFIG_ENV: &str = "SERIAL_RELAY_CONFIG";

/// The default port the bridge connects to.
pub const DEFAULT_BRIDGE_PORT: u16 = 42000;

/// The default port the broadcast server listens on.
pub const DEFAULT_SERVER_PORT: u16 = 42001;

/// The default local device of the bridge.
pub const DEFAULT_DEVICE: &str = "/dev/ttyO1";

/// Frame size agreed upon out-of-band by the server and its clients.
pub const DEFAULT_FRAME_SIZE: usize = 1024;

fn ron() -> ron::Options {
    ron::Options::default()
        .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
        .with_default_extension(ron::extensions::Extensions::UNWRAP_NEWTYPES)
}

fn deserialize<T: DeserializeOwned>(input: &str) -> Result<T, Error> {
    ron()
        .from_str::<T>(input)
        .map_err(|e| Error::BadConfig(format!("Not valid RON: {e}")))
}

fn serialize_pretty<T: Serialize>(value: &T) -> String {
    ron()
        .to_string_pretty(value, ron::ser::PrettyConfig::default())
        .unwrap_or_else(|e| format!("<unserializable config: {e}>"))
}

fn read_to_string<P: AsRef<Path>>(p: P) -> Result<String, Error> {
    let p = p.as_ref();

    std::fs::read_to_string(p)
        .map_err(|e| Error::BadConfig(format!("Could not read config at {p:?}: {e}")))
}

fn check_non_zero(name: &str, value: u64) -> Result<(), Error> {
    if value == 0 {
        Err(Error::BadConfig(format!("`{name}` must be non-zero")))
    } else {
        Ok(())
    }
}

/// The configuration of the reconnecting bridge.
///
/// Fields omitted in a RON file keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// The server to connect to.
    pub host: Ipv4Addr,

    /// The port on the server.
    pub port: u16,

    /// Path to the local serial device.
    pub device: String,

    /// Baud rate of the local serial device.
    pub baud: u32,

    /// How long to wait before retrying after a transient connect error.
    pub retry_interval_ms: u64,

    /// Upper bound on a single connection attempt.
    pub connect_timeout_ms: u64,

    /// Upper bound on each readiness wait.
    pub poll_timeout_ms: u64,

    /// Throttle between relay iterations.
    pub idle_delay_ms: u64,

    /// Largest chunk read from either endpoint at once.
    pub chunk_size: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: Ipv4Addr::LOCALHOST,
            port: DEFAULT_BRIDGE_PORT,
            device: DEFAULT_DEVICE.into(),
            baud: 19_200,
            retry_interval_ms: 1000,
            connect_timeout_ms: 5000,
            poll_timeout_ms: 500,
            idle_delay_ms: 10,
            chunk_size: 4096,
        }
    }
}

impl BridgeConfig {
    /// Deserialize a .ron file's contents.
    pub fn deserialize(input: &str) -> Result<Self, Error> {
        deserialize(input)
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> String {
        serialize_pretty(self)
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        Self::deserialize(&read_to_string(p)?)
    }

    /// The remote address.
    pub fn remote(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.host, self.port)
    }

    /// See [`BridgeConfig::retry_interval_ms`].
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    /// See [`BridgeConfig::connect_timeout_ms`].
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// See [`BridgeConfig::poll_timeout_ms`].
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// See [`BridgeConfig::idle_delay_ms`].
    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    /// Check that the values make sense.
    pub fn validate(&self) -> Result<(), Error> {
        if self.device.is_empty() {
            return Err(Error::BadConfig("`device` must not be empty".into()));
        }

        check_non_zero("baud", self.baud.into())?;
        check_non_zero("retry_interval_ms", self.retry_interval_ms)?;
        check_non_zero("connect_timeout_ms", self.connect_timeout_ms)?;
        check_non_zero("poll_timeout_ms", self.poll_timeout_ms)?;
        check_non_zero("chunk_size", self.chunk_size as u64)?;

        Ok(())
    }
}

/// The configuration of the broadcast server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// The port to listen on. Zero picks any free port.
    pub port: u16,

    /// Frames of exactly this many bytes are pushed to the client.
    pub frame_size: usize,

    /// Upper bound on each readiness wait.
    pub poll_timeout_ms: u64,

    /// Throttle between loop iterations.
    pub idle_delay_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERVER_PORT,
            frame_size: DEFAULT_FRAME_SIZE,
            poll_timeout_ms: 500,
            idle_delay_ms: 10,
        }
    }
}

impl ServerConfig {
    /// Deserialize a .ron file's contents.
    pub fn deserialize(input: &str) -> Result<Self, Error> {
        deserialize(input)
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> String {
        serialize_pretty(self)
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Result<Self, Error> {
        Self::deserialize(&read_to_string(p)?)
    }

    /// See [`ServerConfig::poll_timeout_ms`].
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// See [`ServerConfig::idle_delay_ms`].
    pub fn idle_delay(&self) -> Duration {
        Duration::from_millis(self.idle_delay_ms)
    }

    /// Check that the values make sense.
    pub fn validate(&self) -> Result<(), Error> {
        check_non_zero("frame_size", self.frame_size as u64)?;
        check_non_zero("poll_timeout_ms", self.poll_timeout_ms)?;

        Ok(())
    }
}
