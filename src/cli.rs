use std::net::Ipv4Addr;

use clap::Parser;

use crate::config::{BridgeConfig, ServerConfig};

/// Relay bytes between a serial port and a TCP server,
/// reconnecting whenever the network drops.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct BridgeCli {
    /// Server IP [default: 127.0.0.1]
    #[arg(short = 's', long = "server")]
    pub server: Option<Ipv4Addr>,

    /// Network port number [default: 42000]
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Uart port [default: /dev/ttyO1]
    #[arg(short, long)]
    pub uart: Option<String>,
}

impl BridgeCli {
    /// Overlay the given options on top of a configuration.
    pub fn apply(self, mut config: BridgeConfig) -> BridgeConfig {
        if let Some(server) = self.server {
            config.host = server;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(uart) = self.uart {
            config.device = uart;
        }

        config
    }
}

/// Push fixed-size frames from stdin to a single TCP client.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct ServerCli {
    /// Network port number [default: 42001]
    #[arg(short, long)]
    pub port: Option<u16>,
}

impl ServerCli {
    /// Overlay the given options on top of a configuration.
    pub fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(port) = self.port {
            config.port = port;
        }

        config
    }
}
