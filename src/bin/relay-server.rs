use clap::Parser;
use color_eyre::Result;
use serial_relay::{
    cli::ServerCli,
    config::{ServerConfig, CONFIG_ENV},
    logging,
    server::BroadcastServer,
    shutdown,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = ServerCli::parse();

    logging::init().await;

    let config = if let Some(config_path) = std::env::var_os(CONFIG_ENV) {
        debug!(?config_path, "Config from path");
        ServerConfig::new_from_path(config_path)?
    } else {
        debug!("Default config");
        ServerConfig::default()
    };

    let server = BroadcastServer::bind(cli.apply(config))?;

    let token = CancellationToken::new();
    shutdown::listen_for_signals(token.clone());

    // The input is whatever is piped in, e.g. an audio capture.
    server.run(tokio::io::stdin(), token).await;

    // A blocking read of stdin may still be in flight,
    // the runtime would otherwise wait for it on drop.
    std::process::exit(0)
}
