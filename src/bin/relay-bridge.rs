use clap::Parser;
use color_eyre::Result;
use serial_relay::{
    bridge::Bridge,
    cli::BridgeCli,
    config::{BridgeConfig, CONFIG_ENV},
    endpoint::TcpConnector,
    logging, serial, shutdown,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = BridgeCli::parse();

    logging::init().await;

    let config = if let Some(config_path) = std::env::var_os(CONFIG_ENV) {
        debug!(?config_path, "Config from path");
        BridgeConfig::new_from_path(config_path)?
    } else {
        debug!("Default config");
        BridgeConfig::default()
    };

    let config = cli.apply(config);
    config.validate()?;

    info!(device = %config.device, remote = %config.remote(), "Starting bridge");

    let mut local = serial::open(&config.device, config.baud)?;

    let token = CancellationToken::new();
    shutdown::listen_for_signals(token.clone());

    let connector = TcpConnector::new(config.remote(), config.connect_timeout());
    match Bridge::new(config, connector).run(&mut local, token).await {
        Ok(()) => {}
        Err(e) if e.is_clean_exit() => error!(%e, "Gave up on the remote"),
        Err(e) => return Err(e.into()),
    }

    info!("Bridge stopped");

    Ok(())
}
