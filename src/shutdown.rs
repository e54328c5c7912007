use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let (mut terminate, mut hangup) =
        match (signal(SignalKind::terminate()), signal(SignalKind::hangup())) {
            (Ok(terminate), Ok(hangup)) => (terminate, hangup),
            (Err(e), _) | (_, Err(e)) => {
                warn!(?e, "Can't catch SIGTERM/SIGHUP, only Ctrl-C will stop us");

                return match tokio::signal::ctrl_c().await {
                    Ok(()) => "SIGINT",
                    Err(_) => std::future::pending().await,
                };
            }
        };

    tokio::select! {
        _ = tokio::signal::ctrl_c() => "SIGINT",
        _ = terminate.recv() => "SIGTERM",
        _ = hangup.recv() => "SIGHUP",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "Ctrl-C",
        Err(e) => {
            warn!(?e, "Can't catch Ctrl-C");
            std::future::pending().await
        }
    }
}

/// Cancel the token when the process is asked to stop.
///
/// The relay loops notice the cancellation at their next bounded wait.
pub fn listen_for_signals(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let which = wait_for_signal().await;
        info!(signal = which, "Caught signal, quitting");

        token.cancel();
    })
}
