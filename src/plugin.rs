use crate::config::schema::AppConfig;
use crate::error::Result;
use crate::event::{HostCommand, Registration};
use crate::host;
use crate::obs::{ObsClient, Offline, SceneRemote};
use crate::router::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Run the plugin until the host disconnects or the process is interrupted.
///
/// # Errors
/// Returns `PluginError` if the host connection cannot be established.
/// An unreachable OBS is logged and tolerated.
pub async fn run(config: AppConfig, port: u16, registration: Registration) -> Result<()> {
    let cancel = CancellationToken::new();
    let mut host = host::connect(port, &registration, &cancel).await?;

    let remote: Arc<dyn SceneRemote> = match ObsClient::connect(&config.obs, &cancel).await {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("cannot connect to OBS at {}: {e}", config.obs.url());
            let _ = host
                .commands
                .send(HostCommand::log(format!("scenefade: OBS unavailable: {e}")));
            Arc::new(Offline)
        }
    };

    let mut router = Router::new(remote, host.commands.clone(), config.plugin.overlap);
    info!("scenefade running, overlap policy: {:?}", config.plugin.overlap);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            () = async { tokio::signal::ctrl_c().await.ok(); } => {
                info!("received SIGINT, shutting down");
                break;
            }
            event = host.events.recv() => match event {
                Some(event) => {
                    router.handle_event(event);
                }
                None => {
                    info!("host connection closed, shutting down");
                    break;
                }
            },
        }
    }

    if tokio::time::timeout(SHUTDOWN_GRACE, router.shutdown())
        .await
        .is_err()
    {
        info!("fades still running after {SHUTDOWN_GRACE:?}, abandoning them");
    }
    drop(router);
    if tokio::time::timeout(SHUTDOWN_GRACE, host.close()).await.is_err() {
        info!("host commands not flushed after {SHUTDOWN_GRACE:?}");
    }
    cancel.cancel();

    info!("plugin stopped");
    Ok(())
}
