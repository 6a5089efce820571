use std::sync::Arc;

use anyhow::Context;
use presence_client::{HttpSessionClient, SessionClient};
use presence_swarm::{
    config::AppConfig,
    gauge::ViewerCountGauge,
    identity::{IdentityProvider, ProfileRotation},
    supervisor::PoolSupervisor,
    telemetry,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env();
    let _log_guard = telemetry::init(cfg.log_path.as_deref())?;

    info!(
        base_url = %cfg.base_url,
        owner_id = %cfg.owner_id,
        target_population = cfg.target_population,
        "starting presence swarm"
    );

    let client: Arc<dyn SessionClient> = Arc::new(
        HttpSessionClient::new(&cfg.base_url, cfg.owner_id.clone(), cfg.request_timeout())
            .context("failed to build presence client")?,
    );
    let identities: Arc<dyn IdentityProvider> = Arc::new(ProfileRotation::new());
    let gauge = ViewerCountGauge::new();
    let cancel = CancellationToken::new();

    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("shutdown requested");
                shutdown.cancel();
            }
            Err(err) => warn!(error = %err, "failed to listen for ctrl-c; running until killed"),
        }
    });

    let supervisor = PoolSupervisor::new(
        cfg.pool_settings(),
        client,
        identities,
        gauge.clone(),
        cancel.clone(),
    );
    let summary = supervisor.run().await;
    info!(
        spawned = summary.spawned,
        viewer_count = gauge.snapshot(),
        "worker pool launched"
    );

    cancel.cancelled().await;
    info!(viewer_count = gauge.snapshot(), "presence swarm stopped");
    Ok(())
}
