//! Feed server with periodic reconciliation.

use tokio::sync::watch;
use tracing::{error, info};

use submgr_api::{ApiState, build_router};
use submgr_fleet::{Reconciler, StoreSource};

use super::Context;

pub async fn run(ctx: Context, listen: Option<String>) -> anyhow::Result<()> {
    let listen = listen.unwrap_or_else(|| ctx.config.server.listen.clone());
    let interval = ctx.config.sync.reconcile_interval();
    info!(nodes = ctx.config.nodes.len(), "submgr server starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let reconciler = Reconciler::new(
        StoreSource::new(ctx.store.clone(), ctx.config.nodes.clone()),
        ctx.fleet(),
    );
    let reconcile_handle = tokio::spawn(async move {
        reconciler.run(interval, shutdown_rx).await;
    });

    let router = build_router(ApiState::new(ctx.store, ctx.config.nodes));
    let listener = tokio::net::TcpListener::bind(&listen).await?;
    info!(addr = %listen, "feed server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for ctrl-c");
            }
            info!("shutdown signal received");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    if let Err(e) = reconcile_handle.await {
        error!(error = %e, "reconciler task failed");
    }
    info!("submgr server stopped");
    Ok(())
}
