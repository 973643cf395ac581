//! Periodic reconciliation against the subscriber store.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info};

use submgr_core::{Node, Snapshot};
use submgr_state::StateStore;

use crate::error::FleetResult;
use crate::report::SyncReport;
use crate::sync::FleetSync;

/// Produces the snapshot a reconciliation pass works from.
pub trait SnapshotSource: Send + Sync {
    fn snapshot(&self) -> FleetResult<Snapshot>;
}

/// Subscribers from the store, nodes from configuration.
pub struct StoreSource {
    store: StateStore,
    nodes: Vec<Node>,
}

impl StoreSource {
    pub fn new(store: StateStore, nodes: Vec<Node>) -> Self {
        Self { store, nodes }
    }
}

impl SnapshotSource for StoreSource {
    fn snapshot(&self) -> FleetResult<Snapshot> {
        Ok(self.store.snapshot(&self.nodes)?)
    }
}

/// Re-applies the desired state on a timer so nodes that missed a
/// change (or restarted empty) converge without operator action.
pub struct Reconciler<S> {
    source: S,
    fleet: FleetSync,
}

impl<S: SnapshotSource> Reconciler<S> {
    pub fn new(source: S, fleet: FleetSync) -> Self {
        Self { source, fleet }
    }

    /// One full pass.
    pub async fn run_once(&self) -> FleetResult<SyncReport> {
        let snapshot = self.source.snapshot()?;
        let report = self.fleet.reconcile(&snapshot).await;
        report.log();
        Ok(report)
    }

    /// Run a pass immediately, then every `interval` until `shutdown`
    /// changes.
    pub async fn run(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = interval.as_secs(), "reconciler started");

        tokio::select! {
            _ = self.pass() => {}
            _ = shutdown.changed() => {
                info!("reconciler shutting down");
                return;
            }
        }

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => self.pass().await,
                _ = shutdown.changed() => {
                    info!("reconciler shutting down");
                    break;
                }
            }
        }
    }

    async fn pass(&self) {
        if let Err(e) = self.run_once().await {
            error!(error = %e, "reconciliation failed");
        }
    }
}
