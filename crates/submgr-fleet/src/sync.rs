//! Concurrent fan-out of node admin calls.
//!
//! Each targeted node gets its own task. A semaphore bounds how many
//! node tasks run at once; calls within one node stay sequential so a
//! node never sees a removal and an addition for the same key race.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;
use tracing::{debug, error, warn};

use submgr_core::config::SyncSettings;
use submgr_core::{AuthorizationPolicy, LevelPolicy, Node, Snapshot, Uuid};
use submgr_node::{NodeAdmin, NodeError};

use crate::error::{FleetError, FleetResult};
use crate::plan::{self, DesiredInbounds, NodeOp};
use crate::report::{NodeReport, Operation, SyncReport};

/// Concurrency limits for a fleet operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    /// Node tasks allowed to run at once.
    pub max_in_flight: usize,
    /// Overall bound on one operation. Nodes still pending when it
    /// passes are reported unreachable.
    pub deadline: Option<Duration>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            deadline: Some(Duration::from_secs(60)),
        }
    }
}

impl From<&SyncSettings> for SyncConfig {
    fn from(settings: &SyncSettings) -> Self {
        Self {
            max_in_flight: settings.max_in_flight,
            deadline: settings.deadline(),
        }
    }
}

/// Work for a single node.
enum NodeTask {
    /// Issue these calls in order.
    Apply(Vec<NodeOp>),
    /// List each inbound, diff against the desired entries, then apply.
    Converge(DesiredInbounds),
}

/// Propagates subscriber changes to every node in a snapshot.
pub struct FleetSync {
    admin: Arc<dyn NodeAdmin>,
    policy: Arc<dyn AuthorizationPolicy>,
    config: SyncConfig,
}

impl FleetSync {
    pub fn new(admin: Arc<dyn NodeAdmin>, config: SyncConfig) -> Self {
        Self {
            admin,
            policy: Arc::new(LevelPolicy),
            config,
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn AuthorizationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &dyn AuthorizationPolicy {
        self.policy.as_ref()
    }

    /// Grant subscriber `id` on every node and inbound it is authorized for.
    pub async fn add_subscriber(&self, snapshot: &Snapshot, id: &str) -> FleetResult<SyncReport> {
        let id = validate_id(id)?;
        let subscriber = snapshot
            .subscriber(&id)
            .ok_or_else(|| FleetError::Validation(format!("unknown subscriber {id}")))?;

        let tasks = snapshot
            .nodes
            .iter()
            .filter_map(|node| {
                let ops = plan::grants(node, subscriber, self.policy(), snapshot.taken_at);
                (!ops.is_empty()).then(|| (node.clone(), NodeTask::Apply(ops)))
            })
            .collect();
        Ok(self.dispatch(Operation::AddSubscriber, tasks).await)
    }

    /// Revoke subscriber `id` from every inbound of every node.
    ///
    /// Authorization is not consulted: the subscriber's level may have
    /// changed since the entries were granted. The subscriber need not
    /// be in the snapshot any more.
    pub async fn remove_subscriber(&self, snapshot: &Snapshot, id: &str) -> FleetResult<SyncReport> {
        let id = validate_id(id)?;
        let tasks = snapshot
            .nodes
            .iter()
            .filter(|node| !node.inbounds.is_empty())
            .map(|node| (node.clone(), NodeTask::Apply(plan::revocations(node, &id))))
            .collect();
        Ok(self.dispatch(Operation::RemoveSubscriber, tasks).await)
    }

    /// Converge every node on the desired state of the snapshot: missing
    /// entries are added, changed ones replaced, stale ones removed.
    pub async fn reconcile(&self, snapshot: &Snapshot) -> SyncReport {
        let tasks = snapshot
            .nodes
            .iter()
            .map(|node| {
                let desired =
                    plan::desired_for_node(node, &snapshot.subscribers, self.policy(), snapshot.taken_at);
                (node.clone(), NodeTask::Converge(desired))
            })
            .collect();
        self.dispatch(Operation::Reconcile, tasks).await
    }

    /// Push every authorized entry without listing or removing anything.
    pub async fn load(&self, snapshot: &Snapshot) -> SyncReport {
        let tasks = snapshot
            .nodes
            .iter()
            .filter_map(|node| {
                let ops: Vec<NodeOp> = snapshot
                    .subscribers
                    .iter()
                    .flat_map(|s| plan::grants(node, s, self.policy(), snapshot.taken_at))
                    .collect();
                (!ops.is_empty()).then(|| (node.clone(), NodeTask::Apply(ops)))
            })
            .collect();
        self.dispatch(Operation::Load, tasks).await
    }

    /// Remove every entry from every inbound of every node.
    pub async fn empty(&self, snapshot: &Snapshot) -> SyncReport {
        let tasks = snapshot
            .nodes
            .iter()
            .map(|node| {
                let nothing: DesiredInbounds = node
                    .inbounds
                    .iter()
                    .map(|i| (i.tag.clone(), Default::default()))
                    .collect();
                (node.clone(), NodeTask::Converge(nothing))
            })
            .collect();
        self.dispatch(Operation::Empty, tasks).await
    }

    /// Run one task per node and wait for all of them or the deadline.
    ///
    /// Calls a node confirmed before the deadline stay in its report even
    /// when the rest of its work is cut off.
    async fn dispatch(&self, operation: Operation, tasks: Vec<(Node, NodeTask)>) -> SyncReport {
        let progress: Vec<Arc<Mutex<NodeReport>>> = tasks
            .iter()
            .map(|(node, _)| Arc::new(Mutex::new(NodeReport::new(&node.name))))
            .collect();
        let mut finished = vec![false; tasks.len()];
        let semaphore = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let mut set = JoinSet::new();

        debug!(%operation, nodes = tasks.len(), max_in_flight = self.config.max_in_flight, "dispatching");
        for (index, (node, task)) in tasks.into_iter().enumerate() {
            let admin = Arc::clone(&self.admin);
            let semaphore = Arc::clone(&semaphore);
            let report = Arc::clone(&progress[index]);
            set.spawn(async move {
                // The semaphore is never closed, so acquisition only waits.
                let _permit = semaphore.acquire_owned().await.ok();
                run_node(admin.as_ref(), &node, task, &report).await;
                index
            });
        }

        let deadline = self.config.deadline.map(|d| Instant::now() + d);
        let mut cut_off = false;
        loop {
            let next = match deadline {
                Some(at) => match tokio::time::timeout_at(at, set.join_next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        // Keep whatever finished in the meantime.
                        while let Some(joined) = set.try_join_next() {
                            collect(joined, &mut finished);
                        }
                        set.abort_all();
                        cut_off = true;
                        break;
                    }
                },
                None => set.join_next().await,
            };
            match next {
                Some(joined) => collect(joined, &mut finished),
                None => break,
            }
        }

        // An unfinished node was cut off by the deadline or its task died;
        // either way it did not confirm the whole operation.
        let reason = if cut_off {
            "deadline exceeded"
        } else {
            "sync task aborted"
        };
        let nodes = progress
            .iter()
            .zip(finished)
            .map(|(report, done)| {
                let mut report = std::mem::take(&mut *lock(report));
                if !done {
                    warn!(%operation, node = %report.node, added = report.added, removed = report.removed, reason, "node did not finish");
                    report.errors.push(NodeError::Unreachable(reason.to_string()));
                }
                report
            })
            .collect();
        SyncReport { operation, nodes }
    }
}

/// Parse a subscriber id into its canonical lowercase hyphenated form.
fn validate_id(id: &str) -> FleetResult<String> {
    Uuid::parse_str(id)
        .map(|u| u.hyphenated().to_string())
        .map_err(|e| FleetError::Validation(format!("malformed subscriber id {id:?}: {e}")))
}

fn lock(report: &Mutex<NodeReport>) -> MutexGuard<'_, NodeReport> {
    report.lock().unwrap_or_else(PoisonError::into_inner)
}

fn collect(joined: Result<usize, JoinError>, finished: &mut [bool]) {
    match joined {
        Ok(index) => finished[index] = true,
        Err(e) if e.is_cancelled() => {}
        Err(e) => error!(error = %e, "node sync task panicked"),
    }
}

/// Work through one node, recording each confirmed call in `report` as
/// it lands.
async fn run_node(admin: &dyn NodeAdmin, node: &Node, task: NodeTask, report: &Mutex<NodeReport>) {
    match task {
        NodeTask::Apply(ops) => {
            apply(admin, node, ops, report).await;
        }
        NodeTask::Converge(desired) => {
            for (tag, want) in &desired {
                let live = match admin.list_users(node, tag).await {
                    Ok(live) => live,
                    Err(e) => {
                        let fatal = halts_node(&e);
                        warn!(node = %node.name, %tag, error = %e, "listing inbound failed");
                        lock(report).errors.push(e);
                        if fatal {
                            break;
                        }
                        continue;
                    }
                };
                let ops = plan::diff(tag, &live, want);
                if !apply(admin, node, ops, report).await {
                    break;
                }
            }
        }
    }
    let done = lock(report);
    debug!(node = %node.name, added = done.added, removed = done.removed, errors = done.errors.len(), "node done");
    drop(done);
}

/// Issue `ops` in order. Returns false once the node should not be
/// contacted again for this operation.
async fn apply(admin: &dyn NodeAdmin, node: &Node, ops: Vec<NodeOp>, report: &Mutex<NodeReport>) -> bool {
    for op in ops {
        let result = match &op {
            NodeOp::Add { tag, user } => admin.add_user(node, tag, user).await,
            NodeOp::Remove { tag, email } => admin.remove_user(node, tag, email).await,
        };
        match (result, &op) {
            (Ok(()), NodeOp::Add { .. }) => lock(report).added += 1,
            (Ok(()), NodeOp::Remove { .. }) => lock(report).removed += 1,
            (Err(e), _) => {
                let fatal = halts_node(&e);
                warn!(node = %node.name, tag = %op.tag(), error = %e, "node call failed");
                lock(report).errors.push(e);
                if fatal {
                    return false;
                }
            }
        }
    }
    true
}

/// Unreachable and auth failures will repeat for every remaining call.
fn halts_node(e: &NodeError) -> bool {
    !matches!(e, NodeError::Rejected(_))
}
