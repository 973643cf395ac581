//! submgr-fleet: keeps node inbounds in line with the subscriber store.
//!
//! # Architecture
//!
//! ```text
//! Reconciler (periodic trigger)
//!   └── SnapshotSource → Snapshot (nodes + subscribers, read-only)
//!       └── FleetSync
//!           ├── plan: desired entries per node, diff against live entries
//!           ├── one task per node (JoinSet), admission bounded by a Semaphore
//!           │   └── NodeAdmin calls, sequential within the node
//!           └── SyncReport (per-node outcome) → SuccessPolicy → FleetError
//! ```
//!
//! One unreachable node never stops the others. Every dispatched node
//! task is awaited (or cut off by the deadline) before a report is
//! produced, so failures are always observable.

pub mod error;
pub mod plan;
pub mod reconciler;
pub mod report;
pub mod sync;

pub use error::{FleetError, FleetResult};
pub use plan::{DesiredInbounds, NodeOp};
pub use reconciler::{Reconciler, SnapshotSource, StoreSource};
pub use report::{NodeFailure, NodeReport, Operation, SuccessPolicy, SyncReport};
pub use sync::{FleetSync, SyncConfig};
