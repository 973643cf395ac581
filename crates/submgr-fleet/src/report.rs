//! Per-node outcomes of a fleet operation and the policy that judges them.

use std::fmt;

use tracing::{info, warn};

use submgr_node::{NodeError, NodeErrorKind};

use crate::error::{FleetError, FleetResult};

/// Which fleet operation produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AddSubscriber,
    RemoveSubscriber,
    Reconcile,
    Load,
    Empty,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::AddSubscriber => "add-subscriber",
            Operation::RemoveSubscriber => "remove-subscriber",
            Operation::Reconcile => "reconcile",
            Operation::Load => "load",
            Operation::Empty => "empty",
        };
        f.write_str(s)
    }
}

/// What happened on one node.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeReport {
    pub node: String,
    pub added: u32,
    pub removed: u32,
    pub errors: Vec<NodeError>,
}

impl NodeReport {
    pub fn new(node: &str) -> Self {
        Self {
            node: node.to_string(),
            ..Default::default()
        }
    }

    pub fn failed(node: &str, error: NodeError) -> Self {
        Self {
            node: node.to_string(),
            errors: vec![error],
            ..Default::default()
        }
    }

    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A node that did not fully apply an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeFailure {
    pub node: String,
    pub errors: Vec<NodeError>,
}

impl NodeFailure {
    /// Distinct error kinds, in first-seen order.
    pub fn kinds(&self) -> Vec<NodeErrorKind> {
        let mut kinds = Vec::new();
        for e in &self.errors {
            if !kinds.contains(&e.kind()) {
                kinds.push(e.kind());
            }
        }
        kinds
    }
}

impl fmt::Display for NodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:", self.node)?;
        for (i, e) in self.errors.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{e}")?;
        }
        Ok(())
    }
}

/// When a fleet operation counts as successful.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SuccessPolicy {
    /// Every targeted node must succeed.
    #[default]
    AllNodes,
    /// The named nodes must succeed; failures elsewhere are warnings.
    Required(Vec<String>),
    /// At least this many nodes must succeed.
    AtLeast(usize),
}

/// Outcome of one fleet operation, one entry per targeted node in
/// fleet order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub operation: Operation,
    pub nodes: Vec<NodeReport>,
}

impl SyncReport {
    pub fn node(&self, name: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.node == name)
    }

    pub fn added(&self) -> u32 {
        self.nodes.iter().map(|n| n.added).sum()
    }

    pub fn removed(&self) -> u32 {
        self.nodes.iter().map(|n| n.removed).sum()
    }

    pub fn is_success(&self) -> bool {
        self.nodes.iter().all(NodeReport::is_ok)
    }

    pub fn failures(&self) -> Vec<NodeFailure> {
        self.nodes
            .iter()
            .filter(|n| !n.is_ok())
            .map(|n| NodeFailure {
                node: n.node.clone(),
                errors: n.errors.clone(),
            })
            .collect()
    }

    /// Judge the report against `policy`.
    ///
    /// On success returns the failures that the policy tolerated, so the
    /// caller can surface them as warnings. Otherwise every failed node
    /// is carried in [`FleetError::PartialFleetFailure`].
    pub fn check(&self, policy: &SuccessPolicy) -> FleetResult<Vec<NodeFailure>> {
        let failed = self.failures();
        let satisfied = match policy {
            SuccessPolicy::AllNodes => failed.is_empty(),
            SuccessPolicy::Required(names) => {
                !failed.iter().any(|f| names.contains(&f.node))
                    && names.iter().all(|n| self.node(n).is_some())
            }
            SuccessPolicy::AtLeast(n) => self.nodes.len() - failed.len() >= *n,
        };
        if satisfied {
            Ok(failed)
        } else {
            Err(FleetError::PartialFleetFailure { failed })
        }
    }

    /// Emit one summary line plus one warning per failed node.
    pub fn log(&self) {
        let failed = self.failures();
        info!(
            operation = %self.operation,
            nodes = self.nodes.len(),
            added = self.added(),
            removed = self.removed(),
            failed = failed.len(),
            "fleet operation finished"
        );
        for failure in &failed {
            warn!(operation = %self.operation, node = %failure.node, errors = %failure, "node failed");
        }
    }
}
