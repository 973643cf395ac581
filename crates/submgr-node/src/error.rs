//! Node call errors.

use std::fmt;

use thiserror::Error;

/// Failure of a single node admin call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// Connection failure or timeout. Transient.
    #[error("node unreachable: {0}")]
    Unreachable(String),

    /// The node refused the operation (unknown inbound, bad request).
    #[error("node rejected request: {0}")]
    Rejected(String),

    /// The node refused our API credential.
    #[error("node authentication failed: {0}")]
    Auth(String),
}

/// Error kind without the message, for aggregate reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeErrorKind {
    Unreachable,
    Rejected,
    Auth,
}

impl NodeError {
    pub fn kind(&self) -> NodeErrorKind {
        match self {
            NodeError::Unreachable(_) => NodeErrorKind::Unreachable,
            NodeError::Rejected(_) => NodeErrorKind::Rejected,
            NodeError::Auth(_) => NodeErrorKind::Auth,
        }
    }

    /// Only unreachable nodes are worth retrying.
    pub fn is_transient(&self) -> bool {
        self.kind() == NodeErrorKind::Unreachable
    }
}

impl fmt::Display for NodeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeErrorKind::Unreachable => "unreachable",
            NodeErrorKind::Rejected => "rejected",
            NodeErrorKind::Auth => "auth",
        };
        f.write_str(s)
    }
}
