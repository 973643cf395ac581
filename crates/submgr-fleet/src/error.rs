//! Fleet operation errors.

use thiserror::Error;

use submgr_state::StateError;

use crate::report::NodeFailure;

pub type FleetResult<T> = Result<T, FleetError>;

#[derive(Debug, Error)]
pub enum FleetError {
    /// The request was malformed; no node was contacted.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The success policy was not met. Every failed node is listed.
    #[error("partial fleet failure: {}", describe(.failed))]
    PartialFleetFailure { failed: Vec<NodeFailure> },

    #[error(transparent)]
    Store(#[from] StateError),
}

fn describe(failed: &[NodeFailure]) -> String {
    failed
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}
