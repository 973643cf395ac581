//! The node admin surface.

use async_trait::async_trait;

use submgr_core::{InboundUser, Node};

use crate::error::NodeError;

/// Operations on one node's live inbound users.
///
/// `tag` names the inbound; `email` is the entry key (the subscriber id).
#[async_trait]
pub trait NodeAdmin: Send + Sync {
    /// Entries the inbound currently accepts.
    async fn list_users(&self, node: &Node, tag: &str) -> Result<Vec<InboundUser>, NodeError>;

    /// Add or replace an entry. Adding an identical entry succeeds.
    async fn add_user(&self, node: &Node, tag: &str, user: &InboundUser) -> Result<(), NodeError>;

    /// Remove an entry. Removing an absent entry succeeds.
    async fn remove_user(&self, node: &Node, tag: &str, email: &str) -> Result<(), NodeError>;
}
