//! Authorization: which subscribers may use which node inbounds.
//!
//! Authorization is derived on every call and never stored.

use crate::types::{Inbound, Node, Subscriber};

/// Decides whether a subscriber may use an inbound of a node.
pub trait AuthorizationPolicy: Send + Sync {
    fn authorizes(&self, subscriber: &Subscriber, node: &Node, inbound: &Inbound, now: u64) -> bool;
}

/// Default policy: level thresholds plus the node allow-list.
///
/// An expired subscriber is never authorized. A subscriber listed in
/// `node.allow` is authorized on every inbound of that node. Otherwise
/// the level must meet both the node's and the inbound's minimum.
#[derive(Debug, Clone, Copy, Default)]
pub struct LevelPolicy;

impl AuthorizationPolicy for LevelPolicy {
    fn authorizes(&self, subscriber: &Subscriber, node: &Node, inbound: &Inbound, now: u64) -> bool {
        if subscriber.is_expired(now) {
            return false;
        }
        if node.allow.iter().any(|id| id == &subscriber.id) {
            return true;
        }
        subscriber.level >= node.min_level && subscriber.level >= inbound.min_level.unwrap_or(0)
    }
}

/// Inbounds of `node` the subscriber is authorized on, in declaration order.
pub fn authorized_inbounds<'a>(
    policy: &'a dyn AuthorizationPolicy,
    subscriber: &'a Subscriber,
    node: &'a Node,
    now: u64,
) -> impl Iterator<Item = &'a Inbound> + 'a {
    node.inbounds
        .iter()
        .filter(move |inbound| policy.authorizes(subscriber, node, inbound, now))
}
