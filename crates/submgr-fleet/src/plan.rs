//! Desired node state and the diff against what a node reports.
//!
//! Everything here is pure: given a snapshot it decides which entries
//! each inbound should hold, and given a node's live entries it decides
//! the calls needed to get there.

use std::collections::BTreeMap;

use submgr_core::policy::authorized_inbounds;
use submgr_core::{AuthorizationPolicy, InboundUser, Node, Subscriber};

/// Desired entries for one node: inbound tag → entry key → entry.
/// Every inbound of the node is present, possibly with no entries.
pub type DesiredInbounds = BTreeMap<String, BTreeMap<String, InboundUser>>;

/// One node admin mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeOp {
    Add { tag: String, user: InboundUser },
    Remove { tag: String, email: String },
}

impl NodeOp {
    pub fn tag(&self) -> &str {
        match self {
            NodeOp::Add { tag, .. } | NodeOp::Remove { tag, .. } => tag,
        }
    }
}

/// Entries `node` should carry for `subscribers` under `policy`.
pub fn desired_for_node(
    node: &Node,
    subscribers: &[Subscriber],
    policy: &dyn AuthorizationPolicy,
    now: u64,
) -> DesiredInbounds {
    let mut desired: DesiredInbounds = node
        .inbounds
        .iter()
        .map(|i| (i.tag.clone(), BTreeMap::new()))
        .collect();

    for subscriber in subscribers {
        for inbound in authorized_inbounds(policy, subscriber, node, now) {
            if let Some(entries) = desired.get_mut(&inbound.tag) {
                entries.insert(
                    subscriber.id.clone(),
                    subscriber.entry(&node.name, inbound.protocol),
                );
            }
        }
    }
    desired
}

/// Add operations for one subscriber on one node.
pub fn grants(
    node: &Node,
    subscriber: &Subscriber,
    policy: &dyn AuthorizationPolicy,
    now: u64,
) -> Vec<NodeOp> {
    authorized_inbounds(policy, subscriber, node, now)
        .map(|inbound| NodeOp::Add {
            tag: inbound.tag.clone(),
            user: subscriber.entry(&node.name, inbound.protocol),
        })
        .collect()
}

/// Remove operations for `email` on every inbound of `node`.
pub fn revocations(node: &Node, email: &str) -> Vec<NodeOp> {
    node.inbounds
        .iter()
        .map(|inbound| NodeOp::Remove {
            tag: inbound.tag.clone(),
            email: email.to_string(),
        })
        .collect()
}

/// Calls that turn `live` into `desired` on inbound `tag`.
///
/// Stale keys are removed first. A desired entry is (re)added unless an
/// identical one is already live; the node admin replaces an entry whose
/// credential changed, so no explicit removal is issued for it.
pub fn diff(tag: &str, live: &[InboundUser], desired: &BTreeMap<String, InboundUser>) -> Vec<NodeOp> {
    let mut ops = Vec::new();

    let mut stale: Vec<&str> = live
        .iter()
        .map(|u| u.email.as_str())
        .filter(|email| !desired.contains_key(*email))
        .collect();
    stale.sort_unstable();
    stale.dedup();
    ops.extend(stale.into_iter().map(|email| NodeOp::Remove {
        tag: tag.to_string(),
        email: email.to_string(),
    }));

    for user in desired.values() {
        if !live.contains(user) {
            ops.push(NodeOp::Add {
                tag: tag.to_string(),
                user: user.clone(),
            });
        }
    }
    ops
}
