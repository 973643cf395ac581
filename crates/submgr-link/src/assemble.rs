//! Subscription assembly.
//!
//! Walks the nodes in the order given, encodes one link per authorized
//! inbound, and collects failures instead of aborting the feed.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, warn};

use submgr_core::policy::authorized_inbounds;
use submgr_core::{AuthorizationPolicy, LinkError, Node, Subscriber};

use crate::encode::{LinkInput, encode};

/// A link that could not be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFailure {
    pub node: String,
    pub tag: String,
    pub error: LinkError,
}

/// A subscriber's feed plus the links left out of it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subscription {
    pub links: Vec<String>,
    pub errors: Vec<LinkFailure>,
}

impl Subscription {
    /// Newline-joined links.
    pub fn text(&self) -> String {
        self.links.join("\n")
    }

    /// Standard base64 of [`Subscription::text`], the form most clients poll.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.text())
    }
}

/// Build the subscription for `subscriber` over `nodes`.
///
/// Link order follows node order, then inbound declaration order.
pub fn assemble(
    subscriber: &Subscriber,
    nodes: &[Node],
    policy: &dyn AuthorizationPolicy,
    now: u64,
) -> Subscription {
    let mut subscription = Subscription::default();

    for node in nodes {
        for inbound in authorized_inbounds(policy, subscriber, node, now) {
            let credential = subscriber.credential(&node.name, inbound.protocol);
            let remark = node.remark(inbound);
            let input = LinkInput {
                remark: &remark,
                host: &node.address,
                inbound,
                credential: &credential,
            };
            match encode(&input) {
                Ok(link) => subscription.links.push(link),
                Err(error) => {
                    warn!(
                        subscriber = %subscriber.id,
                        node = %node.name,
                        tag = %inbound.tag,
                        %error,
                        "skipping link"
                    );
                    subscription.errors.push(LinkFailure {
                        node: node.name.clone(),
                        tag: inbound.tag.clone(),
                        error,
                    });
                }
            }
        }
    }

    debug!(
        subscriber = %subscriber.id,
        links = subscription.links.len(),
        errors = subscription.errors.len(),
        "subscription assembled"
    );
    subscription
}
