//! Bounded retries for transient node failures.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use submgr_core::{InboundUser, Node};

use crate::admin::NodeAdmin;
use crate::error::NodeError;

/// How many times, and how patiently, to retry an unreachable node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first. 1 disables retries.
    pub attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(10),
        }
    }
}

/// Wraps a [`NodeAdmin`] and retries `Unreachable` failures with
/// exponential backoff. `Auth` and `Rejected` are returned at once.
pub struct Retrying<A> {
    inner: A,
    policy: RetryPolicy,
}

impl<A: NodeAdmin> Retrying<A> {
    pub fn new(inner: A, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    async fn retry<T, F, Fut>(&self, node: &Node, op: &str, mut call: F) -> Result<T, NodeError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, NodeError>>,
    {
        let mut backoff = self.policy.base_backoff;
        let mut attempt = 1;
        loop {
            match call().await {
                Err(e) if e.is_transient() && attempt < self.policy.attempts => {
                    warn!(
                        node = %node.name,
                        op,
                        attempt,
                        ?backoff,
                        error = %e,
                        "node unreachable, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(self.policy.max_backoff);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

#[async_trait]
impl<A: NodeAdmin> NodeAdmin for Retrying<A> {
    async fn list_users(&self, node: &Node, tag: &str) -> Result<Vec<InboundUser>, NodeError> {
        self.retry(node, "list_users", || self.inner.list_users(node, tag))
            .await
    }

    async fn add_user(&self, node: &Node, tag: &str, user: &InboundUser) -> Result<(), NodeError> {
        self.retry(node, "add_user", || self.inner.add_user(node, tag, user))
            .await
    }

    async fn remove_user(&self, node: &Node, tag: &str, email: &str) -> Result<(), NodeError> {
        self.retry(node, "remove_user", || self.inner.remove_user(node, tag, email))
            .await
    }
}
