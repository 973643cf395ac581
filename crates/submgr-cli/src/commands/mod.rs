pub mod fleet;
pub mod server;
pub mod subscriber;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use tracing::{debug, warn};

use submgr_core::SubmgrConfig;
use submgr_fleet::{FleetSync, SuccessPolicy, SyncConfig, SyncReport};
use submgr_node::{HttpNodeClient, RetryPolicy, Retrying};
use submgr_state::StateStore;

/// Everything a command needs: parsed config plus the open store.
pub struct Context {
    pub config: SubmgrConfig,
    pub store: StateStore,
}

impl Context {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let config = SubmgrConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?;
        let store_path = &config.store.path;
        if let Some(dir) = store_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let store = StateStore::open(store_path)
            .with_context(|| format!("opening store {}", store_path.display()))?;
        debug!(config = %path.display(), store = %store_path.display(), nodes = config.nodes.len(), "context loaded");
        Ok(Self { config, store })
    }

    /// Fleet synchronizer over HTTP node clients with bounded retries.
    pub fn fleet(&self) -> FleetSync {
        let sync = &self.config.sync;
        let client = HttpNodeClient::new(sync.call_timeout());
        let retry = RetryPolicy {
            attempts: sync.retry_attempts.max(1),
            base_backoff: sync.retry_backoff(),
            ..RetryPolicy::default()
        };
        FleetSync::new(Arc::new(Retrying::new(client, retry)), SyncConfig::from(sync))
    }
}

pub fn success_policy(require: Vec<String>, at_least: Option<usize>) -> SuccessPolicy {
    match (require.is_empty(), at_least) {
        (false, _) => SuccessPolicy::Required(require),
        (true, Some(n)) => SuccessPolicy::AtLeast(n),
        (true, None) => SuccessPolicy::AllNodes,
    }
}

/// Log the report, print the per-node outcome and apply the policy.
pub fn finish(report: &SyncReport, policy: &SuccessPolicy) -> anyhow::Result<()> {
    report.log();
    for node in &report.nodes {
        let status = if node.is_ok() { "ok" } else { "FAILED" };
        println!(
            "{:<20} {:<6} +{} -{}",
            node.node, status, node.added, node.removed
        );
        for e in &node.errors {
            println!("  {e}");
        }
    }
    let tolerated = report.check(policy)?;
    for failure in &tolerated {
        warn!(node = %failure.node, "tolerated node failure: {failure}");
    }
    println!(
        "{}: {} added, {} removed across {} node(s)",
        report.operation,
        report.added(),
        report.removed(),
        report.nodes.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn policy_from_flags() {
        assert_eq!(success_policy(vec![], None), SuccessPolicy::AllNodes);
        assert_eq!(success_policy(vec![], Some(3)), SuccessPolicy::AtLeast(3));
        assert_eq!(
            success_policy(vec!["tokyo".to_string()], None),
            SuccessPolicy::Required(vec!["tokyo".to_string()])
        );
    }

    #[test]
    fn context_opens_store_next_to_config() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("submgr.toml");
        let store_path = dir.path().join("data").join("subs.redb");
        std::fs::write(
            &config_path,
            format!("[store]\npath = {:?}\n", store_path.display().to_string()),
        )
        .unwrap();

        let ctx = Context::load(&config_path).unwrap();
        assert!(ctx.store.list_subscribers().unwrap().is_empty());
        assert!(store_path.exists());
        assert_eq!(ctx.config.sync.max_in_flight, 8);
    }
}
