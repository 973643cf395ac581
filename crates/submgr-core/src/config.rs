//! submgr.toml configuration parser.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Node;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmgrConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sync: SyncSettings,
    /// The fleet. Read-only to submgr; maintained by the operator.
    #[serde(default)]
    pub nodes: Vec<Node>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("submgr.redb"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Maximum nodes contacted at once.
    pub max_in_flight: usize,
    /// Timeout per node admin call (e.g. "5s").
    pub call_timeout: String,
    /// Overall deadline per fleet operation; unset means none.
    pub deadline: Option<String>,
    /// Attempts per call on transient failures, including the first.
    pub retry_attempts: u32,
    /// Initial retry backoff, doubled per attempt.
    pub retry_backoff: String,
    /// How often `server` reconciles the fleet.
    pub reconcile_interval: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            max_in_flight: 8,
            call_timeout: "5s".to_string(),
            deadline: Some("60s".to_string()),
            retry_attempts: 3,
            retry_backoff: "500ms".to_string(),
            reconcile_interval: "5m".to_string(),
        }
    }
}

impl SyncSettings {
    pub fn call_timeout(&self) -> Duration {
        parse_duration(&self.call_timeout).unwrap_or(Duration::from_secs(5))
    }

    pub fn deadline(&self) -> Option<Duration> {
        self.deadline.as_deref().and_then(parse_duration)
    }

    pub fn retry_backoff(&self) -> Duration {
        parse_duration(&self.retry_backoff).unwrap_or(Duration::from_millis(500))
    }

    pub fn reconcile_interval(&self) -> Duration {
        parse_duration(&self.reconcile_interval).unwrap_or(Duration::from_secs(300))
    }
}

impl SubmgrConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let config: SubmgrConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Node names must be unique in the fleet and inbound tags unique per node.
    pub fn validate(&self) -> anyhow::Result<()> {
        let mut names = HashSet::new();
        for node in &self.nodes {
            if !names.insert(node.name.as_str()) {
                anyhow::bail!("duplicate node name: {}", node.name);
            }
            let mut tags = HashSet::new();
            for inbound in &node.inbounds {
                if !tags.insert(inbound.tag.as_str()) {
                    anyhow::bail!("duplicate inbound tag {} on node {}", inbound.tag, node.name);
                }
            }
        }
        if self.sync.max_in_flight == 0 {
            anyhow::bail!("sync.max_in_flight must be at least 1");
        }
        let durations = [
            ("call_timeout", Some(&self.sync.call_timeout)),
            ("deadline", self.sync.deadline.as_ref()),
            ("retry_backoff", Some(&self.sync.retry_backoff)),
            ("reconcile_interval", Some(&self.sync.reconcile_interval)),
        ];
        for (key, value) in durations {
            let Some(value) = value else { continue };
            if parse_duration(value).is_none() {
                anyhow::bail!("sync.{key}: invalid duration {value:?} (expected e.g. 500ms, 5s, 2m, 1h)");
            }
        }
        Ok(())
    }
}

/// Parse a duration string like "5s", "500ms", "2m".
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else if let Some(hours) = s.strip_suffix('h') {
        hours.parse::<u64>().ok().map(|h| Duration::from_secs(h * 3600))
    } else {
        s.parse::<u64>().ok().map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Protocol;

    const SAMPLE: &str = r#"
[store]
path = "/var/lib/submgr/submgr.redb"

[sync]
max_in_flight = 4
call_timeout = "3s"

[[nodes]]
name = "tokyo"
address = "jp.example.com"
min_level = 3
admin = { url = "http://10.0.0.5:10085", api_key = "secret" }

[[nodes.inbounds]]
tag = "vless-ws"
protocol = "vless"
port = 443
transport = { network = "ws", security = "tls", path = "/ray" }

[[nodes.inbounds]]
tag = "ss"
protocol = "shadowsocks"
port = 8388
transport = { method = "aes-256-gcm" }
"#;

    #[test]
    fn parse_sample() {
        let config = SubmgrConfig::from_toml_str(SAMPLE).unwrap();
        assert_eq!(config.store.path, PathBuf::from("/var/lib/submgr/submgr.redb"));
        assert_eq!(config.server.listen, "0.0.0.0:8080");
        assert_eq!(config.sync.max_in_flight, 4);
        assert_eq!(config.sync.call_timeout(), Duration::from_secs(3));
        // Unset fields keep their defaults.
        assert_eq!(config.sync.retry_attempts, 3);

        let node = &config.nodes[0];
        assert_eq!(node.min_level, 3);
        assert_eq!(node.admin.api_key.as_deref(), Some("secret"));
        assert_eq!(node.inbounds[0].protocol, Protocol::Vless);
        assert_eq!(node.inbounds[0].transport.path.as_deref(), Some("/ray"));
        assert_eq!(node.inbounds[1].transport.method.as_deref(), Some("aes-256-gcm"));
    }

    #[test]
    fn parse_minimal() {
        let config = SubmgrConfig::from_toml_str("").unwrap();
        assert!(config.nodes.is_empty());
        assert_eq!(config.sync.deadline(), Some(Duration::from_secs(60)));
        assert_eq!(config.sync.reconcile_interval(), Duration::from_secs(300));
    }

    #[test]
    fn rejects_duplicate_node_names() {
        let toml_str = r#"
[[nodes]]
name = "a"
address = "a.example.com"
admin = { url = "http://10.0.0.1:1" }

[[nodes]]
name = "a"
address = "b.example.com"
admin = { url = "http://10.0.0.2:1" }
"#;
        assert!(SubmgrConfig::from_toml_str(toml_str).is_err());
    }

    #[test]
    fn rejects_bad_durations() {
        for sync in [
            "deadline = \"1 minute\"",
            "call_timeout = \"2.5s\"",
            "retry_backoff = \"-1s\"",
            "reconcile_interval = \"\"",
        ] {
            let err = SubmgrConfig::from_toml_str(&format!("[sync]\n{sync}\n")).unwrap_err();
            assert!(err.to_string().contains("invalid duration"), "{sync}: {err}");
        }
        assert!(SubmgrConfig::from_toml_str("[sync]\ndeadline = \"90s\"\n").is_ok());
    }

    #[test]
    fn round_trip_through_toml() {
        let config = SubmgrConfig::from_toml_str(SAMPLE).unwrap();
        let again = SubmgrConfig::from_toml_str(&config.to_toml_string().unwrap()).unwrap();
        assert_eq!(again.nodes, config.nodes);
    }

    #[test]
    fn parse_duration_units() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("5s"), Some(Duration::from_secs(5)));
        assert_eq!(parse_duration("2m"), Some(Duration::from_secs(120)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("10"), Some(Duration::from_secs(10)));
        assert_eq!(parse_duration("soon"), None);
    }
}
