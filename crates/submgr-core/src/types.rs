//! Domain types shared across submgr crates.
//!
//! Nodes and their inbounds come from the fleet configuration file.
//! Subscribers come from the state store. Both are handed to the
//! synchronizer and the link assembler as a read-only [`Snapshot`].

use std::collections::BTreeMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable external identifier of a subscriber (a UUID string).
pub type SubscriberId = String;

// ── Protocols ─────────────────────────────────────────────────────

/// Proxy protocols a node inbound can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Vmess,
    Vless,
    Trojan,
    Shadowsocks,
}

impl Protocol {
    /// URI scheme of the protocol's share link.
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Vmess => "vmess",
            Protocol::Vless => "vless",
            Protocol::Trojan => "trojan",
            Protocol::Shadowsocks => "ss",
        }
    }

    /// Whether users of this protocol are identified by a UUID rather
    /// than a password.
    pub fn uses_uuid(&self) -> bool {
        matches!(self, Protocol::Vmess | Protocol::Vless)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Protocol::Vmess => "vmess",
            Protocol::Vless => "vless",
            Protocol::Trojan => "trojan",
            Protocol::Shadowsocks => "shadowsocks",
        };
        f.write_str(name)
    }
}

// ── Node ──────────────────────────────────────────────────────────

/// Transport options declared by a node for one inbound.
///
/// Values are kept as strings; the link encoders decide what is
/// recognized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// "tcp" (default), "ws", "grpc", "http"/"h2".
    pub network: Option<String>,
    /// "none", "tls", "reality".
    pub security: Option<String>,
    /// WebSocket or HTTP/2 path.
    pub path: Option<String>,
    /// Host header override.
    pub host: Option<String>,
    /// gRPC service name.
    pub service_name: Option<String>,
    /// TLS server name.
    pub sni: Option<String>,
    /// VLESS flow control (e.g. "xtls-rprx-vision").
    pub flow: Option<String>,
    /// Shadowsocks cipher.
    pub method: Option<String>,
}

/// A listener on a node accepting users of one protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inbound {
    /// Inbound tag, unique per node. Node admin calls address it.
    pub tag: String,
    pub protocol: Protocol,
    pub port: u32,
    /// Per-inbound level requirement on top of the node's.
    #[serde(default)]
    pub min_level: Option<u32>,
    #[serde(default)]
    pub transport: TransportSettings,
}

/// Where and how to reach a node's administrative API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminEndpoint {
    /// Base URL, e.g. `http://10.0.0.5:10085/api`.
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

/// A proxy server in the fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    /// Host that clients dial.
    pub address: String,
    pub admin: AdminEndpoint,
    #[serde(default)]
    pub min_level: u32,
    /// Subscriber ids authorized regardless of level.
    #[serde(default)]
    pub allow: Vec<SubscriberId>,
    #[serde(default)]
    pub inbounds: Vec<Inbound>,
}

impl Node {
    pub fn inbound(&self, tag: &str) -> Option<&Inbound> {
        self.inbounds.iter().find(|i| i.tag == tag)
    }

    /// Display name used as the link remark.
    pub fn remark(&self, inbound: &Inbound) -> String {
        if self.inbounds.len() > 1 {
            format!("{}-{}", self.name, inbound.tag)
        } else {
            self.name.clone()
        }
    }
}

// ── Subscriber ────────────────────────────────────────────────────

/// Explicit per-node credentials that replace the derived ones.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialOverride {
    pub uuid: Option<String>,
    pub password: Option<String>,
}

/// A subscriber account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscriber {
    pub id: SubscriberId,
    pub name: String,
    pub level: u32,
    /// Unix timestamp after which the subscriber loses all access.
    #[serde(default)]
    pub expires_at: Option<u64>,
    /// Credential overrides keyed by node name.
    #[serde(default)]
    pub credentials: BTreeMap<String, CredentialOverride>,
    #[serde(default)]
    pub created_at: u64,
}

impl Subscriber {
    pub fn new(id: &str, name: &str, level: u32) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            level,
            expires_at: None,
            credentials: BTreeMap::new(),
            created_at: epoch_secs(),
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|t| t <= now)
    }

    /// The credential this subscriber uses on `node` for `protocol`.
    pub fn credential(&self, node: &str, protocol: Protocol) -> Credential {
        let overrides = self.credentials.get(node);
        if protocol.uses_uuid() {
            let uuid = overrides
                .and_then(|o| o.uuid.clone())
                .unwrap_or_else(|| self.id.clone());
            Credential::Id(uuid)
        } else {
            let password = overrides
                .and_then(|o| o.password.clone())
                .unwrap_or_else(|| derive_password(&self.id, node));
            Credential::Password(password)
        }
    }

    /// The live entry a node should hold for this subscriber.
    pub fn entry(&self, node: &str, protocol: Protocol) -> InboundUser {
        InboundUser {
            email: self.id.clone(),
            credential: self.credential(node, protocol),
        }
    }
}

/// Deterministic per-node password: first 32 hex chars of
/// `sha256("{id}:{node}")`.
pub fn derive_password(id: &str, node: &str) -> String {
    let digest = Sha256::digest(format!("{id}:{node}").as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(32);
    hex
}

// ── Live entries ──────────────────────────────────────────────────

/// Credential material carried by an inbound user entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Credential {
    Id(String),
    Password(String),
}

/// One user entry in a node inbound. `email` is the subscriber id and
/// is the key nodes use for removal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InboundUser {
    pub email: String,
    pub credential: Credential,
}

// ── Snapshot ──────────────────────────────────────────────────────

/// Read-only view of nodes and subscribers for one operation.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub subscribers: Vec<Subscriber>,
    /// Unix timestamp the snapshot was taken; authorization uses it as "now".
    pub taken_at: u64,
}

impl Snapshot {
    pub fn new(nodes: Vec<Node>, subscribers: Vec<Subscriber>) -> Self {
        Self {
            nodes,
            subscribers,
            taken_at: epoch_secs(),
        }
    }

    pub fn at(mut self, taken_at: u64) -> Self {
        self.taken_at = taken_at;
        self
    }

    pub fn subscriber(&self, id: &str) -> Option<&Subscriber> {
        self.subscribers.iter().find(|s| s.id == id)
    }

    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }
}

pub fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: &str = "6f1c2a3e-9b4d-4e5f-8a7b-1c2d3e4f5a6b";

    #[test]
    fn uuid_credential_defaults_to_subscriber_id() {
        let sub = Subscriber::new(ID, "alice", 1);
        assert_eq!(sub.credential("tokyo", Protocol::Vless), Credential::Id(ID.to_string()));
        assert_eq!(sub.credential("tokyo", Protocol::Vmess), Credential::Id(ID.to_string()));
    }

    #[test]
    fn derived_password_is_stable_and_per_node() {
        let sub = Subscriber::new(ID, "alice", 1);
        let a = sub.credential("tokyo", Protocol::Trojan);
        let b = sub.credential("tokyo", Protocol::Shadowsocks);
        let c = sub.credential("paris", Protocol::Trojan);
        assert_eq!(a, b);
        assert_ne!(a, c);
        match a {
            Credential::Password(p) => assert_eq!(p.len(), 32),
            other => panic!("expected password, got {other:?}"),
        }
    }

    #[test]
    fn overrides_replace_derived_credentials() {
        let mut sub = Subscriber::new(ID, "alice", 1);
        sub.credentials.insert(
            "tokyo".to_string(),
            CredentialOverride {
                uuid: None,
                password: Some("hunter2".to_string()),
            },
        );
        assert_eq!(
            sub.credential("tokyo", Protocol::Trojan),
            Credential::Password("hunter2".to_string())
        );
        // No uuid override, so the id is still used.
        assert_eq!(sub.credential("tokyo", Protocol::Vless), Credential::Id(ID.to_string()));
    }

    #[test]
    fn expiry() {
        let mut sub = Subscriber::new(ID, "alice", 1);
        assert!(!sub.is_expired(u64::MAX));
        sub.expires_at = Some(100);
        assert!(!sub.is_expired(99));
        assert!(sub.is_expired(100));
    }

    #[test]
    fn credential_json_shape() {
        let user = InboundUser {
            email: ID.to_string(),
            credential: Credential::Password("pw".to_string()),
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["credential"]["kind"], "password");
        assert_eq!(json["credential"]["value"], "pw");
    }

    #[test]
    fn remark_includes_tag_only_for_multi_inbound_nodes() {
        let inbound = |tag: &str| Inbound {
            tag: tag.to_string(),
            protocol: Protocol::Trojan,
            port: 443,
            min_level: None,
            transport: TransportSettings::default(),
        };
        let mut node = Node {
            name: "tokyo".to_string(),
            address: "jp.example.com".to_string(),
            admin: AdminEndpoint {
                url: "http://10.0.0.1:10085".to_string(),
                api_key: None,
            },
            min_level: 0,
            allow: vec![],
            inbounds: vec![inbound("trojan-tls")],
        };
        assert_eq!(node.remark(&node.inbounds[0]), "tokyo");
        node.inbounds.push(inbound("ws"));
        assert_eq!(node.remark(&node.inbounds[1]), "tokyo-ws");
    }
}
