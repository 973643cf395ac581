//! Protocol encoders.
//!
//! [`encode`] dispatches on the closed [`Protocol`] set. Each encoder
//! validates the endpoint through [`submgr_core::resolve`], checks the
//! inbound's transport settings, and renders the protocol's share-link
//! grammar. Output is deterministic for identical input.

use base64::Engine as _;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use serde::Serialize;
use url::Url;

use submgr_core::{Credential, Inbound, LinkError, Protocol, TransportSettings, Uuid, resolve};

/// Everything an encoder needs for one link.
#[derive(Debug, Clone, Copy)]
pub struct LinkInput<'a> {
    /// Display name shown by clients.
    pub remark: &'a str,
    /// Host clients dial.
    pub host: &'a str,
    pub inbound: &'a Inbound,
    pub credential: &'a Credential,
}

/// Encode one share link.
pub fn encode(input: &LinkInput<'_>) -> Result<String, LinkError> {
    match input.inbound.protocol {
        Protocol::Vmess => vmess(input),
        Protocol::Vless => vless(input),
        Protocol::Trojan => trojan(input),
        Protocol::Shadowsocks => shadowsocks(input),
    }
}

// ── Transport parameters ──────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Network {
    Tcp,
    Ws,
    Grpc,
    Http,
}

impl Network {
    fn parse(value: Option<&str>) -> Result<Self, LinkError> {
        match value.unwrap_or("tcp") {
            "tcp" => Ok(Network::Tcp),
            "ws" => Ok(Network::Ws),
            "grpc" => Ok(Network::Grpc),
            "http" | "h2" => Ok(Network::Http),
            other => Err(LinkError::unsupported("network", other)),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Network::Tcp => "tcp",
            Network::Ws => "ws",
            Network::Grpc => "grpc",
            Network::Http => "http",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Security {
    None,
    Tls,
    Reality,
}

impl Security {
    fn parse(value: Option<&str>, default: Security) -> Result<Self, LinkError> {
        match value {
            None => Ok(default),
            Some("none") => Ok(Security::None),
            Some("tls") => Ok(Security::Tls),
            Some("reality") => Ok(Security::Reality),
            Some(other) => Err(LinkError::unsupported("security", other)),
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Security::None => "none",
            Security::Tls => "tls",
            Security::Reality => "reality",
        }
    }
}

/// Validated stream settings shared by VMess, VLESS and Trojan.
struct Stream<'a> {
    network: Network,
    security: Security,
    path: Option<&'a str>,
    host: Option<&'a str>,
    service_name: Option<&'a str>,
    sni: Option<&'a str>,
}

impl<'a> Stream<'a> {
    fn from_settings(t: &'a TransportSettings, default_security: Security) -> Result<Self, LinkError> {
        let network = Network::parse(t.network.as_deref())?;
        let security = Security::parse(t.security.as_deref(), default_security)?;
        match network {
            Network::Ws if t.path.is_none() => return Err(LinkError::missing("path")),
            Network::Grpc if t.service_name.is_none() => {
                return Err(LinkError::missing("service_name"));
            }
            _ => {}
        }
        Ok(Self {
            network,
            security,
            path: t.path.as_deref(),
            host: t.host.as_deref(),
            service_name: t.service_name.as_deref(),
            sni: t.sni.as_deref(),
        })
    }

    /// Query parameters in the order mainstream clients emit them.
    fn append_query(&self, q: &mut url::form_urlencoded::Serializer<'_, String>) {
        q.append_pair("security", self.security.as_str());
        if let Some(sni) = self.sni {
            q.append_pair("sni", sni);
        }
        q.append_pair("type", self.network.as_str());
        match self.network {
            Network::Ws | Network::Http => {
                if let Some(host) = self.host {
                    q.append_pair("host", host);
                }
                if let Some(path) = self.path {
                    q.append_pair("path", path);
                }
            }
            Network::Grpc => {
                if let Some(name) = self.service_name {
                    q.append_pair("serviceName", name);
                }
            }
            Network::Tcp => {}
        }
    }
}

// ── Credentials ───────────────────────────────────────────────────

/// The credential as a lowercase hyphenated UUID.
fn uuid_credential(protocol: Protocol, credential: &Credential) -> Result<String, LinkError> {
    match credential {
        Credential::Id(id) => Uuid::parse_str(id)
            .map(|u| u.hyphenated().to_string())
            .map_err(|e| LinkError::Encoding(format!("malformed uuid {id:?}: {e}"))),
        Credential::Password(_) => Err(LinkError::Encoding(format!(
            "{protocol} requires a uuid credential"
        ))),
    }
}

fn password_credential<'a>(protocol: Protocol, credential: &'a Credential) -> Result<&'a str, LinkError> {
    match credential {
        Credential::Password(p) if !p.is_empty() => Ok(p),
        Credential::Password(_) => Err(LinkError::Encoding("empty password".to_string())),
        Credential::Id(_) => Err(LinkError::Encoding(format!(
            "{protocol} requires a password credential"
        ))),
    }
}

// ── URL helpers ───────────────────────────────────────────────────

/// `{scheme}://{userinfo}@{host}:{port}` with userinfo percent-encoded.
fn authority_url(scheme: &str, input: &LinkInput<'_>, userinfo: &str) -> Result<Url, LinkError> {
    let endpoint = resolve(input.host, input.inbound.port)?;
    let mut url = Url::parse(&format!("{scheme}://{endpoint}"))
        .map_err(|e| LinkError::Encoding(format!("invalid endpoint {endpoint}: {e}")))?;
    url.set_username(userinfo)
        .map_err(|()| LinkError::Encoding("cannot carry user info".to_string()))?;
    Ok(url)
}

fn finish(mut url: Url, query: Option<String>, remark: &str) -> String {
    url.set_query(query.as_deref());
    url.set_fragment(Some(remark));
    url.into()
}

// ── Encoders ──────────────────────────────────────────────────────

/// v2rayN's VMess JSON. Field order is part of the format.
#[derive(Serialize)]
struct VmessJson<'a> {
    v: &'a str,
    ps: &'a str,
    add: &'a str,
    port: String,
    id: &'a str,
    aid: &'a str,
    scy: &'a str,
    net: &'a str,
    #[serde(rename = "type")]
    header_type: &'a str,
    host: &'a str,
    path: &'a str,
    tls: &'a str,
    sni: &'a str,
}

fn vmess(input: &LinkInput<'_>) -> Result<String, LinkError> {
    let endpoint = resolve(input.host, input.inbound.port)?;
    let stream = Stream::from_settings(&input.inbound.transport, Security::None)?;
    let id = uuid_credential(Protocol::Vmess, input.credential)?;
    let add = endpoint
        .rsplit_once(':')
        .map(|(h, _)| h.trim_start_matches('[').trim_end_matches(']'))
        .unwrap_or(input.host);

    let path = match stream.network {
        Network::Grpc => stream.service_name,
        _ => stream.path,
    };
    let tls = match stream.security {
        Security::None => "",
        other => other.as_str(),
    };
    let json = VmessJson {
        v: "2",
        ps: input.remark,
        add,
        port: input.inbound.port.to_string(),
        id: &id,
        aid: "0",
        scy: "auto",
        net: stream.network.as_str(),
        header_type: "none",
        host: stream.host.unwrap_or(""),
        path: path.unwrap_or(""),
        tls,
        sni: stream.sni.unwrap_or(""),
    };
    let bytes = serde_json::to_vec(&json).map_err(|e| LinkError::Encoding(e.to_string()))?;
    Ok(format!("vmess://{}", STANDARD.encode(bytes)))
}

fn vless(input: &LinkInput<'_>) -> Result<String, LinkError> {
    let stream = Stream::from_settings(&input.inbound.transport, Security::None)?;
    let id = uuid_credential(Protocol::Vless, input.credential)?;
    let url = authority_url("vless", input, &id)?;

    let mut q = url::form_urlencoded::Serializer::new(String::new());
    q.append_pair("encryption", "none");
    if let Some(flow) = input.inbound.transport.flow.as_deref() {
        q.append_pair("flow", flow);
    }
    stream.append_query(&mut q);
    Ok(finish(url, Some(q.finish()), input.remark))
}

fn trojan(input: &LinkInput<'_>) -> Result<String, LinkError> {
    let stream = Stream::from_settings(&input.inbound.transport, Security::Tls)?;
    let password = password_credential(Protocol::Trojan, input.credential)?;
    let url = authority_url("trojan", input, password)?;

    let mut q = url::form_urlencoded::Serializer::new(String::new());
    stream.append_query(&mut q);
    Ok(finish(url, Some(q.finish()), input.remark))
}

/// Methods whose SIP002 userinfo is `base64url(method:password)`.
/// The 2022 ciphers take a base64 PSK and plain userinfo, which the
/// derived passwords cannot provide, so they are not offered.
const SHADOWSOCKS_METHODS: &[&str] = &[
    "aes-128-gcm",
    "aes-256-gcm",
    "chacha20-poly1305",
    "chacha20-ietf-poly1305",
    "xchacha20-poly1305",
    "xchacha20-ietf-poly1305",
    "none",
];

fn shadowsocks(input: &LinkInput<'_>) -> Result<String, LinkError> {
    let method = input
        .inbound
        .transport
        .method
        .as_deref()
        .ok_or_else(|| LinkError::missing("method"))?;
    if !SHADOWSOCKS_METHODS.contains(&method) {
        return Err(LinkError::unsupported("method", method));
    }
    let password = password_credential(Protocol::Shadowsocks, input.credential)?;
    let userinfo = URL_SAFE_NO_PAD.encode(format!("{method}:{password}"));
    let url = authority_url("ss", input, &userinfo)?;
    Ok(finish(url, None, input.remark))
}
