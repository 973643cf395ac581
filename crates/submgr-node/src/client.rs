//! HTTP client for the node admin API.
//!
//! Each call opens a connection, sends one request and waits for the
//! response under a fixed timeout. Calls are never retried here; wrap
//! the client in [`crate::Retrying`] for that.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{AUTHORIZATION, CONTENT_TYPE, HOST, USER_AGENT};
use http::{Method, StatusCode};
use http_body_util::{BodyExt, Full};
use tracing::{debug, info};
use url::Url;

use submgr_core::{InboundUser, Node};

use crate::admin::NodeAdmin;
use crate::error::NodeError;

/// Node admin client over plain HTTP/1.1.
#[derive(Debug, Clone)]
pub struct HttpNodeClient {
    timeout: Duration,
}

struct Response {
    status: StatusCode,
    body: Bytes,
}

impl HttpNodeClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn call(
        &self,
        node: &Node,
        method: Method,
        segments: &[&str],
        body: Option<Vec<u8>>,
    ) -> Result<Response, NodeError> {
        let url = endpoint_url(&node.admin.url, segments)?;
        let api_key = node.admin.api_key.as_deref();

        match tokio::time::timeout(self.timeout, send(&url, api_key, method.clone(), body)).await {
            Ok(result) => result,
            Err(_) => {
                debug!(node = %node.name, %method, %url, "node admin call timed out");
                Err(NodeError::Unreachable(format!(
                    "{method} {url} timed out after {:?}",
                    self.timeout
                )))
            }
        }
    }
}

#[async_trait]
impl NodeAdmin for HttpNodeClient {
    async fn list_users(&self, node: &Node, tag: &str) -> Result<Vec<InboundUser>, NodeError> {
        let resp = self
            .call(node, Method::GET, &["inbounds", tag, "users"], None)
            .await?;
        if !resp.status.is_success() {
            return Err(classify("list users", resp.status, &resp.body));
        }
        serde_json::from_slice(&resp.body).map_err(|e| {
            NodeError::Rejected(format!("invalid user list from {}: {e}", node.name))
        })
    }

    async fn add_user(&self, node: &Node, tag: &str, user: &InboundUser) -> Result<(), NodeError> {
        let body = serde_json::to_vec(user)
            .map_err(|e| NodeError::Rejected(format!("serialize user: {e}")))?;
        let resp = self
            .call(node, Method::POST, &["inbounds", tag, "users"], Some(body.clone()))
            .await?;
        if resp.status.is_success() {
            debug!(node = %node.name, %tag, email = %user.email, "inbound user added");
            return Ok(());
        }
        if resp.status != StatusCode::CONFLICT {
            return Err(classify("add user", resp.status, &resp.body));
        }

        // The entry exists. Keep it if identical, otherwise replace it.
        let existing = self.list_users(node, tag).await?;
        if existing.iter().any(|u| u == user) {
            debug!(node = %node.name, %tag, email = %user.email, "inbound user already present");
            return Ok(());
        }
        info!(node = %node.name, %tag, email = %user.email, "replacing changed inbound user");
        self.remove_user(node, tag, &user.email).await?;
        let resp = self
            .call(node, Method::POST, &["inbounds", tag, "users"], Some(body))
            .await?;
        if resp.status.is_success() {
            Ok(())
        } else {
            Err(classify("add user", resp.status, &resp.body))
        }
    }

    async fn remove_user(&self, node: &Node, tag: &str, email: &str) -> Result<(), NodeError> {
        let resp = self
            .call(node, Method::DELETE, &["inbounds", tag, "users", email], None)
            .await?;
        if resp.status.is_success() || resp.status == StatusCode::NOT_FOUND {
            debug!(node = %node.name, %tag, %email, status = %resp.status, "inbound user removed");
            Ok(())
        } else {
            Err(classify("remove user", resp.status, &resp.body))
        }
    }
}

/// Append path segments (percent-encoded) to the node's admin base URL.
fn endpoint_url(base: &str, segments: &[&str]) -> Result<Url, NodeError> {
    let mut url = Url::parse(base)
        .map_err(|e| NodeError::Rejected(format!("invalid admin url {base}: {e}")))?;
    if url.scheme() != "http" {
        return Err(NodeError::Rejected(format!(
            "unsupported admin url scheme {}",
            url.scheme()
        )));
    }
    url.path_segments_mut()
        .map_err(|()| NodeError::Rejected(format!("admin url {base} cannot be a base")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

async fn send(
    url: &Url,
    api_key: Option<&str>,
    method: Method,
    body: Option<Vec<u8>>,
) -> Result<Response, NodeError> {
    let host = url
        .host_str()
        .ok_or_else(|| NodeError::Rejected(format!("admin url {url} has no host")))?;
    let port = url.port_or_known_default().unwrap_or(80);
    let authority = format!("{host}:{port}");
    let connect_host = host.trim_start_matches('[').trim_end_matches(']');

    let stream = tokio::net::TcpStream::connect((connect_host, port))
        .await
        .map_err(|e| NodeError::Unreachable(format!("connect {authority}: {e}")))?;

    let io = hyper_util::rt::TokioIo::new(stream);
    let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
        .await
        .map_err(|e| NodeError::Unreachable(format!("handshake with {authority}: {e}")))?;

    // Drive the connection in the background.
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!(error = %e, "node admin connection closed");
        }
    });

    let mut builder = http::Request::builder()
        .method(method)
        .uri(&url[url::Position::BeforePath..])
        .header(HOST, authority.as_str())
        .header(USER_AGENT, "submgr/0.1");
    if let Some(key) = api_key {
        builder = builder.header(AUTHORIZATION, format!("Bearer {key}"));
    }
    let payload = match body {
        Some(bytes) => {
            builder = builder.header(CONTENT_TYPE, "application/json");
            Bytes::from(bytes)
        }
        None => Bytes::new(),
    };
    let req = builder
        .body(Full::new(payload))
        .map_err(|e| NodeError::Rejected(format!("build request: {e}")))?;

    let resp = sender
        .send_request(req)
        .await
        .map_err(|e| NodeError::Unreachable(format!("request to {authority}: {e}")))?;
    let status = resp.status();
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(|e| NodeError::Unreachable(format!("read response from {authority}: {e}")))?
        .to_bytes();

    Ok(Response { status, body })
}

/// Map a non-success status to an error kind.
fn classify(op: &str, status: StatusCode, body: &Bytes) -> NodeError {
    let detail = String::from_utf8_lossy(body);
    let msg = format!("{op}: {status} {}", detail.trim());
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => NodeError::Auth(msg),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            NodeError::Unreachable(msg)
        }
        _ => NodeError::Rejected(msg),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use submgr_core::AdminEndpoint;

    fn node_at(url: &str) -> Node {
        Node {
            name: "test".to_string(),
            address: "test.example.com".to_string(),
            admin: AdminEndpoint {
                url: url.to_string(),
                api_key: None,
            },
            min_level: 0,
            allow: vec![],
            inbounds: vec![],
        }
    }

    #[test]
    fn endpoint_url_appends_segments() {
        let url = endpoint_url("http://10.0.0.1:10085/api/", &["inbounds", "vless-ws", "users"]).unwrap();
        assert_eq!(url.as_str(), "http://10.0.0.1:10085/api/inbounds/vless-ws/users");

        let url = endpoint_url("http://10.0.0.1:10085", &["inbounds", "a b", "users", "x/y"]).unwrap();
        assert_eq!(url.path(), "/inbounds/a%20b/users/x%2Fy");
    }

    #[test]
    fn endpoint_url_rejects_bad_bases() {
        assert!(matches!(
            endpoint_url("not a url", &[]),
            Err(NodeError::Rejected(_))
        ));
        assert!(matches!(
            endpoint_url("https://10.0.0.1", &[]),
            Err(NodeError::Rejected(_))
        ));
    }

    #[test]
    fn classify_statuses() {
        let body = Bytes::from_static(b"nope");
        assert_eq!(classify("x", StatusCode::UNAUTHORIZED, &body).kind(), crate::NodeErrorKind::Auth);
        assert_eq!(classify("x", StatusCode::FORBIDDEN, &body).kind(), crate::NodeErrorKind::Auth);
        assert_eq!(
            classify("x", StatusCode::SERVICE_UNAVAILABLE, &body).kind(),
            crate::NodeErrorKind::Unreachable
        );
        assert_eq!(classify("x", StatusCode::NOT_FOUND, &body).kind(), crate::NodeErrorKind::Rejected);
        assert_eq!(classify("x", StatusCode::BAD_REQUEST, &body).kind(), crate::NodeErrorKind::Rejected);
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = HttpNodeClient::new(Duration::from_secs(2));
        let node = node_at(&format!("http://127.0.0.1:{port}"));
        let err = client.remove_user(&node, "in", "someone").await.unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
    }

    #[tokio::test]
    async fn silent_node_times_out_as_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accept and hold connections without ever answering.
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let client = HttpNodeClient::new(Duration::from_millis(200));
        let node = node_at(&format!("http://127.0.0.1:{port}"));
        let err = client.list_users(&node, "in").await.unwrap_err();
        match err {
            NodeError::Unreachable(msg) => assert!(msg.contains("timed out"), "{msg}"),
            other => panic!("expected unreachable, got {other:?}"),
        }
    }
}
