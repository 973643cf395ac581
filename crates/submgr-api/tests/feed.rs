//! Feed endpoint tests against an in-memory store.

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use tower::ServiceExt;

use submgr_api::{ApiState, build_router};
use submgr_core::*;
use submgr_state::StateStore;

const ALICE: &str = "6f1c2a3e-9b4d-4e5f-8a7b-1c2d3e4f5a6b";

fn nodes() -> Vec<Node> {
    vec![
        Node {
            name: "tokyo".to_string(),
            address: "jp.example.com".to_string(),
            admin: AdminEndpoint {
                url: "http://10.0.0.1:10085".to_string(),
                api_key: None,
            },
            min_level: 0,
            allow: vec![],
            inbounds: vec![Inbound {
                tag: "trojan".to_string(),
                protocol: Protocol::Trojan,
                port: 443,
                min_level: None,
                transport: TransportSettings::default(),
            }],
        },
        Node {
            name: "premium".to_string(),
            address: "vip.example.com".to_string(),
            admin: AdminEndpoint {
                url: "http://10.0.0.2:10085".to_string(),
                api_key: None,
            },
            min_level: 10,
            allow: vec![],
            inbounds: vec![Inbound {
                tag: "vless".to_string(),
                protocol: Protocol::Vless,
                port: 443,
                min_level: None,
                transport: TransportSettings::default(),
            }],
        },
    ]
}

fn router_with(subscribers: &[Subscriber]) -> axum::Router {
    let store = StateStore::open_in_memory().unwrap();
    for s in subscribers {
        store.put_subscriber(s).unwrap();
    }
    build_router(ApiState::new(store, nodes()))
}

async fn get(router: axum::Router, uri: &str) -> (StatusCode, String) {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router.oneshot(req).await.unwrap();
    let status = resp.status();
    let body = to_bytes(resp.into_body(), 1 << 20).await.unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn plain_feed_lists_authorized_links() {
    let router = router_with(&[Subscriber::new(ALICE, "alice", 1)]);

    let (status, body) = get(router, &format!("/sub/{ALICE}?format=plain")).await;

    assert_eq!(status, StatusCode::OK);
    let links: Vec<&str> = body.lines().collect();
    assert_eq!(links.len(), 1);
    assert!(links[0].starts_with("trojan://"));
    assert!(links[0].contains("@jp.example.com:443"));
    assert!(links[0].ends_with("#tokyo"));
}

#[tokio::test]
async fn default_feed_is_base64_of_plain() {
    let router = router_with(&[Subscriber::new(ALICE, "alice", 20)]);

    let (_, plain) = get(router.clone(), &format!("/sub/{ALICE}?format=plain")).await;
    let (status, encoded) = get(router, &format!("/sub/{ALICE}")).await;

    assert_eq!(status, StatusCode::OK);
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).unwrap()).unwrap();
    assert_eq!(decoded, plain);
    assert_eq!(decoded.lines().count(), 2);
}

#[tokio::test]
async fn unknown_subscriber_is_not_found() {
    let router = router_with(&[]);
    let (status, body) = get(router, &format!("/sub/{ALICE}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["success"], false);
}

#[tokio::test]
async fn unknown_format_is_bad_request() {
    let router = router_with(&[Subscriber::new(ALICE, "alice", 1)]);
    let (status, _) = get(router, &format!("/sub/{ALICE}?format=yaml")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_subscriber_gets_empty_feed() {
    let mut alice = Subscriber::new(ALICE, "alice", 1);
    alice.expires_at = Some(1);
    let router = router_with(&[alice]);

    let (status, body) = get(router, &format!("/sub/{ALICE}?format=plain")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());
}

#[tokio::test]
async fn healthz_reports_fleet_size() {
    let (status, body) = get(router_with(&[]), "/healthz").await;
    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["data"]["status"], "ok");
    assert_eq!(json["data"]["nodes"], 2);
}
