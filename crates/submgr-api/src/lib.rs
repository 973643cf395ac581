//! submgr-api: HTTP front door for subscription feeds.
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/sub/{id}` | Subscription feed, base64 (default) |
//! | GET | `/sub/{id}?format=plain` | Newline-joined URIs |
//! | GET | `/healthz` | Liveness plus fleet size |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use submgr_core::{AuthorizationPolicy, LevelPolicy, Node};
use submgr_state::StateStore;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub store: StateStore,
    pub nodes: Arc<Vec<Node>>,
    pub policy: Arc<dyn AuthorizationPolicy>,
}

impl ApiState {
    /// State with the default level-based policy.
    pub fn new(store: StateStore, nodes: Vec<Node>) -> Self {
        Self {
            store,
            nodes: Arc::new(nodes),
            policy: Arc::new(LevelPolicy),
        }
    }
}

/// Build the complete router.
pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/sub/{id}", get(handlers::subscription))
        .route("/healthz", get(handlers::healthz))
        .with_state(state)
}
