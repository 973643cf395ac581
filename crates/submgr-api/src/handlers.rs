//! Feed handlers.
//!
//! The feed is assembled on every request from the store and the
//! configured fleet, so it always reflects the current subscriber level.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use tracing::{debug, error};

use submgr_core::epoch_secs;
use submgr_link::assemble;

use crate::ApiState;

/// Response wrapper for JSON endpoints.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct FeedQuery {
    pub format: Option<String>,
}

/// GET /sub/:id
pub async fn subscription(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Query(query): Query<FeedQuery>,
) -> Response {
    let plain = match query.format.as_deref() {
        None | Some("base64") => false,
        Some("plain") => true,
        Some(other) => {
            return error_response(&format!("unknown format {other:?}"), StatusCode::BAD_REQUEST);
        }
    };

    let subscriber = match state.store.get_subscriber(&id) {
        Ok(Some(s)) => s,
        Ok(None) => return error_response("subscriber not found", StatusCode::NOT_FOUND),
        Err(e) => {
            error!(%id, error = %e, "reading subscriber failed");
            return error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    let feed = assemble(&subscriber, &state.nodes, state.policy.as_ref(), epoch_secs());
    debug!(%id, links = feed.links.len(), errors = feed.errors.len(), plain, "serving feed");

    let body = if plain { feed.text() } else { feed.to_base64() };
    (
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

/// GET /healthz
pub async fn healthz(State(state): State<ApiState>) -> Response {
    ApiResponse::ok(serde_json::json!({
        "status": "ok",
        "nodes": state.nodes.len(),
    }))
    .into_response()
}
