//! HTTP surface — webhook verification, message ingestion, outbound push,
//! and the hosting environment's liveness probe.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::WriteMode;
use crate::normalize::normalize;
use crate::push::PushClient;
use crate::reply::{self, Reply};
use crate::signature;
use crate::store::MessageStore;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn MessageStore>,
    /// Push client (None when no credentials are configured).
    pub push: Option<Arc<PushClient>>,
    /// Webhook token (None disables the signature gate).
    pub token: Option<String>,
    pub write_mode: WriteMode,
}

/// Build the Axum router.
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/wechat", get(verify_webhook).post(receive_message))
        .route("/push", post(push_message))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SignatureParams {
    signature: Option<String>,
    timestamp: Option<String>,
    nonce: Option<String>,
    echostr: Option<String>,
}

impl SignatureParams {
    /// True when the gate is disabled or the signature checks out.
    fn pass(&self, token: Option<&str>) -> bool {
        let Some(token) = token else { return true };
        match (&self.signature, &self.timestamp, &self.nonce) {
            (Some(sig), Some(ts), Some(nonce)) => signature::verify(token, sig, ts, nonce),
            _ => false,
        }
    }
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "wechat-inbox"
    }))
}

// ── Webhook verification (GET) ──────────────────────────────────────────

async fn verify_webhook(
    State(state): State<AppState>,
    Query(params): Query<SignatureParams>,
) -> Response {
    if !params.pass(state.token.as_deref()) {
        warn!("webhook verification failed");
        return (StatusCode::FORBIDDEN, "verification failed").into_response();
    }
    params.echostr.unwrap_or_default().into_response()
}

// ── Message ingestion (POST) ────────────────────────────────────────────

async fn receive_message(
    State(state): State<AppState>,
    Query(params): Query<SignatureParams>,
    body: Bytes,
) -> Response {
    if !params.pass(state.token.as_deref()) {
        warn!("rejecting unsigned webhook delivery");
        return (StatusCode::FORBIDDEN, "verification failed").into_response();
    }

    let received_at = Utc::now();
    let record = match normalize(&body, received_at) {
        Ok(record) => record,
        Err(rejected) => {
            // The channel redelivers on anything but a 2xx acknowledgement,
            // so malformed input is still answered with success.
            debug!(reason = rejected.reason(), "payload rejected");
            return reply_response(&Reply::Success);
        }
    };

    info!(
        id = %record.id,
        sender = %record.sender,
        kind = record.kind.as_str(),
        "inbound message"
    );

    match state.write_mode {
        WriteMode::Foreground => match state.store.append(&record).await {
            Ok(stats) => {
                if stats.replaced {
                    info!(id = %record.id, "redelivered message superseded earlier row");
                }
            }
            Err(e) => {
                error!(error = %e, id = %record.id, "store append failed");
                return (StatusCode::INTERNAL_SERVER_ERROR, "store write failed").into_response();
            }
        },
        WriteMode::Background => {
            let store = Arc::clone(&state.store);
            let record = record.clone();
            tokio::spawn(async move {
                if let Err(e) = store.append(&record).await {
                    error!(error = %e, id = %record.id, "background store append failed");
                }
            });
        }
    }

    reply_response(&reply::compose(&record, Utc::now()))
}

fn reply_response(reply: &Reply) -> Response {
    (
        [(header::CONTENT_TYPE, reply.content_type())],
        reply.body().to_string(),
    )
        .into_response()
}

// ── Outbound push (POST) ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct PushRequest {
    /// Comma-separated openid list.
    openids: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct PushOutcome {
    openid: String,
    status: String,
}

async fn push_message(State(state): State<AppState>, Json(req): Json<PushRequest>) -> Response {
    let Some(push) = &state.push else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({"error": "push is not configured"})),
        )
            .into_response();
    };

    let recipients: Vec<&str> = req
        .openids
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if recipients.is_empty() {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({"error": "no valid openids"})),
        )
            .into_response();
    }

    // One bad recipient must not fail the batch; each outcome is reported.
    let mut results = Vec::with_capacity(recipients.len());
    for openid in recipients {
        let status = match push.send_text(openid, &req.content).await {
            Ok(()) => "sent".to_string(),
            Err(e) => {
                warn!(error = %e, openid, "push failed");
                e.to_string()
            }
        };
        results.push(PushOutcome {
            openid: openid.to_string(),
            status,
        });
    }

    Json(serde_json::json!({
        "pushed_count": results.len(),
        "results": results,
    }))
    .into_response()
}
