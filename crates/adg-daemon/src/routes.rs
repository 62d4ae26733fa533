//! Axum router and HTTP handlers for the shuffle admin API.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Handlers are `pub(crate)`; scenario tests in `tests/`
//! drive the bare router.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, warn};

use crate::{
    api_types::{
        CooldownResponse, ErrorResponse, HealthResponse, RateLimitedResponse,
        ShuffleFailureResponse, ShuffleResponse, StatsResponse,
    },
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/admin/shuffle", post(trigger_shuffle))
        .route("/admin/shuffle/stats", get(shuffle_stats))
        .route("/admin/shuffle/health", get(shuffle_health))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request guards
// ---------------------------------------------------------------------------

/// Client identity for limiting.
///
/// With `trust_forwarded` set: first `x-forwarded-for` hop, then `x-real-ip`.
/// Those headers are client-controlled unless a proxy in front overwrites
/// them, so by default only the peer address counts. "unknown" when neither
/// yields anything.
pub fn client_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    trust_forwarded: bool,
) -> String {
    if trust_forwarded {
        if let Some(ip) = forwarded_identity(headers) {
            return ip;
        }
    }
    peer.map(|a| a.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_identity(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());
    if let Some(ip) = forwarded {
        return Some(ip.to_string());
    }

    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(k) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(k.trim());
    }
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Compare without short-circuiting on the first differing byte.
fn keys_match(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// `Err` carries the ready-made refusal.
fn require_admin(st: &AppState, headers: &HeaderMap, identity: &str) -> Result<(), Response> {
    let Some(expected) = st.admin_api_key() else {
        error!("admin api key is not configured; refusing admin request");
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("Admin authentication not configured")),
        )
            .into_response());
    };

    match presented_key(headers) {
        Some(k) if keys_match(k, expected) => Ok(()),
        _ => {
            warn!(%identity, "admin request with missing or invalid api key");
            Err((
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::new("Unauthorized: valid admin API key required")),
            )
                .into_response())
        }
    }
}

/// Refuse query strings on routes that take none.
fn reject_query(uri: &Uri, identity: &str) -> Result<(), Response> {
    match uri.query() {
        Some(q) if !q.is_empty() => {
            warn!(%identity, query = q, "suspicious shuffle request: unexpected query parameters");
            Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::new(
                    "Invalid request: this endpoint does not accept parameters",
                )),
            )
                .into_response())
        }
        _ => Ok(()),
    }
}

/// Empty body or an empty JSON object; anything else is refused.
fn reject_body(body: &Bytes, identity: &str) -> Result<(), Response> {
    let text = std::str::from_utf8(body).unwrap_or("\u{fffd}").trim();
    let acceptable = text.is_empty()
        || serde_json::from_str::<serde_json::Value>(text)
            .ok()
            .and_then(|v| v.as_object().map(|o| o.is_empty()))
            .unwrap_or(false);
    if acceptable {
        return Ok(());
    }
    warn!(%identity, bytes = body.len(), "suspicious shuffle request: unexpected body");
    Err((
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse::new(
            "Invalid request: this endpoint does not accept parameters",
        )),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// POST /admin/shuffle
// ---------------------------------------------------------------------------

/// Manually trigger one shuffle run.
///
/// Checks run in order: request limit, admin key, parameters, cooldown.
/// All refusals happen before the store is touched. The cooldown slot is
/// released again when the run fails.
pub(crate) async fn trigger_shuffle(
    State(st): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Response {
    let identity = client_identity(
        &headers,
        peer.map(|ConnectInfo(a)| a),
        st.trust_forwarded_for,
    );
    let now = st.engine.clock().now();

    let limited = st.limiter.lock().await.hit(&identity, now);
    if let Err(e) = limited {
        warn!(%identity, retry_after = e.retry_after_secs, "shuffle request limit exceeded");
        let mut resp = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(RateLimitedResponse {
                success: false,
                error: "Too many shuffle requests. Please try again later.".to_string(),
                retry_after: e.retry_after_secs,
            }),
        )
            .into_response();
        if let Ok(v) = HeaderValue::from_str(&e.retry_after_secs.to_string()) {
            resp.headers_mut().insert(header::RETRY_AFTER, v);
        }
        return resp;
    }

    if let Err(resp) = require_admin(&st, &headers, &identity) {
        return resp;
    }
    if let Err(resp) = reject_query(&uri, &identity) {
        return resp;
    }
    if let Err(resp) = reject_body(&body, &identity) {
        return resp;
    }

    let reserved = {
        let mut cd = st.cooldown.lock().await;
        let period = cd.window().as_secs();
        cd.try_begin(&identity, now).map_err(|check| (check, period))
    };
    if let Err((check, period)) = reserved {
        let remaining = check.seconds_remaining.unwrap_or(period);
        info!(%identity, remaining, "shuffle trigger refused: cooldown active");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(CooldownResponse {
                success: false,
                error: format!("Shuffle is on cooldown. Try again in {remaining} seconds."),
                cooldown_remaining: remaining,
                cooldown_period: period,
            }),
        )
            .into_response();
    }

    info!(%identity, "manual shuffle triggered");
    match st.engine.perform_global_shuffle().await {
        Ok(report) => (
            StatusCode::OK,
            Json(ShuffleResponse {
                success: true,
                message: report.message,
                shuffled_count: report.shuffled_count,
                batches: report.batch_count,
                duration: report.duration_ms,
                timestamp: report.timestamp,
                seed: report.seed,
                run_id: report.run_id,
                policy: report.policy.to_string(),
                vacant_squares: report.vacant_squares,
            }),
        )
            .into_response(),
        Err(e) => {
            st.cooldown.lock().await.release(&identity);
            error!(
                %identity,
                run_id = %e.run_id(),
                code = e.code(),
                committed = e.committed(),
                error = %e,
                "manual shuffle failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ShuffleFailureResponse {
                    success: false,
                    error: e.to_string(),
                    error_code: e.code().to_string(),
                    shuffled_count: e.committed(),
                    batches: e.batches_committed(),
                    run_id: e.run_id(),
                }),
            )
                .into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// GET /admin/shuffle/stats
// ---------------------------------------------------------------------------

pub(crate) async fn shuffle_stats(
    State(st): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let identity = client_identity(
        &headers,
        peer.map(|ConnectInfo(a)| a),
        st.trust_forwarded_for,
    );

    if let Err(resp) = require_admin(&st, &headers, &identity) {
        return resp;
    }
    if let Err(resp) = reject_query(&uri, &identity) {
        return resp;
    }

    match st.engine.get_shuffle_stats().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(StatsResponse {
                success: true,
                stats,
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new(format!("Failed to read shuffle stats: {e}"))),
        )
            .into_response(),
    }
}

// ---------------------------------------------------------------------------
// GET /admin/shuffle/health
// ---------------------------------------------------------------------------

pub(crate) async fn shuffle_health(State(st): State<Arc<AppState>>) -> Response {
    match st.engine.get_shuffle_stats().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(HealthResponse {
                success: true,
                service: st.build.service.to_string(),
                status: "operational".to_string(),
                version: st.build.version.to_string(),
                stats: Some(stats),
                error: None,
            }),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "shuffle health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HealthResponse {
                    success: false,
                    service: st.build.service.to_string(),
                    status: "error".to_string(),
                    version: st.build.version.to_string(),
                    stats: None,
                    error: Some(e.to_string()),
                }),
            )
                .into_response()
        }
    }
}
