//! HTTP API: web chat, Telegram webhook receiver, and health checks.
//!
//! Spawned as a background task by the gateway.

use crate::gateway::Gateway;
use anyhow::Context as _;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use checkdoc_core::{config::ApiConfig, error::CheckdocError};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Header Telegram uses to echo the webhook secret.
const TELEGRAM_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    gateway: Arc<Gateway>,
    cookie_name: String,
    cookie_max_age_secs: u64,
}

/// Web chat request body.
#[derive(Debug, Deserialize)]
struct ChatRequest {
    #[serde(default)]
    text: String,
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({"error": message.into()})))
}

/// Constant-time string comparison for secret tokens.
fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

/// Extract the session id cookie, ignoring empty or oversized values.
fn session_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty() && value.len() <= 128)
}

fn session_cookie_header(name: &str, sid: &str, max_age_secs: u64) -> Option<HeaderValue> {
    let cookie = format!("{name}={sid}; Path=/; Max-Age={max_age_secs}; HttpOnly; SameSite=Lax");
    match HeaderValue::from_str(&cookie) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("cannot build session cookie '{name}': {e}");
            None
        }
    }
}

/// `POST /chat`: one web chat turn for the cookie's session.
async fn chat(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) =
        body.map_err(|e| api_error(e.status(), format!("invalid request: {}", e.body_text())))?;

    let (sid, is_new) = match session_cookie(&headers, &state.cookie_name) {
        Some(sid) => (sid, false),
        None => (Uuid::new_v4().to_string(), true),
    };

    let reply = state
        .gateway
        .respond(&format!("web:{sid}"), &request.text)
        .await;

    let mut response = Json(json!({"reply": reply})).into_response();
    if is_new {
        if let Some(cookie) =
            session_cookie_header(&state.cookie_name, &sid, state.cookie_max_age_secs)
        {
            response.headers_mut().insert(SET_COOKIE, cookie);
        }
    }
    Ok(response)
}

/// `POST {webhook_path}`: an update pushed by Telegram.
async fn telegram_webhook(
    headers: HeaderMap,
    State(state): State<ApiState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Some(telegram) = state.gateway.telegram() else {
        return Err(api_error(StatusCode::NOT_FOUND, "telegram not configured"));
    };

    let secret = &telegram.config().webhook_secret;
    if !secret.is_empty() {
        let provided = headers
            .get(TELEGRAM_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !constant_time_eq(provided, secret) {
            warn!("telegram webhook: rejected update with bad secret token");
            return Err(api_error(StatusCode::UNAUTHORIZED, "bad secret token"));
        }
    }

    let Json(payload) =
        body.map_err(|e| api_error(e.status(), format!("invalid update: {}", e.body_text())))?;

    match telegram.feed_update(payload).await {
        Ok(_) => Ok(Json(json!({"ok": true}))),
        Err(CheckdocError::Serialization(e)) => {
            warn!("telegram webhook: malformed update: {e}");
            Err(api_error(StatusCode::BAD_REQUEST, format!("invalid update: {e}")))
        }
        Err(e) => {
            error!("telegram webhook: {e}");
            Err(api_error(StatusCode::SERVICE_UNAVAILABLE, e.to_string()))
        }
    }
}

/// `GET /health`.
async fn health(State(state): State<ApiState>) -> Json<Value> {
    let webhook_set = match state.gateway.telegram() {
        Some(telegram) => telegram.webhook_active().await,
        None => false,
    };
    Json(json!({
        "ok": true,
        "webhook_set": webhook_set,
        "sessions": state.gateway.sessions().len(),
        "uptime_secs": state.gateway.uptime().elapsed().as_secs(),
    }))
}

fn build_router(state: ApiState) -> Router {
    let webhook_path = state
        .gateway
        .channel_config()
        .telegram
        .as_ref()
        .filter(|tg| tg.enabled)
        .map(|tg| tg.webhook_path.clone());

    let mut router = Router::new()
        .route("/chat", post(chat))
        .route("/health", get(health));
    if let Some(path) = webhook_path {
        router = router.route(&path, post(telegram_webhook));
    }

    router
        .layer(axum::extract::DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Start the API server. Called from `Gateway::run()`.
///
/// Returns only on failure: a port that cannot be bound or a server error.
pub async fn serve(config: ApiConfig, gateway: Arc<Gateway>) -> anyhow::Result<()> {
    let state = ApiState {
        gateway,
        cookie_name: config.cookie_name.clone(),
        cookie_max_age_secs: config.cookie_max_age_secs,
    };

    let app = build_router(state);
    let addr = format!("{}:{}", config.host, config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("API server failed to bind to {addr}"))?;

    info!("API server listening on {addr}");

    axum::serve(listener, app)
        .await
        .context("API server error")?;
    Ok(())
}
