//! Axum-based HTTP gateway for the vault.
//!
//! Transport plumbing around the core: routing, JSON marshaling, body
//! limits, timeouts, CORS, and the authorization gate that turns a bearer
//! token into a trusted owner id before any record store access happens.

use crate::auth::{AccountStore, Authenticator};
use crate::config::Config;
use crate::db::Db;
use crate::error::{VaultError, VaultResult};
use crate::security::RateLimiter;
use crate::vault::{RecordDraft, RecordStore};
use anyhow::Result;
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::Json,
    routing::{delete, get, post, put},
    Router,
};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;

/// Maximum request body size (64KB) — prevents memory exhaustion
pub const MAX_BODY_SIZE: usize = 65_536;
/// Request timeout (30s) — prevents slow-loris abuse
pub const REQUEST_TIMEOUT_SECS: u64 = 30;
/// How often expired sessions are swept from the in-memory table.
const SESSION_PURGE_INTERVAL_SECS: u64 = 300;

/// Shared state for all axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Db>,
    pub accounts: Arc<AccountStore>,
    pub records: Arc<RecordStore>,
    pub auth: Arc<Authenticator>,
    pub rate_limiter: Arc<RateLimiter>,
}

impl AppState {
    pub fn from_config(db: Arc<Db>, config: &Config) -> Self {
        Self {
            accounts: Arc::new(AccountStore::new(Arc::clone(&db))),
            records: Arc::new(RecordStore::new(Arc::clone(&db))),
            auth: Arc::new(Authenticator::new(config.auth.session_ttl_secs)),
            rate_limiter: Arc::new(RateLimiter::new(
                config.limits.register_per_hour,
                config.limits.login_per_minute,
            )),
            db,
        }
    }
}

/// Build the router. Separated from `run_gateway` so tests can drive it
/// without binding a socket.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(handle_health))
        .route("/api/register", post(handle_register))
        .route("/api/login", post(handle_login))
        .route("/api/logout", post(handle_logout))
        .route("/api/records", get(handle_records_list))
        .route("/api/records", post(handle_record_create))
        .route("/api/records/{record_id}", get(handle_record_get))
        .route("/api/records/{record_id}", put(handle_record_update))
        .route("/api/records/{record_id}", delete(handle_record_delete))
        .with_state(state)
        .layer(cors)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(REQUEST_TIMEOUT_SECS),
        ))
}

/// Bind and serve until the process is stopped.
pub async fn run_gateway(host: &str, port: u16, state: AppState) -> Result<()> {
    let addr: SocketAddr = format!("{host}:{port}").parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("vault gateway listening on http://{}", listener.local_addr()?);

    // Background sweep of expired sessions.
    {
        let auth = Arc::clone(&state.auth);
        tokio::spawn(async move {
            let mut ticker =
                tokio::time::interval(Duration::from_secs(SESSION_PURGE_INTERVAL_SECS));
            loop {
                ticker.tick().await;
                let purged = auth.sessions().purge_expired();
                if purged > 0 {
                    tracing::debug!(purged, "purged expired sessions");
                }
            }
        });
    }

    let app = build_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

// ── Request plumbing ────────────────────────────────────────────────

/// Client origin key for rate limiting: proxy headers first, then the peer
/// address.
fn client_key(headers: &HeaderMap, peer: &SocketAddr) -> String {
    for header_name in ["X-Forwarded-For", "X-Real-IP"] {
        if let Some(value) = headers.get(header_name).and_then(|v| v.to_str().ok()) {
            let first = value.split(',').next().unwrap_or("").trim();
            if !first.is_empty() {
                return first.to_owned();
            }
        }
    }
    peer.ip().to_string()
}

/// Extract bearer token from the Authorization header.
fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

/// Authorization gate: resolve the caller's identity proof to an account id
/// before any store access. The returned id is the only source of owner_id
/// for record operations; nothing in a request body can override it.
fn require_session(state: &AppState, headers: &HeaderMap) -> VaultResult<String> {
    let token = extract_bearer_token(headers).ok_or(VaultError::Unauthorized)?;
    state.auth.resolve(token).ok_or(VaultError::Unauthorized)
}

/// Unify axum's body rejection with the input-validation taxonomy.
fn parse_body<T>(
    body: Result<Json<T>, axum::extract::rejection::JsonRejection>,
) -> VaultResult<T> {
    match body {
        Ok(Json(inner)) => Ok(inner),
        Err(e) => Err(VaultError::InvalidInput(format!("Invalid request: {e}"))),
    }
}

// ── Handlers ────────────────────────────────────────────────────────

/// GET /health — store reachability and schema shape, session-independent.
async fn handle_health(State(state): State<AppState>) -> (StatusCode, Json<serde_json::Value>) {
    match state.db.health() {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({"status": "ok", "database": "connected"})),
        ),
        Err(e) => {
            tracing::error!(error = ?e, "health check failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"status": "unhealthy"})),
            )
        }
    }
}

#[derive(Deserialize)]
struct CredentialsBody {
    username: String,
    password: String,
}

/// POST /api/register — create a new account.
async fn handle_register(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Json<CredentialsBody>, axum::extract::rejection::JsonRejection>,
) -> VaultResult<(StatusCode, Json<serde_json::Value>)> {
    let key = client_key(&headers, &peer);
    if !state.rate_limiter.allow_register(&key) {
        tracing::warn!(origin = %key, "registration rate limit exceeded");
        return Err(VaultError::RateLimited);
    }

    let body = parse_body(body)?;
    let account_id = state.accounts.create(&body.username, &body.password)?;
    tracing::info!(account_id = %account_id, "account registered");

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "account_id": account_id })),
    ))
}

/// POST /api/login — verify credentials, mint a session.
async fn handle_login(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Json<CredentialsBody>, axum::extract::rejection::JsonRejection>,
) -> VaultResult<Json<serde_json::Value>> {
    let key = client_key(&headers, &peer);
    if !state.rate_limiter.allow_login(&key) {
        tracing::warn!(origin = %key, "login rate limit exceeded");
        return Err(VaultError::RateLimited);
    }

    let body = parse_body(body)?;
    let outcome = state.auth.login(&state.accounts, &body.username, &body.password)?;

    Ok(Json(serde_json::json!({
        "token": outcome.token,
        "account_id": outcome.account_id,
        "vault_salt": outcome.vault_salt,
    })))
}

/// POST /api/logout — clear the session. Idempotent: an unknown or expired
/// token still answers 200; only a missing header is rejected.
async fn handle_logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> VaultResult<Json<serde_json::Value>> {
    let token = extract_bearer_token(&headers).ok_or(VaultError::Unauthorized)?;
    state.auth.logout(token);
    Ok(Json(serde_json::json!({ "status": "logged_out" })))
}

/// GET /api/records — all records for the caller, most recently touched
/// first.
async fn handle_records_list(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> VaultResult<Json<serde_json::Value>> {
    let owner_id = require_session(&state, &headers)?;
    let records = state.records.list(&owner_id)?;
    Ok(Json(serde_json::json!(records)))
}

/// POST /api/records — create a record owned by the caller.
async fn handle_record_create(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<RecordDraft>, axum::extract::rejection::JsonRejection>,
) -> VaultResult<(StatusCode, Json<serde_json::Value>)> {
    let owner_id = require_session(&state, &headers)?;
    let draft = parse_body(body)?;
    let id = state.records.create(&owner_id, &draft)?;
    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}

/// GET /api/records/{record_id}
async fn handle_record_get(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(record_id): Path<i64>,
) -> VaultResult<Json<serde_json::Value>> {
    let owner_id = require_session(&state, &headers)?;
    let record = state.records.get(&owner_id, record_id)?;
    Ok(Json(serde_json::json!(record)))
}

/// PUT /api/records/{record_id} — full-field replace.
async fn handle_record_update(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(record_id): Path<i64>,
    body: Result<Json<RecordDraft>, axum::extract::rejection::JsonRejection>,
) -> VaultResult<Json<serde_json::Value>> {
    let owner_id = require_session(&state, &headers)?;
    let draft = parse_body(body)?;
    state.records.update(&owner_id, record_id, &draft)?;
    Ok(Json(serde_json::json!({ "status": "updated" })))
}

/// DELETE /api/records/{record_id}
async fn handle_record_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(record_id): Path<i64>,
) -> VaultResult<Json<serde_json::Value>> {
    let owner_id = require_session(&state, &headers)?;
    state.records.delete(&owner_id, record_id)?;
    Ok(Json(serde_json::json!({ "status": "deleted" })))
}
