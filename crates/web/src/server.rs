//! Control HTTP API

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Query, Request, State},
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use slotbot_common::control::{read_control, update_control, write_control, FORCE_ACTION};
use slotbot_common::ControlState;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::results::{last_result, FILES_PREFIX};
use crate::supervisor::{ProcessStatus, Supervisor};

/// Default and fallback for `GET /logs?lines=`
pub const DEFAULT_LOG_LINES: usize = 200;

/// Largest JSON body the token check will buffer
const MAX_AUTH_BODY: usize = 64 * 1024;

#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// When set, POST routes require this token
    pub token: Option<String>,
    /// Directory served at `/`
    pub web_ui: Option<PathBuf>,
}

struct AppState {
    supervisor: Supervisor,
    token: Option<String>,
}

/// Control server: the supervisor plus the routes around it
#[derive(Clone)]
pub struct ControlServer {
    state: Arc<AppState>,
    web_ui: Option<PathBuf>,
}

impl ControlServer {
    pub fn new(supervisor: Supervisor, cfg: ServerConfig) -> Self {
        let token = cfg.token.filter(|t| !t.trim().is_empty());
        Self {
            state: Arc::new(AppState { supervisor, token }),
            web_ui: cfg.web_ui,
        }
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.state.supervisor
    }

    /// Make sure `bot-output/` and `control.json` exist.
    pub fn prepare(&self) -> anyhow::Result<()> {
        let layout = self.state.supervisor.layout();
        std::fs::create_dir_all(layout.output_dir())?;
        let control = layout.control_path();
        if !control.exists() {
            write_control(&control, &ControlState::default())?;
        }
        Ok(())
    }

    pub fn router(&self) -> Router {
        let state = self.state.clone();
        let auth_layer = middleware::from_fn(move |req, next| {
            let state = state.clone();
            async move { require_token(state, req, next).await }
        });

        let commands = Router::new()
            .route("/start", post(start_handler))
            .route("/stop", post(stop_handler))
            .route("/clear-logs", post(clear_logs_handler))
            .route("/force", post(force_handler))
            .route("/pause", post(pause_handler))
            .route("/resume", post(resume_handler))
            .route_layer(auth_layer);

        let mut router = Router::new()
            .route("/status", get(status_handler))
            .route("/logs", get(logs_handler))
            .route("/last-result", get(last_result_handler))
            .route("/control", get(control_handler))
            .route("/ping", get(ping_handler))
            .merge(commands)
            .nest_service(
                FILES_PREFIX,
                ServeDir::new(self.state.supervisor.layout().output_dir()),
            );

        match &self.web_ui {
            Some(dir) if dir.is_dir() => {
                info!("Serving web UI from {}", dir.display());
                router = router.fallback_service(ServeDir::new(dir));
            }
            Some(dir) => warn!("web-ui folder not found at {}", dir.display()),
            None => {}
        }

        router
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        self.prepare()?;
        info!("Control server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}

// ============================================================================
// Auth
// ============================================================================

#[derive(Deserialize)]
struct TokenBody {
    token: Option<String>,
}

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|v| v.trim().to_string())
}

fn query_token(req: &Request) -> Option<String> {
    Query::<HashMap<String, String>>::try_from_uri(req.uri())
        .ok()
        .and_then(|Query(mut params)| params.remove("token"))
}

async fn require_token(state: Arc<AppState>, req: Request, next: middleware::Next) -> Response {
    let Some(expected) = state.token.as_deref() else {
        return next.run(req).await;
    };

    if bearer_token(&req).or_else(|| query_token(&req)).as_deref() == Some(expected) {
        return next.run(req).await;
    }

    // Last resort: `{"token": "..."}` in the JSON body.
    let (parts, body) = req.into_parts();
    let bytes = match to_bytes(body, MAX_AUTH_BODY).await {
        Ok(bytes) => bytes,
        Err(_) => return unauthorized(),
    };
    let body_token = serde_json::from_slice::<TokenBody>(&bytes)
        .ok()
        .and_then(|b| b.token);
    if body_token.as_deref() != Some(expected) {
        debug!("Rejected {} {}", parts.method, parts.uri.path());
        return unauthorized();
    }
    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "ok": false, "error": "unauthorized" })),
    )
        .into_response()
}

fn internal_error(error: impl std::fmt::Display) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "ok": false, "error": error.to_string() })),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

async fn start_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.supervisor.start() {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            state
                .supervisor
                .activity_log()
                .append(&format!("start error {}", e));
            internal_error(e)
        }
    }
}

async fn stop_handler(State(state): State<Arc<AppState>>) -> Response {
    match state.supervisor.stop() {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            state
                .supervisor
                .activity_log()
                .append(&format!("stop error {}", e));
            internal_error(e)
        }
    }
}

#[derive(Serialize)]
struct StatusResponse {
    ok: bool,
    #[serde(flatten)]
    status: ProcessStatus,
}

async fn status_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(StatusResponse {
        ok: true,
        status: state.supervisor.status(),
    })
    .into_response()
}

#[derive(Deserialize)]
struct LogsQuery {
    lines: Option<String>,
}

fn requested_lines(raw: Option<&str>) -> usize {
    raw.and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_LOG_LINES)
}

async fn logs_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LogsQuery>,
) -> Response {
    let lines = requested_lines(query.lines.as_deref());
    match state.supervisor.activity_log().tail(lines) {
        Ok(Some(text)) => Json(json!({ "ok": true, "text": text })).into_response(),
        Ok(None) => Json(json!({ "ok": true, "text": "no logs" })).into_response(),
        Err(e) => internal_error(e),
    }
}

async fn last_result_handler(State(state): State<Arc<AppState>>) -> Response {
    Json(last_result(state.supervisor.layout())).into_response()
}

async fn clear_logs_handler(State(state): State<Arc<AppState>>) -> Response {
    let log = state.supervisor.activity_log();
    match log.clear() {
        Ok(true) => {
            log.append("API clear-logs requested");
            Json(json!({ "ok": true, "cleared": true })).into_response()
        }
        Ok(false) => {
            Json(json!({ "ok": true, "cleared": false, "message": "no bot.log" })).into_response()
        }
        Err(e) => internal_error(e),
    }
}

fn update_and_log(
    state: &AppState,
    what: &str,
    f: impl FnOnce(&mut ControlState),
) -> Result<ControlState, Response> {
    let path = state.supervisor.layout().control_path();
    let control = update_control(&path, f).map_err(internal_error)?;
    state
        .supervisor
        .activity_log()
        .append(&format!("API {} requested", what));
    Ok(control)
}

async fn force_handler(State(state): State<Arc<AppState>>) -> Response {
    match update_and_log(&state, "force", |c| c.action = Some(FORCE_ACTION.to_string())) {
        Ok(_) => Json(json!({ "ok": true, "action": FORCE_ACTION })).into_response(),
        Err(resp) => resp,
    }
}

async fn pause_handler(State(state): State<Arc<AppState>>) -> Response {
    match update_and_log(&state, "pause", |c| c.paused = true) {
        Ok(_) => Json(json!({ "ok": true, "paused": true })).into_response(),
        Err(resp) => resp,
    }
}

async fn resume_handler(State(state): State<Arc<AppState>>) -> Response {
    match update_and_log(&state, "resume", |c| c.paused = false) {
        Ok(_) => Json(json!({ "ok": true, "paused": false })).into_response(),
        Err(resp) => resp,
    }
}

async fn control_handler(State(state): State<Arc<AppState>>) -> Response {
    let control = read_control(&state.supervisor.layout().control_path());
    Json(json!({ "ok": true, "control": control })).into_response()
}

async fn ping_handler() -> Response {
    Json(json!({
        "ok": true,
        "now": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }))
    .into_response()
}
