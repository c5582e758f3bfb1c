//! HTTP server
//!
//! # Routes
//!
//! - `POST /bugzilla_webhook` - Handle a Bugzilla webhook (authenticated)
//! - `GET /__lbheartbeat__` - Load balancer liveness, always 200
//! - `GET /__heartbeat__` - Ping both trackers; 503 if either is down
//! - `GET /__version__` - Crate name and version
//! - `GET /whiteboard_tags` - Configured rules, optional `?tag=` (authenticated)
//! - `POST /__reload__` - Reload the rule file (authenticated)
//! - `GET /metrics` - Prometheus metrics
//!
//! Authenticated routes accept the API key in `X-Api-Key` or as the password
//! of HTTP basic auth.

use crate::config::Owner;
use crate::pipeline::{Phase, StepRegistry};
use crate::rules::{Rule, RuleRegistry};
use crate::runner::{Bridge, Report};
use crate::tracker::WebhookRequest;
use crate::{metrics, BridgeError};
use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, HeaderMap, Request, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Header carrying the API key
pub const API_KEY_HEADER: &str = "X-Api-Key";

/// Shared handler state
pub struct AppState {
    bridge: Bridge,
    steps: StepRegistry,
    rules_path: Option<PathBuf>,
    api_key: String,
}

/// HTTP front end for a [`Bridge`]
pub struct BridgeServer {
    state: Arc<AppState>,
}

impl BridgeServer {
    /// `rules_path` enables `POST /__reload__`
    pub fn new(
        bridge: Bridge,
        steps: StepRegistry,
        rules_path: Option<PathBuf>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            state: Arc::new(AppState {
                bridge,
                steps,
                rules_path,
                api_key: api_key.into(),
            }),
        }
    }

    /// Build the router
    pub fn router(&self) -> Router {
        let state = Arc::clone(&self.state);

        let protected = Router::new()
            .route("/bugzilla_webhook", post(bugzilla_webhook))
            .route("/whiteboard_tags", get(whiteboard_tags))
            .route("/__reload__", post(reload_rules))
            .route_layer(middleware::from_fn_with_state(
                state.clone(),
                require_api_key,
            ));

        Router::new()
            .route("/__lbheartbeat__", get(lbheartbeat))
            .route("/__heartbeat__", get(heartbeat))
            .route("/__version__", get(version))
            .route("/metrics", get(metrics_text))
            .merge(protected)
            .with_state(state)
    }

    /// Serve until Ctrl-C
    pub async fn run(self, addr: SocketAddr) -> crate::Result<()> {
        let listener = TcpListener::bind(addr).await?;

        info!(
            addr = %addr,
            rules = self.state.bridge.registry().snapshot().len(),
            "Bridge server listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

// ============================================================================
// Authentication
// ============================================================================

async fn require_api_key(
    State(state): State<Arc<AppState>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let authorized = presented_key(request.headers())
        .map(|key| keys_match(&key, &state.api_key))
        .unwrap_or(false);

    if authorized {
        return next.run(request).await;
    }

    warn!(path = %request.uri().path(), "Rejected request with missing or invalid API key");
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: "Invalid or missing API key".to_string(),
        }),
    )
        .into_response()
}

/// Key from `X-Api-Key`, else the basic-auth password
fn presented_key(headers: &HeaderMap) -> Option<String> {
    if let Some(key) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(key.to_string());
    }

    let authorization = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = authorization.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (_, password) = decoded.split_once(':')?;
    Some(password.to_string())
}

fn keys_match(presented: &str, expected: &str) -> bool {
    !expected.is_empty() && bool::from(presented.as_bytes().ct_eq(expected.as_bytes()))
}

// ============================================================================
// Request/Response types
// ============================================================================

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Deserialize)]
pub struct TagQuery {
    pub tag: Option<String>,
}

/// Rule as listed by `GET /whiteboard_tags`
#[derive(Debug, Serialize)]
pub struct RuleSummary {
    pub tag: String,
    pub description: String,
    pub enabled: bool,
    pub allow_private: bool,
    pub owner: Owner,
    pub jira_project_key: String,
    pub steps: BTreeMap<&'static str, Vec<&'static str>>,
    pub status_map: BTreeMap<String, String>,
    pub resolution_map: BTreeMap<String, String>,
}

impl From<&Rule> for RuleSummary {
    fn from(rule: &Rule) -> Self {
        Self {
            tag: rule.tag.clone(),
            description: rule.description.clone(),
            enabled: rule.enabled,
            allow_private: rule.allow_private,
            owner: rule.owner.clone(),
            jira_project_key: rule.project_key.clone(),
            steps: Phase::ALL
                .into_iter()
                .map(|phase| (phase.as_str(), rule.steps.names(phase)))
                .collect(),
            status_map: rule.status_map.clone(),
            resolution_map: rule.resolution_map.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct TrackerHealth {
    up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<E: std::fmt::Display> From<Result<(), E>> for TrackerHealth {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self {
                up: true,
                error: None,
            },
            Err(e) => Self {
                up: false,
                error: Some(e.to_string()),
            },
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn bugzilla_webhook(
    State(state): State<Arc<AppState>>,
    Json(request): Json<WebhookRequest>,
) -> Response {
    let ticket_id = request.bug.id;

    match state.bridge.handle(request).await {
        Ok(disposition) => {
            let status = if disposition.is_success() {
                StatusCode::OK
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            (status, Json(Report::new(ticket_id, &disposition))).into_response()
        }
        Err(e) => {
            error!(ticket_id, error = %e, "Webhook handling failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

async fn lbheartbeat() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn heartbeat(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let trackers = state.bridge.trackers();
    let (bugzilla, jira) = tokio::join!(trackers.upstream.ping(), trackers.downstream.ping());
    let bugzilla = TrackerHealth::from(bugzilla);
    let jira = TrackerHealth::from(jira);

    let status = if bugzilla.up && jira.up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        status,
        Json(serde_json::json!({ "bugzilla": bugzilla, "jira": jira })),
    )
}

async fn version() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn whiteboard_tags(
    State(state): State<Arc<AppState>>,
    Query(query): Query<TagQuery>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let registry = state.bridge.registry().snapshot();

    let rules: Vec<RuleSummary> = match &query.tag {
        Some(tag) => {
            let rule = registry.get(tag).ok_or_else(|| {
                (
                    StatusCode::NOT_FOUND,
                    Json(ErrorResponse {
                        error: format!("No rule for tag '{}'", tag),
                    }),
                )
            })?;
            vec![RuleSummary::from(rule.as_ref())]
        }
        None => registry
            .rules()
            .iter()
            .map(|rule| RuleSummary::from(rule.as_ref()))
            .collect(),
    };

    Ok(Json(rules))
}

async fn reload_rules(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let path = state.rules_path.as_ref().ok_or_else(|| {
        (
            StatusCode::CONFLICT,
            Json(ErrorResponse {
                error: "Server was started without a rule file".to_string(),
            }),
        )
    })?;

    let registry = RuleRegistry::load(path, &state.steps).map_err(|e| {
        warn!(error = %e, "Rule reload failed, keeping current rules");
        let status = match e {
            BridgeError::Config(_) | BridgeError::Yaml(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (
            status,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;

    let count = registry.len();
    state.bridge.registry().replace(registry);
    Ok(Json(serde_json::json!({ "status": "reloaded", "rules": count })))
}

async fn metrics_text() -> Result<impl IntoResponse, (StatusCode, Json<ErrorResponse>)> {
    let body = metrics::encode_metrics().map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse {
                error: e.to_string(),
            }),
        )
    })?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}
