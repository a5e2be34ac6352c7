use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use deskbridge_core::api::{CommandRequest, ErrorBody, InboundRequest, InboundStatus};
use deskbridge_core::model::InboundMessage;
use deskbridge_core::{now_ms, BridgeError};
use tower_http::trace::TraceLayer;

use crate::bridge::Bridge;
use crate::commands::Command;
use crate::inbound::REPLY_DENIED;

#[derive(Clone)]
pub struct AppState {
    bridge: Arc<Bridge>,
}

pub fn router(bridge: Arc<Bridge>) -> Router {
    let state = AppState { bridge };
    Router::new()
        .route("/healthz", get(healthz))
        .route("/v1/inbound", post(inbound))
        .route("/v1/commands/{name}", post(command))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn inbound(State(st): State<AppState>, Json(req): Json<InboundRequest>) -> Response {
    let msg = InboundMessage::new(req.sender, &req.text, now_ms());
    let outcome = st.bridge.handle_inbound(msg).await;
    let code = if outcome.status == InboundStatus::Denied {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::OK
    };
    (code, Json(outcome.into_response())).into_response()
}

async fn command(
    State(st): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<CommandRequest>,
) -> Result<Response, ApiError> {
    let cmd: Command = name.parse().map_err(ApiError::not_found)?;
    let resp = st.bridge.run_command(req.sender, cmd).await?;
    Ok(Json(resp).into_response())
}

#[derive(Debug)]
pub enum ApiError {
    Forbidden(String),
    NotFound(String),
    Internal(String),
}

impl ApiError {
    pub fn not_found<E: std::fmt::Display>(e: E) -> Self {
        Self::NotFound(e.to_string())
    }
}

impl From<BridgeError> for ApiError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::AuthorizationDenied(_) => Self::Forbidden(REPLY_DENIED.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (code, error) = match self {
            ApiError::Forbidden(m) => (StatusCode::FORBIDDEN, m),
            ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            ApiError::Internal(m) => {
                tracing::error!(error = %m, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, m)
            }
        };
        (code, Json(ErrorBody { error })).into_response()
    }
}
