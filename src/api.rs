use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::SET_COOKIE, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use axum_extra::{headers::Cookie, TypedHeader};
use chrono::Utc;
use uuid::Uuid;

use crate::attributes::{AttributeSelection, Catalog};
use crate::error::{InteractionError, PipelineError};
use crate::models::{AnswerResponse, AskRequest, ErrorResponse, HealthResponse, HistoryResponse};
use crate::session::{SessionStore, Shell, UserRequest};

pub const SESSION_COOKIE: &str = "fashion_session";

pub struct AppState {
    pub shell: Shell,
    pub sessions: SessionStore,
    pub catalog: Catalog,
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/options", get(options_handler))
        .route("/api/ask", post(ask_handler))
        .route("/api/recommend", post(recommend_handler))
        .route("/api/history", get(history_handler))
        .route("/api/session/reset", post(reset_handler))
        .with_state(state)
}

fn session_id(cookies: &Option<TypedHeader<Cookie>>) -> Option<Uuid> {
    cookies
        .as_ref()
        .and_then(|TypedHeader(c)| c.get(SESSION_COOKIE))
        .and_then(|v| Uuid::parse_str(v).ok())
}

fn session_cookie(id: Uuid) -> String {
    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, id)
}

fn error_response(err: &InteractionError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match err {
        InteractionError::Validation(_) => {
            tracing::debug!("Rejected request: {}", err);
            StatusCode::UNPROCESSABLE_ENTITY
        }
        InteractionError::Pipeline(PipelineError::Configuration(e)) => {
            tracing::warn!("Pipeline not ready: {}", e);
            StatusCode::SERVICE_UNAVAILABLE
        }
        InteractionError::Pipeline(PipelineError::Provider(e)) => {
            tracing::error!("Provider error: {}", e);
            StatusCode::BAD_GATEWAY
        }
    };
    (
        status,
        Json(ErrorResponse {
            error: err.user_message(),
            kind: err.kind().to_string(),
        }),
    )
}

/// Body that failed to parse as the expected JSON, reported like any other validation error.
fn rejection_response(rejection: JsonRejection) -> Response {
    tracing::debug!("Rejected request body: {}", rejection.body_text());
    (
        rejection.status(),
        Json(ErrorResponse {
            error: format!("Invalid request: {}", rejection.body_text()),
            kind: "validation".to_string(),
        }),
    )
        .into_response()
}

async fn interact(state: &AppState, id: Option<Uuid>, request: UserRequest) -> Response {
    let session = state.sessions.get_or_create(id).await;
    let mut session = session.lock().await;
    let cookie = [(SET_COOKIE, session_cookie(session.id()))];

    match state.shell.interact(&mut session, request).await {
        Ok(answer) => (StatusCode::OK, cookie, Json(AnswerResponse::from(answer))).into_response(),
        Err(e) => {
            let (status, body) = error_response(&e);
            (status, cookie, body).into_response()
        }
    }
}

async fn ask_handler(
    State(state): State<Arc<AppState>>,
    cookies: Option<TypedHeader<Cookie>>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    interact(&state, session_id(&cookies), UserRequest::FreeText(request.query)).await
}

async fn recommend_handler(
    State(state): State<Arc<AppState>>,
    cookies: Option<TypedHeader<Cookie>>,
    payload: Result<Json<AttributeSelection>, JsonRejection>,
) -> Response {
    let Json(selection) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(rejection),
    };
    interact(&state, session_id(&cookies), UserRequest::Attributes(selection)).await
}

async fn history_handler(
    State(state): State<Arc<AppState>>,
    cookies: Option<TypedHeader<Cookie>>,
) -> Response {
    // Reading history never starts a session.
    let Some(session) = state.sessions.get(session_id(&cookies)).await else {
        return Json(HistoryResponse {
            session_id: None,
            entries: Vec::new(),
        })
        .into_response();
    };
    let session = session.lock().await;
    (
        [(SET_COOKIE, session_cookie(session.id()))],
        Json(HistoryResponse {
            session_id: Some(session.id().to_string()),
            entries: session.history().to_vec(),
        }),
    )
        .into_response()
}

async fn reset_handler(
    State(state): State<Arc<AppState>>,
    cookies: Option<TypedHeader<Cookie>>,
) -> Response {
    let session = state.sessions.reset(session_id(&cookies)).await;
    let session = session.lock().await;
    (
        [(SET_COOKIE, session_cookie(session.id()))],
        Json(HistoryResponse {
            session_id: Some(session.id().to_string()),
            entries: Vec::new(),
        }),
    )
        .into_response()
}

async fn options_handler(State(state): State<Arc<AppState>>) -> Json<Catalog> {
    Json(state.catalog.clone())
}

async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let pipeline = state.shell.pipeline();
    let index_ready = pipeline.is_ready().await;
    let llm_reachable = pipeline.generator().health_check().await;

    Json(HealthResponse {
        status: if index_ready { "healthy" } else { "degraded" }.to_string(),
        timestamp: Utc::now().to_rfc3339(),
        index_ready,
        llm_reachable,
    })
}
