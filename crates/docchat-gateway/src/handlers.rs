use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse};
use docchat_core::session::{ChatReply, ProcessSummary, Session, SessionId};
use docchat_llm::provider::Message;
use docchat_memory::document::UploadedFile;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::error::ApiError;
use super::server::AppState;

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    uptime_secs: u64,
    sessions: usize,
}

#[derive(Serialize)]
pub(crate) struct SessionView {
    pub session_id: SessionId,
    pub ready: bool,
    pub messages: Vec<Message>,
}

impl SessionView {
    fn of(session: &Session) -> Self {
        Self {
            session_id: session.id(),
            ready: session.is_ready(),
            messages: session.messages().to_vec(),
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct ChatRequest {
    pub question: String,
}

async fn lookup(state: &AppState, id: &str) -> Result<Arc<Mutex<Session>>, ApiError> {
    let Ok(parsed) = id.parse::<SessionId>() else {
        return Err(ApiError::unknown_session(id));
    };
    state
        .registry
        .get(parsed)
        .await
        .ok_or_else(|| ApiError::unknown_session(id))
}

pub(crate) async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub(crate) async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.started_at.elapsed().as_secs(),
        sessions: state.registry.len().await,
    })
}

pub(crate) async fn create_session_handler(State(state): State<AppState>) -> impl IntoResponse {
    let (_, session) = state.registry.create().await;
    let view = SessionView::of(&*session.lock().await);
    (StatusCode::CREATED, Json(view))
}

pub(crate) async fn messages_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ApiError> {
    let session = lookup(&state, &id).await?;
    let view = SessionView::of(&*session.lock().await);
    Ok(Json(view))
}

pub(crate) async fn process_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ProcessSummary>, ApiError> {
    let session = lookup(&state, &id).await?;

    let mut api_key = String::new();
    let mut files = Vec::new();
    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("api_key") => api_key = field.text().await?,
            Some("files") => {
                let file_name = field.file_name().unwrap_or_default().to_owned();
                let bytes = field.bytes().await?;
                if file_name.is_empty() && bytes.is_empty() {
                    continue;
                }
                files.push(UploadedFile::new(file_name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let key = state
        .config
        .resolve_api_key(&api_key, state.vault.as_ref())
        .await
        .map_err(ApiError::internal)?;

    let mut session = session.lock().await;
    let summary = session.process(&key, &files).await?;
    tracing::info!(
        session = %session.id(),
        files = files.len(),
        documents = summary.documents,
        chunks = summary.chunks,
        skipped = summary.skipped.len(),
        "files processed"
    );
    Ok(Json(summary))
}

pub(crate) async fn chat_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatReply>, ApiError> {
    let session = lookup(&state, &id).await?;
    let reply = session.lock().await.ask(&req.question).await?;
    Ok(Json(reply))
}

pub(crate) async fn delete_session_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let Ok(parsed) = id.parse::<SessionId>() else {
        return Err(ApiError::unknown_session(&id));
    };
    if state.registry.remove(parsed).await {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::unknown_session(&id))
    }
}
