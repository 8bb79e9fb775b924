use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::error::{GenerationError, LifecycleError};
use crate::orchestrator::GenerationOrchestrator;
use crate::task::{build_view, PromptHistoryItem, Task, TaskFilter, TaskStatus, TaskView};

pub type AppState = Arc<GenerationOrchestrator>;

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TasksQuery {
    pub status: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        let status = match err {
            GenerationError::Validation(_) => StatusCode::BAD_REQUEST,
            GenerationError::Busy => StatusCode::CONFLICT,
            GenerationError::Collaborator(_) | GenerationError::EmptyResponse => StatusCode::BAD_GATEWAY,
            GenerationError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
            GenerationError::HistoryNotFound(_) => StatusCode::NOT_FOUND,
        };
        Self {
            status,
            message: err.user_message(),
        }
    }
}

impl From<LifecycleError> for ApiError {
    fn from(err: LifecycleError) -> Self {
        let status = match err {
            LifecycleError::TaskNotFound(_) => StatusCode::NOT_FOUND,
            LifecycleError::InvalidTransition { .. } => StatusCode::CONFLICT,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = self.status.as_u16(), error = %self.message, "request failed");
        }
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

pub async fn handle_health() -> Json<serde_json::Value> {
    Json(json!({"status": "ok", "version": env!("CARGO_PKG_VERSION")}))
}

pub async fn handle_generate(
    State(orchestrator): State<AppState>,
    body: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let Json(req) = body?;
    let prompt = req.prompt.unwrap_or_default();
    let tasks = orchestrator.submit(&prompt).await?;
    Ok(Json(tasks))
}

pub async fn handle_tasks(
    State(orchestrator): State<AppState>,
    Query(query): Query<TasksQuery>,
) -> Result<Json<TaskView>, ApiError> {
    let filter = TaskFilter::parse(
        query.status.as_deref(),
        query.category.as_deref(),
        query.search.as_deref(),
    )
    .map_err(|err| ApiError::bad_request(&err))?;
    let tasks = orchestrator.engine().snapshot();
    Ok(Json(build_view(&tasks, &filter)))
}

pub async fn handle_accept(
    State(orchestrator): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(orchestrator.engine().accept(&id)?))
}

pub async fn handle_reject(
    State(orchestrator): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Task>, ApiError> {
    Ok(Json(orchestrator.engine().reject(&id)?))
}

pub async fn handle_set_status(
    State(orchestrator): State<AppState>,
    Path(id): Path<String>,
    body: Result<Json<StatusRequest>, JsonRejection>,
) -> Result<Json<Task>, ApiError> {
    let Json(req) = body?;
    let status = req
        .status
        .parse::<TaskStatus>()
        .map_err(|err| ApiError::bad_request(&err))?;
    Ok(Json(orchestrator.engine().set_status(&id, status)?))
}

pub async fn handle_history(State(orchestrator): State<AppState>) -> Json<Vec<PromptHistoryItem>> {
    Json(orchestrator.history_items())
}

pub async fn handle_clear_history(State(orchestrator): State<AppState>) -> StatusCode {
    orchestrator.clear_history();
    StatusCode::NO_CONTENT
}

pub async fn handle_restore(
    State(orchestrator): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Task>>, ApiError> {
    Ok(Json(orchestrator.restore(&id).await?))
}
