//! HTTP boundary: submit a URL (buffered or streamed), read a stored set.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_core::Stream;
use futures_util::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::core::LowLevelClient;
use crate::error::{ErrorKind, PipelineError};
use crate::pipeline::{GeneratedQuizSet, Submission, SubmissionPipeline};
use crate::store::QuizSetView;

pub const OWNER_HEADER: &str = "x-user-id";

pub type SharedPipeline = SubmissionPipeline<Box<dyn LowLevelClient>>;

/// Request body. The form posts `documentUrl`; other callers send `url`.
#[derive(Debug, Default, Deserialize)]
pub struct SubmitBody {
    #[serde(default, alias = "documentUrl")]
    pub url: Option<String>,
}

impl SubmitBody {
    /// A body that is not JSON, or lacks a JSON content type, carries no
    /// URL; the pipeline then rejects it as `invalid-url`.
    fn accept(body: Result<Json<Self>, JsonRejection>) -> Self {
        match body {
            Ok(Json(body)) => body,
            Err(rejection) => {
                warn!(status = %rejection.status(), reason = %rejection.body_text(), "Unreadable request body");
                Self::default()
            }
        }
    }

    fn into_submission(self, headers: &HeaderMap) -> Submission {
        let owner = headers
            .get(OWNER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from);
        Submission { url: self.url.unwrap_or_default(), owner }
    }
}

/// Failure as seen by the caller: a kind and a fixed message, nothing
/// from inside the pipeline.
#[derive(Debug)]
pub enum ApiError {
    Pipeline(ErrorKind),
    NotFound,
}

impl From<PipelineError> for ApiError {
    fn from(e: PipelineError) -> Self {
        Self::Pipeline(e.kind())
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidUrl | ErrorKind::InsecureUrl => StatusCode::BAD_REQUEST,
        ErrorKind::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::FetchError | ErrorKind::GenerationError => StatusCode::BAD_GATEWAY,
        ErrorKind::PersistenceError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            Self::Pipeline(kind) => (status_for(kind), kind.as_str(), kind.public_message()),
            Self::NotFound => (StatusCode::NOT_FOUND, "not-found", "Quiz set not found."),
        };
        let body = Json(json!({
            "error": {
                "kind": kind,
                "message": message,
            }
        }));
        (status, body).into_response()
    }
}

pub fn router(pipeline: SharedPipeline) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/quiz", post(create_quiz))
        .route("/api/quiz/stream", post(create_quiz_stream))
        .route("/api/quiz-sets/:id", get(get_quiz_set))
        .with_state(pipeline)
}

async fn health_check() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn create_quiz(
    State(pipeline): State<SharedPipeline>,
    headers: HeaderMap,
    body: Result<Json<SubmitBody>, JsonRejection>,
) -> Result<Json<GeneratedQuizSet>, ApiError> {
    let submission = SubmitBody::accept(body).into_submission(&headers);
    let set = pipeline.run(submission).await?;
    Ok(Json(set))
}

async fn create_quiz_stream(
    State(pipeline): State<SharedPipeline>,
    headers: HeaderMap,
    body: Result<Json<SubmitBody>, JsonRejection>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let submission = SubmitBody::accept(body).into_submission(&headers);
    info!(url = %submission.url, "Streaming submission accepted");
    let events = pipeline
        .run_streaming(submission)
        .map(|created| Event::default().event("created").json_data(created));
    Sse::new(events).keep_alive(KeepAlive::default())
}

async fn get_quiz_set(
    State(pipeline): State<SharedPipeline>,
    Path(id): Path<String>,
) -> Result<Json<QuizSetView>, ApiError> {
    let view = pipeline.store().fetch_quiz_set(&id).await.map_err(|e| {
        error!(quiz_set_id = %id, error = %e, "Failed to read quiz set");
        ApiError::Pipeline(ErrorKind::PersistenceError)
    })?;

    match view {
        Some(view) if view.is_complete() => Ok(Json(view)),
        Some(_) => {
            info!(quiz_set_id = %id, "Quiz set is incomplete; treating as absent");
            Err(ApiError::NotFound)
        }
        None => Err(ApiError::NotFound),
    }
}
