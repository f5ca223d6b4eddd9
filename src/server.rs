//! JSON HTTP server for the upload, question and feedback surfaces.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/index` | Index state: absent, or present with metadata |
//! | `POST` | `/ingest` | Replace the index with base64-encoded documents |
//! | `POST` | `/ask` | Answer a question from the indexed documents |
//! | `POST` | `/feedback` | Record feedback about an answer |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "index_unavailable", "message": "No index available. ..." } }
//! ```
//!
//! | Code | Status |
//! |------|--------|
//! | `bad_request`, `empty_query`, `empty_feedback` | 400 |
//! | `no_match` | 404 |
//! | `index_unavailable` | 409 |
//! | `empty_input`, `extract_failed` | 422 |
//! | `external_service` | 502 |
//! | `internal` | 500 |
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so a browser front end
//! served from another origin can call the API.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::error::PipelineError;
use crate::index::IndexStatus;
use crate::models::{content_type_for, Document};
use crate::pipeline::{IngestReport, Pipeline};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pipeline: Arc<Pipeline>,
    /// Most recent answer, used when feedback arrives without one.
    last_answer: Arc<Mutex<Option<String>>>,
}

impl AppState {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        Self {
            pipeline,
            last_answer: Arc::new(Mutex::new(None)),
        }
    }
}

/// Build the router. Exposed separately from [`run_server`] so it can be
/// driven in-process.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/index", get(handle_index))
        .route("/ingest", post(handle_ingest))
        .route("/ask", post(handle_ask))
        .route("/feedback", post(handle_feedback))
        .layer(cors)
        .with_state(state)
}

/// Bind to `[server].bind` and serve until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Arc::new(Pipeline::from_config(config));
    let app = router(AppState::new(pipeline));

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(bind = %config.server.bind, "server listening");
    println!("Listening on http://{}", config.server.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::EmptyQuery | PipelineError::EmptyFeedback => StatusCode::BAD_REQUEST,
            PipelineError::NoMatch => StatusCode::NOT_FOUND,
            PipelineError::IndexUnavailable => StatusCode::CONFLICT,
            PipelineError::EmptyInput | PipelineError::Extract(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PipelineError::ExternalService(_) => StatusCode::BAD_GATEWAY,
            PipelineError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!(error = %err, "request failed");
        }
        AppError {
            status,
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /index ============

async fn handle_index(State(state): State<AppState>) -> Result<Json<IndexStatus>, AppError> {
    Ok(Json(state.pipeline.index_status().await?))
}

// ============ POST /ingest ============

#[derive(Deserialize)]
struct IngestRequest {
    #[serde(default)]
    documents: Vec<UploadedDocument>,
}

#[derive(Deserialize)]
struct UploadedDocument {
    name: String,
    #[serde(default)]
    content_type: Option<String>,
    content_base64: String,
}

impl UploadedDocument {
    fn into_document(self) -> Result<Document, AppError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(self.content_base64.as_bytes())
            .map_err(|e| bad_request(format!("{}: invalid base64: {}", self.name, e)))?;
        let content_type = match self.content_type {
            Some(ct) => ct,
            None => content_type_for(&self.name)
                .ok_or_else(|| {
                    bad_request(format!(
                        "{}: cannot infer content type; pass content_type",
                        self.name
                    ))
                })?
                .to_string(),
        };
        Ok(Document::new(self.name, content_type, bytes))
    }
}

async fn handle_ingest(
    State(state): State<AppState>,
    Json(request): Json<IngestRequest>,
) -> Result<Json<IngestReport>, AppError> {
    let documents = request
        .documents
        .into_iter()
        .map(UploadedDocument::into_document)
        .collect::<Result<Vec<_>, _>>()?;

    let report = state.pipeline.ingest(documents).await?;
    // Answers about the previous documents no longer apply.
    *state.last_answer.lock().await = None;
    Ok(Json(report))
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

#[derive(Serialize)]
struct AskResponse {
    answer: String,
    sources: Vec<SourceExcerpt>,
}

#[derive(Serialize)]
struct SourceExcerpt {
    index: i64,
    score: f32,
    excerpt: String,
}

async fn handle_ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let answer = state.pipeline.ask(&request.question).await?;
    *state.last_answer.lock().await = Some(answer.text.clone());

    let sources = answer
        .sources
        .iter()
        .map(|s| SourceExcerpt {
            index: s.chunk.index,
            score: s.score,
            excerpt: s.chunk.text.chars().take(240).collect(),
        })
        .collect();

    Ok(Json(AskResponse {
        answer: answer.text,
        sources,
    }))
}

// ============ POST /feedback ============

#[derive(Deserialize)]
struct FeedbackRequest {
    feedback: String,
    #[serde(default)]
    answer: Option<String>,
}

#[derive(Serialize)]
struct FeedbackResponse {
    status: String,
}

async fn handle_feedback(
    State(state): State<AppState>,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, AppError> {
    let answer = match request.answer {
        Some(answer) => answer,
        None => state
            .last_answer
            .lock()
            .await
            .clone()
            .ok_or_else(|| bad_request("no answer to attach feedback to; ask a question first"))?,
    };

    state
        .pipeline
        .record_feedback(&answer, &request.feedback)
        .await?;

    Ok(Json(FeedbackResponse {
        status: "recorded".to_string(),
    }))
}
