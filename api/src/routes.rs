use crate::query_payload::QueryPayload;
use crate::upload_params::UploadParams;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use pdf_qa::{Canceller, ErrorResponse, Session, SessionEvent, SessionView, UploadedDocument};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// The single session behind the form. Actions queue on the mutex and run
/// one at a time; cancelling does not need the lock.
pub struct AppState {
    session: Mutex<Session>,
    canceller: Canceller,
}

impl AppState {
    pub fn new(session: Session) -> Self {
        Self {
            session: Mutex::new(session),
            canceller: Canceller::new(),
        }
    }
}

pub type SharedState = Arc<AppState>;

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn router(state: SharedState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/session", get(current_view))
        .route("/document", post(upload_document))
        .route("/query", post(submit_query))
        .route("/clear", post(clear))
        .route("/cancel", post(cancel))
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .with_state(state)
}

fn is_pdf_filename(filename: &str) -> bool {
    static PDF_NAME: OnceLock<Regex> = OnceLock::new();
    PDF_NAME
        .get_or_init(|| Regex::new(r"(?i)^[^/\\]+\.pdf$").unwrap())
        .is_match(filename)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn current_view(State(state): State<SharedState>) -> Json<SessionView> {
    let session = state.session.lock().await;
    Json(session.view().clone())
}

async fn upload_document(
    State(state): State<SharedState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> Result<Json<SessionView>, ApiError> {
    if !is_pdf_filename(&params.filename) {
        log::warn!("Rejected upload '{}': not a .pdf file", params.filename);
        return Err((
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Json(ErrorResponse {
                status: "error".to_string(),
                error: format!("Only PDF files are accepted, got '{}'", params.filename),
            }),
        ));
    }

    let upload = UploadedDocument::new(params.filename, body.to_vec());
    let mut session = state.session.lock().await;
    let view = session
        .handle(SessionEvent::Upload(upload), state.canceller.signal())
        .await;
    Ok(Json(view.clone()))
}

async fn submit_query(
    State(state): State<SharedState>,
    Json(payload): Json<QueryPayload>,
) -> Json<SessionView> {
    let mut session = state.session.lock().await;
    let signal = state.canceller.signal();
    let view = session.handle(SessionEvent::Submit(payload.query), signal).await;
    Json(view.clone())
}

async fn clear(State(state): State<SharedState>) -> Json<SessionView> {
    let mut session = state.session.lock().await;
    let view = session
        .handle(SessionEvent::Clear, state.canceller.signal())
        .await;
    Json(view.clone())
}

async fn cancel(State(state): State<SharedState>) -> StatusCode {
    log::info!("Cancellation requested");
    state.canceller.cancel();
    StatusCode::ACCEPTED
}
