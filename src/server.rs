// 🌐 HTTP surface - axum router over the workflow dispatcher, listing store and data room

use crate::config::PlatformConfig;
use crate::data_room::{DataRoom, ShareableLink, StoredDocument};
use crate::db::{self, Listing, ListingDraft};
use crate::error::CoreError;
use crate::matching::{BusinessProfile, BuyerCatalog, MatchEngine};
use crate::transfer::TransferCatalog;
use crate::valuation::ValuationEngine;
use crate::workflow::{Action, AgentReply, SessionStore, StepCatalog, WorkflowDispatcher};
use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub const USER_HEADER: &str = "x-user-id";
pub const DEFAULT_USER: &str = "demo_user";

const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Core(CoreError::UnknownAction(_)) => StatusCode::BAD_REQUEST,
            ApiError::Core(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            ApiError::Core(err) => err.code(),
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = Json(json!({
            "error": {
                "code": self.error_code(),
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast_ref::<CoreError>() {
            Some(core) => ApiError::Core(core.clone()),
            None => ApiError::Internal(format!("{:#}", err)),
        }
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ============================================================================
// State
// ============================================================================

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<PlatformConfig>,
    pub dispatcher: Arc<WorkflowDispatcher>,
    pub sessions: Arc<SessionStore>,
    pub db: Arc<Mutex<Connection>>,
    pub data_room: Arc<DataRoom>,
}

impl AppState {
    /// Open the listing database and data room, load reference data once
    pub fn new(config: PlatformConfig) -> anyhow::Result<Self> {
        let conn = Connection::open(&config.database_path)
            .with_context(|| format!("Failed to open database {:?}", config.database_path))?;
        db::setup_database(&conn)?;

        let data_room = DataRoom::new(&config.data_room_dir)?;

        let catalog = match &config.buyer_catalog_path {
            Some(path) => BuyerCatalog::load(path)?,
            None => BuyerCatalog::builtin(),
        };
        tracing::info!(buyers = catalog.len(), "buyer catalog loaded");

        let dispatcher = WorkflowDispatcher::new(
            ValuationEngine::new().with_ebitda_margin(config.default_ebitda_margin),
            MatchEngine::new(Arc::new(catalog)),
            Arc::new(TransferCatalog::new()),
            Arc::new(StepCatalog::new()),
        );

        Ok(AppState {
            config: Arc::new(config),
            dispatcher: Arc::new(dispatcher),
            sessions: Arc::new(SessionStore::new()),
            db: Arc::new(Mutex::new(conn)),
            data_room: Arc::new(data_room),
        })
    }

    fn db(&self) -> ApiResult<MutexGuard<'_, Connection>> {
        self.db
            .lock()
            .map_err(|_| ApiError::Internal("database lock poisoned".to_string()))
    }

    fn run(&self, headers: &HeaderMap, action: Action) -> ApiResult<Json<AgentReply>> {
        let user_id = user_id(headers);
        let reply = self
            .sessions
            .with_session(&user_id, |session| self.dispatcher.dispatch(session, action))?;
        Ok(Json(reply))
    }
}

fn user_id(headers: &HeaderMap) -> String {
    headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_USER)
        .to_string()
}

// ============================================================================
// Requests
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ValuationRequest {
    #[serde(default)]
    pub financial_data: Value,
    #[serde(default)]
    pub method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListingStepRequest {
    pub current_step: usize,
    #[serde(default)]
    pub user_data: Value,
}

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub business_id: String,
    #[serde(default)]
    pub listing_data: ListingDraft,
}

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    #[serde(default)]
    pub business_profile: BusinessProfile,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub business_type: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadParams {
    pub business_id: String,
    pub filename: String,
}

#[derive(Debug, Deserialize)]
pub struct ShareRequest {
    pub recipient_id: String,
    #[serde(default)]
    pub expiry_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
struct UploadResponse {
    success: bool,
    message: String,
    document: StoredDocument,
    list_url: String,
}

#[derive(Debug, Serialize)]
struct PublishResponse {
    success: bool,
    message: String,
    listing_id: String,
    status: String,
    next_actions: Vec<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// GET / - Service banner
async fn root() -> impl IntoResponse {
    Json(json!({
        "message": "Welcome to Business Exit Platform API",
        "version": crate::VERSION,
    }))
}

/// GET /health - Health check
async fn health_check() -> impl IntoResponse {
    Json(json!({ "status": "healthy", "service": "business-exit-platform" }))
}

/// POST /api/valuation/calculate
async fn calculate_valuation(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ValuationRequest>,
) -> ApiResult<Json<AgentReply>> {
    state.run(
        &headers,
        Action::StartValuation {
            financial_data: request.financial_data,
            method: request.method.unwrap_or_else(|| "auto".to_string()),
        },
    )
}

/// POST /api/listing/step
async fn listing_step(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ListingStepRequest>,
) -> ApiResult<Json<AgentReply>> {
    state.run(
        &headers,
        Action::CreateListing {
            current_step: request.current_step,
            user_data: request.user_data,
        },
    )
}

/// POST /api/listing/publish
async fn publish_listing(
    State(state): State<AppState>,
    Json(request): Json<PublishRequest>,
) -> ApiResult<(StatusCode, Json<PublishResponse>)> {
    if request.business_id.trim().is_empty() {
        return Err(CoreError::invalid_input("business_id", "is required").into());
    }

    let conn = state.db()?;
    let listing = db::create_listing(&conn, &request.business_id, &request.listing_data)?;

    Ok((
        StatusCode::CREATED,
        Json(PublishResponse {
            success: true,
            message: "Business listing published successfully!".to_string(),
            listing_id: listing.id,
            status: listing.status.to_string(),
            next_actions: vec!["View listing".to_string(), "Share with buyers".to_string()],
        }),
    ))
}

/// GET /api/listing/:business_id
async fn business_listings(
    State(state): State<AppState>,
    Path(business_id): Path<String>,
) -> ApiResult<Json<Vec<Listing>>> {
    let conn = state.db()?;
    Ok(Json(db::get_business_listings(&conn, &business_id)?))
}

/// POST /api/matching/find-buyers
async fn find_buyers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<MatchRequest>,
) -> ApiResult<Json<AgentReply>> {
    state.run(
        &headers,
        Action::FindBuyers {
            business_profile: request.business_profile,
        },
    )
}

/// POST /api/transfer/start-transfer
async fn start_transfer(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<TransferRequest>,
) -> ApiResult<Json<AgentReply>> {
    state.run(
        &headers,
        Action::StartTransfer {
            business_type: request.business_type,
        },
    )
}

/// GET /api/transfer/checklist/:business_type
async fn transfer_checklist(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(business_type): Path<String>,
) -> ApiResult<Json<AgentReply>> {
    state.run(&headers, Action::StartTransfer { business_type })
}

/// POST /api/documents/upload?business_id=..&filename=.. (raw body)
async fn upload_document(
    State(state): State<AppState>,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let document = state
        .data_room
        .upload_document(&params.business_id, &params.filename, &body)?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            success: true,
            message: format!("Document \"{}\" uploaded successfully", document.filename),
            list_url: format!(
                "/api/documents/list/{}",
                urlencoding::encode(&params.business_id)
            ),
            document,
        }),
    ))
}

/// GET /api/documents/list/:business_id
async fn list_documents(
    State(state): State<AppState>,
    Path(business_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let documents = state.data_room.list_documents(&business_id)?;
    Ok(Json(json!({ "documents": documents })))
}

/// POST /api/documents/share
async fn share_documents(
    State(state): State<AppState>,
    Json(request): Json<ShareRequest>,
) -> ApiResult<Json<ShareableLink>> {
    let hours = request
        .expiry_hours
        .unwrap_or(state.config.share_link_expiry_hours);
    Ok(Json(state.data_room.shareable_link(&request.recipient_id, hours)?))
}

async fn fallback() -> ApiError {
    ApiError::NotFound("route".to_string())
}

// ============================================================================
// Router
// ============================================================================

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/valuation/calculate", post(calculate_valuation))
        .route("/listing/step", post(listing_step))
        .route("/listing/publish", post(publish_listing))
        .route("/listing/:business_id", get(business_listings))
        .route("/matching/find-buyers", post(find_buyers))
        .route("/transfer/start-transfer", post(start_transfer))
        .route("/transfer/checklist/:business_type", get(transfer_checklist))
        .route(
            "/documents/upload",
            post(upload_document).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/documents/list/:business_id", get(list_documents))
        .route("/documents/share", post(share_documents));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .fallback(fallback)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
