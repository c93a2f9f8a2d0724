//! JSON HTTP API over the catalog, the job manager, and search.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | Health check (returns version) |
//! | `GET`    | `/items` | List items in insertion order |
//! | `POST`   | `/items` | Create a Pending item |
//! | `GET`    | `/items/{id}` | Fetch one item |
//! | `POST`   | `/items/{id}/reports` | Attach a lab report |
//! | `POST`   | `/items/{id}/analysis` | Start analysis (202) |
//! | `GET`    | `/items/{id}/analysis` | Active job snapshot, or last outcome |
//! | `DELETE` | `/items/{id}/analysis` | Cancel the active job |
//! | `POST`   | `/search` | Faceted search, text or image mode |
//! | `GET`    | `/summary` | Aggregation snapshot |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "already_running", "message": "analysis already running for item ..." } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `invalid_state` (409),
//! `already_running` (409), `already_completed` (409),
//! `recognition_failed` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser dashboards
//! can call the API directly.

use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use medlab_core::models::{CatalogItem, LabReport, NewItem};
use medlab_core::recognition::ImageInput;
use medlab_core::report::Summary;
use medlab_core::search::{Facets, SearchMode, SearchQuery};
use medlab_core::CatalogError;

use crate::catalog::seed_catalog;
use crate::config::Config;
use crate::jobs::JobSnapshot;
use crate::progress::NoProgress;
use crate::service::{AnalysisStatus, LabService};

/// Starts the HTTP server.
///
/// Seeds the catalog from `[catalog]`, binds to `[server].bind`, and runs
/// until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let service = LabService::from_config(config, std::sync::Arc::new(NoProgress));
    seed_catalog(service.store().as_ref(), config).await?;

    let bind_addr = config.server.bind.clone();
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "medlab server listening");
    println!("medlab server listening on http://{}", bind_addr);

    axum::serve(listener, build_router(service)).await?;
    Ok(())
}

/// All routes over one shared [`LabService`].
pub fn build_router(service: LabService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/items", get(handle_list_items).post(handle_create_item))
        .route("/items/{id}", get(handle_get_item))
        .route("/items/{id}/reports", post(handle_attach_report))
        .route(
            "/items/{id}/analysis",
            post(handle_start_analysis)
                .get(handle_analysis_status)
                .delete(handle_cancel_analysis),
        )
        .route("/search", post(handle_search))
        .route("/summary", get(handle_summary))
        .layer(cors)
        .with_state(service)
}

// ============ Error response ============

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
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

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        let status = match &err {
            CatalogError::Validation(_) => StatusCode::BAD_REQUEST,
            CatalogError::NotFound(_) => StatusCode::NOT_FOUND,
            CatalogError::InvalidState(_)
            | CatalogError::AlreadyRunning(_)
            | CatalogError::AlreadyCompleted(_) => StatusCode::CONFLICT,
            CatalogError::Recognition(_) => StatusCode::BAD_GATEWAY,
            CatalogError::AnalysisFailed { .. } => {
                warn!(error = %err, "analysis failure surfaced through the API");
                return AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal".to_string(),
                    message: err.to_string(),
                };
            }
        };
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

// ============ /items ============

#[derive(Serialize)]
struct ItemListResponse {
    items: Vec<CatalogItem>,
}

async fn handle_list_items(
    State(service): State<LabService>,
) -> Result<Json<ItemListResponse>, AppError> {
    let items = service.list_items().await?;
    Ok(Json(ItemListResponse { items }))
}

async fn handle_create_item(
    State(service): State<LabService>,
    Json(fields): Json<NewItem>,
) -> Result<(StatusCode, Json<CatalogItem>), AppError> {
    let item = service.create_item(fields).await?;
    info!(item_id = %item.id, name = %item.name, "item created");
    Ok((StatusCode::CREATED, Json(item)))
}

async fn handle_get_item(
    State(service): State<LabService>,
    Path(id): Path<String>,
) -> Result<Json<CatalogItem>, AppError> {
    Ok(Json(service.get_item(&id).await?))
}

/// Request body for `POST /items/{id}/reports`.
#[derive(Deserialize)]
struct ReportRequest {
    sample_id: String,
    result: String,
    #[serde(default)]
    interpretation: String,
}

async fn handle_attach_report(
    State(service): State<LabService>,
    Path(id): Path<String>,
    Json(req): Json<ReportRequest>,
) -> Result<(StatusCode, Json<CatalogItem>), AppError> {
    let report = LabReport::new(req.sample_id, req.result, req.interpretation);
    let item = service.attach_report(&id, report).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

// ============ /items/{id}/analysis ============

async fn handle_start_analysis(
    State(service): State<LabService>,
    Path(id): Path<String>,
) -> Result<(StatusCode, Json<JobSnapshot>), AppError> {
    let handle = service.start_analysis(&id).await?;
    Ok((StatusCode::ACCEPTED, Json(handle.snapshot())))
}

async fn handle_analysis_status(
    State(service): State<LabService>,
    Path(id): Path<String>,
) -> Result<Json<AnalysisStatus>, AppError> {
    Ok(Json(service.analysis_status(&id).await?))
}

async fn handle_cancel_analysis(
    State(service): State<LabService>,
    Path(id): Path<String>,
) -> Result<Json<CatalogItem>, AppError> {
    service.cancel_analysis(&id).await?;
    Ok(Json(service.get_item(&id).await?))
}

// ============ POST /search ============

/// Request body for `POST /search`.
#[derive(Deserialize)]
struct SearchRequest {
    /// `"text"` (default) or `"image"`.
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    text: String,
    /// Standard base64; required in image mode.
    #[serde(default)]
    image_base64: Option<String>,
    /// Facet name → value. `"any"` or absent means unconstrained.
    #[serde(default)]
    facets: BTreeMap<String, String>,
}

#[derive(Serialize)]
struct SearchResponse {
    results: Vec<CatalogItem>,
}

impl SearchRequest {
    fn into_query(self) -> Result<SearchQuery, AppError> {
        let mode = match self.mode.as_deref() {
            None => SearchMode::Text,
            Some(m) => m.parse::<SearchMode>()?,
        };
        let image = match self.image_base64 {
            Some(encoded) => Some(ImageInput::new(
                base64::engine::general_purpose::STANDARD
                    .decode(encoded.trim())
                    .map_err(|e| bad_request(format!("image_base64 is not valid base64: {}", e)))?,
            )),
            None => None,
        };
        Ok(SearchQuery {
            mode,
            text: self.text,
            image,
            facets: Facets::from_map(&self.facets)?,
        })
    }
}

async fn handle_search(
    State(service): State<LabService>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, AppError> {
    let query = req.into_query()?;
    let results = service.search(&query).await?;
    Ok(Json(SearchResponse { results }))
}

// ============ GET /summary ============

async fn handle_summary(State(service): State<LabService>) -> Result<Json<Summary>, AppError> {
    Ok(Json(service.summary().await?))
}
