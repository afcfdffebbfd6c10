use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use uuid::Uuid;

use crate::api::health::health;
use crate::backend::Backend;
use crate::config::MAX_UPLOAD_BYTES;
use crate::csv_import::parse_products;
use crate::error::AppError;
use crate::types::{ListingStatus, Product, ProductPatch};

#[derive(Clone)]
pub struct ApiState {
    /// `None` when no backend is configured; data endpoints answer 503.
    pub backend: Option<Arc<Backend>>,
}

impl ApiState {
    fn backend(&self) -> Result<&Backend, AppError> {
        self.backend.as_deref().ok_or(AppError::NotConfigured)
    }
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/health", get(health))
        .route("/api/products", get(get_unlisted))
        .route("/api/products/all", get(get_all))
        .route("/api/products/import", post(import_csv))
        .route("/api/products/:id", patch(patch_product).delete(delete_product))
        .route("/api/products/:id/images", post(upload_image).delete(remove_image))
        .route("/api/images/bulk", post(bulk_upload))
        .route("/images/*path", get(serve_image))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Query param structs
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct AllQuery {
    /// `not_listed`, `listed` or `all` (default).
    pub status: Option<String>,
    /// `updatedAt` (default) or `price`.
    pub sort: Option<String>,
    /// `desc` (default) or `asc`.
    pub order: Option<String>,
}

#[derive(Deserialize)]
pub struct UploadQuery {
    pub filename: Option<String>,
}

#[derive(Deserialize)]
pub struct RemoveImageBody {
    pub url: String,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct ImportResponse {
    pub imported: usize,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Read API consumed by the assistant: unlisted records, newest first.
async fn get_unlisted(State(state): State<ApiState>) -> Result<Json<Vec<Product>>, AppError> {
    let products = state.backend()?.list(Some(ListingStatus::NotListed)).await?;
    Ok(Json(products))
}

async fn get_all(
    State(state): State<ApiState>,
    Query(params): Query<AllQuery>,
) -> Result<Json<Vec<Product>>, AppError> {
    let status = match params.status.as_deref() {
        None | Some("") | Some("all") => None,
        Some(s) => Some(
            ListingStatus::parse(s)
                .ok_or_else(|| AppError::BadRequest(format!("unknown status '{s}'")))?,
        ),
    };
    let descending = match params.order.as_deref() {
        None | Some("desc") => true,
        Some("asc") => false,
        Some(o) => return Err(AppError::BadRequest(format!("order must be asc or desc (got '{o}')"))),
    };

    let mut products = state.backend()?.list(status).await?;
    match params.sort.as_deref() {
        None | Some("updatedAt") => products.sort_by_key(|p| p.updated_at),
        Some("price") => products.sort_by_key(|p| p.price),
        Some(s) => return Err(AppError::BadRequest(format!("cannot sort by '{s}'"))),
    }
    if descending {
        products.reverse();
    }
    Ok(Json(products))
}

async fn import_csv(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<ImportResponse>, AppError> {
    let backend = state.backend()?;
    let products = parse_products(&body)?;
    backend.insert(&products).await?;
    info!(count = products.len(), "CSV import complete");
    Ok(Json(ImportResponse { imported: products.len() }))
}

async fn patch_product(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(patch): Json<ProductPatch>,
) -> Result<Json<Product>, AppError> {
    let product = state.backend()?.update(id, &patch).await?;
    Ok(Json(product))
}

async fn delete_product(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    state.backend()?.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn upload_image(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Query(params): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<Product>, AppError> {
    let filename = params.filename.unwrap_or_else(|| "image.jpg".to_string());
    let product = state
        .backend()?
        .attach_image(id, &filename, body.to_vec())
        .await?;
    Ok(Json(product))
}

async fn remove_image(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(body): Json<RemoveImageBody>,
) -> Result<Json<Product>, AppError> {
    let product = state.backend()?.detach_image(id, &body.url).await?;
    Ok(Json(product))
}

async fn bulk_upload(
    State(state): State<ApiState>,
    Query(params): Query<UploadQuery>,
    body: Bytes,
) -> Result<Json<Product>, AppError> {
    let filename = params
        .filename
        .filter(|f| !f.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("filename query parameter is required".to_string()))?;
    let product = state
        .backend()?
        .attach_by_filename(&filename, body.to_vec())
        .await?;
    Ok(Json(product))
}

async fn serve_image(
    State(state): State<ApiState>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let (content_type, data) = state
        .backend()?
        .read_object(&path)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("image {path}")))?;
    Ok(([(header::CONTENT_TYPE, content_type)], data))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
