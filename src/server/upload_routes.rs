//! Upload HTTP routes.
//!
//! Provides endpoints for:
//! - Uploading a recording as multipart/form-data
//! - Reading stored recordings back

use axum::{
    body::{Body, Bytes},
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::Engine;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::ingestion::{ConversionOutcome, IngestError, IngestResult};
use crate::multipart::{extract_boundary, is_multipart_form};
use crate::storage::StorageError;

use super::metrics;
use super::state::{GuardedIngestPipeline, ServerState};

const TRANSFER_ENCODING_HEADER: &str = "content-transfer-encoding";

// =============================================================================
// Request/Response Types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub status: &'static str,
    pub message: String,
    pub public_url: String,
    pub display_path: String,
    pub storage_url: String,
    pub filename: String,
    pub size_bytes: usize,
    pub conversion: &'static str,
}

impl From<IngestResult> for UploadResponse {
    fn from(result: IngestResult) -> Self {
        Self {
            status: "success",
            message: format!(
                "File processed and saved successfully - {}",
                result.status_message()
            ),
            conversion: result.outcome.label(),
            public_url: result.public_url,
            display_path: result.display_path,
            storage_url: result.storage_url,
            filename: result.filename,
            size_bytes: result.size_bytes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub status: &'static str,
    pub message: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            status: "error",
            message: message.into(),
        }),
    )
        .into_response()
}

// =============================================================================
// Routes
// =============================================================================

/// POST /upload - Ingest a recording (raw multipart/form-data body)
pub(super) async fn upload(
    State(pipeline): State<GuardedIngestPipeline>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if !is_multipart_form(content_type) {
        metrics::record_upload("bad_request", 0);
        return error_response(
            StatusCode::BAD_REQUEST,
            format!("Expected multipart/form-data, got: {}", content_type),
        );
    }

    let Some(boundary) = extract_boundary(content_type) else {
        metrics::record_upload("bad_request", 0);
        return error_response(StatusCode::BAD_REQUEST, "No boundary found in Content-Type");
    };

    let body = match decode_transfer_encoding(&headers, body) {
        Ok(body) => body,
        Err(message) => {
            metrics::record_upload("bad_request", 0);
            return error_response(StatusCode::BAD_REQUEST, message);
        }
    };

    match pipeline.ingest(&body, &boundary).await {
        Ok(result) => {
            let outcome = match result.outcome {
                ConversionOutcome::Normalized => "normalized",
                ConversionOutcome::Fallback => "fallback",
            };
            metrics::record_upload(outcome, result.size_bytes);
            Json(UploadResponse::from(result)).into_response()
        }
        Err(IngestError::BadRequest(message)) => {
            warn!("Rejected upload: {}", message);
            metrics::record_upload("bad_request", 0);
            error_response(StatusCode::BAD_REQUEST, message)
        }
        Err(err) => {
            metrics::record_upload(err.kind(), 0);
            let message = format!("Internal server error: {}", err);
            error!("Upload failed: {:#}", anyhow::Error::new(err));
            error_response(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
    }
}

/// Undo an optional base64 transfer encoding of the whole body.
fn decode_transfer_encoding(headers: &HeaderMap, body: Bytes) -> Result<Bytes, String> {
    let encoding = headers
        .get(TRANSFER_ENCODING_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_ascii_lowercase());

    match encoding.as_deref() {
        None | Some("") | Some("binary") | Some("8bit") | Some("7bit") => Ok(body),
        Some("base64") => {
            let compact: Vec<u8> = body
                .iter()
                .copied()
                .filter(|b| !b.is_ascii_whitespace())
                .collect();
            base64::engine::general_purpose::STANDARD
                .decode(compact)
                .map(Bytes::from)
                .map_err(|e| format!("Invalid base64 body: {}", e))
        }
        Some(other) => Err(format!("Unsupported transfer encoding: {}", other)),
    }
}

/// GET /static/{*key} - Serve a stored recording
async fn get_stored_object(
    State(pipeline): State<GuardedIngestPipeline>,
    Path(key): Path<String>,
) -> Response {
    match pipeline.storage().get(&key).await {
        Ok(Some(object)) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, object.content_type)
            .body(Body::from(object.body))
            .unwrap_or_else(|e| {
                error!("Failed to build response for {}: {}", key, e);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(StorageError::InvalidKey(_)) => {
            debug!("Rejected object key {}", key);
            StatusCode::NOT_FOUND.into_response()
        }
        Err(e) => {
            error!("Failed to read {}: {}", key, e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub fn make_upload_routes(state: ServerState) -> Router {
    Router::new()
        .route("/upload", post(upload))
        .route("/static/{*key}", get(get_stored_object))
        .with_state(state)
}
