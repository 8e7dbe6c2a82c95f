//! Request logging middleware
//!
//! Upload bodies are multipart forms carrying audio, so at `Body` level only
//! small textual bodies are printed. Multipart and binary bodies are
//! summarized by size, boundary and content type.

use super::super::state::ServerState;
use crate::multipart::{extract_boundary, is_multipart_form};
use crate::server::metrics::{categorize_endpoint, record_http_request};
use axum::extract::State;
use axum::{
    body::{Body, Bytes, HttpBody},
    http::{header, header::HeaderMap, Request, Response},
    middleware::Next,
    response::IntoResponse,
};
use std::time::Instant;
use tracing::{error, info};

#[derive(PartialEq, PartialOrd, Clone, Debug, Default, clap::ValueEnum)]
pub enum RequestsLoggingLevel {
    None,
    #[default]
    Path,
    Headers,
    Body,
}

impl std::fmt::Display for RequestsLoggingLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

const MAX_LOGGABLE_BODY_LENGTH: usize = 1024;

/// How a request or response body shows up in the log.
#[derive(Debug, PartialEq)]
enum BodyLog {
    /// Small textual body, printed in full.
    Print(usize),
    /// Anything else, described in one line.
    Summary(String),
}

/// Size from `Content-Length`, or from the body itself when it is fully buffered.
fn content_length(headers: &HeaderMap, body: &Body) -> Option<usize> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    declared.or_else(|| body.size_hint().exact().map(|n| n as usize))
}

fn is_textual(content_type: &str) -> bool {
    let content_type = content_type.to_ascii_lowercase();
    content_type.starts_with("text/")
        || content_type.contains("json")
        || content_type.contains("xml")
        || content_type.contains("x-www-form-urlencoded")
}

fn format_size(size: Option<usize>) -> String {
    match size {
        Some(size) => format!("{:#}", byte_unit::Byte::from(size)),
        None => "unknown size".to_string(),
    }
}

fn classify_body(headers: &HeaderMap, size: Option<usize>) -> BodyLog {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if is_multipart_form(content_type) {
        let boundary = extract_boundary(content_type).unwrap_or_else(|| "<none>".to_string());
        return BodyLog::Summary(format!(
            "multipart form, {}, boundary {}",
            format_size(size),
            boundary
        ));
    }

    if content_type.is_empty() && size == Some(0) {
        return BodyLog::Summary("empty".to_string());
    }

    if !is_textual(content_type) {
        let kind = if content_type.is_empty() {
            "untyped"
        } else {
            content_type
        };
        return BodyLog::Summary(format!("{}, {}", kind, format_size(size)));
    }

    match size {
        Some(size) if size < MAX_LOGGABLE_BODY_LENGTH => BodyLog::Print(size),
        Some(_) => BodyLog::Summary(format!("too big to log ({})", format_size(size))),
        None => BodyLog::Summary(format!("{}, length not set", content_type)),
    }
}

/// Buffers a small body so it can be logged and then handed on unchanged.
async fn buffer_body(body: Body, size: usize) -> Result<Bytes, axum::Error> {
    axum::body::to_bytes(body, size).await
}

fn internal_error() -> Response<Body> {
    Response::builder()
        .status(500)
        .body(Body::from("Internal Server Error"))
        .unwrap_or_default()
}

pub async fn log_requests(
    State(state): State<ServerState>,
    mut request: Request<Body>,
    next: Next,
) -> impl IntoResponse {
    let level = state.config.requests_logging_level.clone();
    let start = Instant::now();

    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    if level > RequestsLoggingLevel::None {
        info!(">>> {} {}", method, request.uri());
    }

    if level >= RequestsLoggingLevel::Headers {
        for (name, value) in request.headers() {
            info!("  Req {:?}: {:?}", name, value);
        }
    }

    if level >= RequestsLoggingLevel::Body {
        let size = content_length(request.headers(), request.body());
        match classify_body(request.headers(), size) {
            BodyLog::Summary(summary) => info!("  Req Body: {}", summary),
            BodyLog::Print(size) => {
                let (parts, body) = request.into_parts();
                let bytes = match buffer_body(body, size).await {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        error!("Failed to read request body: {:?}", err);
                        return internal_error();
                    }
                };
                info!("  Req Body:\n{}", String::from_utf8_lossy(&bytes));
                request = Request::from_parts(parts, Body::from(bytes));
            }
        }
    }

    let mut response = next.run(request).await;

    if level >= RequestsLoggingLevel::Headers {
        for (name, value) in response.headers() {
            info!("  Resp {:?}: {:?}", name, value);
        }
    }

    if level >= RequestsLoggingLevel::Body {
        let size = content_length(response.headers(), response.body());
        match classify_body(response.headers(), size) {
            BodyLog::Summary(summary) => info!("  Resp Body: {}", summary),
            BodyLog::Print(size) => {
                let (parts, body) = response.into_parts();
                let bytes = match buffer_body(body, size).await {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        error!("Failed to read response body: {:?}", err);
                        return internal_error();
                    }
                };
                info!("  Resp Body:\n{}", String::from_utf8_lossy(&bytes));
                response = Response::from_parts(parts, Body::from(bytes));
            }
        }
    }

    let status = response.status().as_u16();
    let duration = start.elapsed();

    if level > RequestsLoggingLevel::None {
        info!("<<< {} {} ({}ms)", status, path, duration.as_millis());
    }

    record_http_request(&method, categorize_endpoint(&path), status, duration);

    response
}
