//! Voice recording ingestion.
//!
//! An upload is a multipart form with a transcript, a dialect, a user id,
//! an optional transliteration and one audio file. The audio is converted
//! to WAV 16kHz mono when possible; otherwise the original bytes are kept.

mod converter;
mod models;
mod naming;
mod pipeline;

pub use converter::{
    AudioNormalizer, CandidatePathLocator, CodecLocator, ConversionError,
    DEFAULT_CONVERSION_TIMEOUT, DEFAULT_FFMPEG_CANDIDATES,
};
pub use models::{
    AudioArtifact, ConversionOutcome, IngestResult, UploadForm, FALLBACK_CONTENT_TYPE,
    FALLBACK_KEY_PREFIX, NORMALIZED_CONTENT_TYPE, NORMALIZED_KEY_PREFIX,
};
pub use naming::{artifact_base_name, format_timestamp, Clock, SystemClock};
pub use pipeline::{IngestPipeline, IngestSettings};

use crate::storage::StorageError;
use thiserror::Error;

/// Errors that can occur during ingestion.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IngestError {
    /// Coarse classification, used for status codes and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::BadRequest(_) => "bad_request",
            IngestError::Storage(_) | IngestError::Internal(_) => "internal",
        }
    }
}
