use serde::Serialize;

use crate::multipart::DecodedForm;

use super::IngestError;

/// Field names expected in an upload form.
pub const FIELD_TEXT: &str = "text";
pub const FIELD_DIALECT: &str = "dialect";
pub const FIELD_USER_ID: &str = "user_id";
pub const FIELD_TRANSLITERATION: &str = "transliteration";
pub const FIELD_FILE: &str = "file";

pub const NORMALIZED_KEY_PREFIX: &str = "audio/";
pub const FALLBACK_KEY_PREFIX: &str = "audio/fallback/";
pub const NORMALIZED_CONTENT_TYPE: &str = "audio/wav";
/// Assumed for every fallback upload, the original format is not inspected.
pub const FALLBACK_CONTENT_TYPE: &str = "audio/mp4";

/// Which shape of artifact ended up in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionOutcome {
    /// Converted to WAV 16kHz mono.
    Normalized,
    /// Original bytes stored as uploaded.
    Fallback,
}

impl ConversionOutcome {
    pub fn status_message(&self) -> &'static str {
        match self {
            ConversionOutcome::Normalized => "converted to WAV 16kHz mono",
            ConversionOutcome::Fallback => "conversion failed, saved original",
        }
    }

    /// Short label as reported to clients.
    pub fn label(&self) -> &'static str {
        match self {
            ConversionOutcome::Normalized => "success",
            ConversionOutcome::Fallback => "failed",
        }
    }
}

/// A validated upload form.
#[derive(Debug, Clone)]
pub struct UploadForm<'a> {
    pub text: String,
    pub dialect: String,
    pub user_id: String,
    pub transliteration: String,
    pub audio: &'a [u8],
}

impl<'a> UploadForm<'a> {
    /// Checks required fields and the audio attachment. Values are trimmed.
    pub fn from_decoded(form: &'a DecodedForm) -> Result<Self, IngestError> {
        let trimmed = |name: &str| form.field(name).unwrap_or("").trim().to_string();

        let text = trimmed(FIELD_TEXT);
        let dialect = trimmed(FIELD_DIALECT);
        let user_id = trimmed(FIELD_USER_ID);
        let transliteration = trimmed(FIELD_TRANSLITERATION);

        if text.is_empty() || dialect.is_empty() || user_id.is_empty() {
            return Err(IngestError::BadRequest(
                "Missing required fields: text, dialect, user_id".to_string(),
            ));
        }

        let audio = form
            .file(FIELD_FILE)
            .map(|f| f.content.as_slice())
            .ok_or_else(|| IngestError::BadRequest("No audio file uploaded".to_string()))?;

        Ok(Self {
            text,
            dialect,
            user_id,
            transliteration,
            audio,
        })
    }
}

/// The bytes to persist and where to put them.
#[derive(Debug, Clone)]
pub struct AudioArtifact {
    pub key: String,
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: &'static str,
    pub outcome: ConversionOutcome,
}

impl AudioArtifact {
    pub fn normalized(base_name: &str, content: Vec<u8>) -> Self {
        let filename = format!("{}.wav", base_name);
        Self {
            key: format!("{}{}", NORMALIZED_KEY_PREFIX, filename),
            filename,
            content,
            content_type: NORMALIZED_CONTENT_TYPE,
            outcome: ConversionOutcome::Normalized,
        }
    }

    pub fn fallback(base_name: &str, original: Vec<u8>) -> Self {
        let filename = format!("{}.original", base_name);
        Self {
            key: format!("{}{}", FALLBACK_KEY_PREFIX, filename),
            filename,
            content: original,
            content_type: FALLBACK_CONTENT_TYPE,
            outcome: ConversionOutcome::Fallback,
        }
    }
}

/// Outcome of a completed ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestResult {
    pub success: bool,
    pub key: String,
    pub filename: String,
    pub size_bytes: usize,
    pub outcome: ConversionOutcome,
    /// Storage locator of the persisted object.
    pub storage_url: String,
    /// Public URL the object is served under.
    pub public_url: String,
    pub display_path: String,
}

impl IngestResult {
    pub fn status_message(&self) -> &'static str {
        self.outcome.status_message()
    }
}
