//! Ingest pipeline - turns one upload request into one stored recording.
//!
//! Flow:
//! 1. Decode the multipart body
//! 2. Validate required fields and the audio attachment
//! 3. Derive the artifact base name
//! 4. Convert to WAV 16kHz mono, or fall back to the original bytes
//! 5. Persist the artifact and describe the result

use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::converter::AudioNormalizer;
use super::models::{AudioArtifact, IngestResult, UploadForm};
use super::naming::{artifact_base_name, Clock};
use super::IngestError;
use crate::multipart;
use crate::storage::ObjectStorage;

/// Settings for the ingest pipeline.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    /// Directory for per-request scratch files.
    pub work_dir: PathBuf,
    /// Base URL stored objects are served under.
    pub public_base_url: String,
    /// Directory shown to clients as the recording's location.
    pub display_root: String,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("voice-ingest"),
            public_base_url: "http://localhost:8000/static".to_string(),
            display_root: "/app/audio_files/audio".to_string(),
        }
    }
}

/// Orchestrates decode, validation, conversion and persistence of uploads.
pub struct IngestPipeline {
    storage: Arc<dyn ObjectStorage>,
    normalizer: AudioNormalizer,
    clock: Arc<dyn Clock>,
    settings: IngestSettings,
}

impl IngestPipeline {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        normalizer: AudioNormalizer,
        clock: Arc<dyn Clock>,
        settings: IngestSettings,
    ) -> Self {
        Self {
            storage,
            normalizer,
            clock,
            settings,
        }
    }

    pub fn normalizer(&self) -> &AudioNormalizer {
        &self.normalizer
    }

    pub fn storage(&self) -> &Arc<dyn ObjectStorage> {
        &self.storage
    }

    /// Ingest one raw multipart body.
    pub async fn ingest(&self, body: &[u8], boundary: &str) -> Result<IngestResult, IngestError> {
        if boundary.is_empty() {
            return Err(IngestError::BadRequest(
                "No boundary found in Content-Type".to_string(),
            ));
        }

        debug!("Body length: {}, Boundary: {}", body.len(), boundary);
        let form = multipart::decode(body, boundary);
        debug!(
            "Form fields: {:?}, files: {:?}",
            form.fields.keys().collect::<Vec<_>>(),
            form.files.keys().collect::<Vec<_>>()
        );

        let upload = UploadForm::from_decoded(&form)?;
        let base_name = artifact_base_name(
            &upload.text,
            &upload.dialect,
            &upload.transliteration,
            self.clock.now(),
        );
        info!(
            "User {} uploading {} bytes of {} audio as {}",
            upload.user_id,
            upload.audio.len(),
            upload.dialect,
            base_name
        );

        let artifact = self.prepare_artifact(&base_name, upload.audio).await?;

        if let Err(e) = self
            .storage
            .put(&artifact.key, &artifact.content, artifact.content_type)
            .await
        {
            error!("Failed to store {}: {}", artifact.key, e);
            return Err(e.into());
        }

        info!(
            "Stored {} ({} bytes, {})",
            artifact.key,
            artifact.content.len(),
            artifact.outcome.status_message()
        );
        Ok(self.describe(artifact))
    }

    /// Converts the audio, falling back to the original bytes if that fails.
    async fn prepare_artifact(
        &self,
        base_name: &str,
        audio: &[u8],
    ) -> Result<AudioArtifact, IngestError> {
        tokio::fs::create_dir_all(&self.settings.work_dir)
            .await
            .with_context(|| format!("Failed to create work dir {:?}", self.settings.work_dir))?;

        // Removed, with anything ffmpeg left in it, when dropped
        let output_dir = tempfile::Builder::new()
            .prefix("ingest-")
            .tempdir_in(&self.settings.work_dir)
            .context("Failed to create conversion directory")?;
        // Fixed name: the directory is already unique and base names can be long
        let wav_path = output_dir.path().join(CONVERTED_FILE_NAME);

        if self.normalizer.normalize(audio, &wav_path).await && is_file(&wav_path).await {
            let content = tokio::fs::read(&wav_path)
                .await
                .context("Failed to read converted audio")?;
            return Ok(AudioArtifact::normalized(base_name, content));
        }

        warn!("Conversion failed, uploading original file");
        Ok(AudioArtifact::fallback(base_name, audio.to_vec()))
    }

    fn describe(&self, artifact: AudioArtifact) -> IngestResult {
        IngestResult {
            success: true,
            storage_url: self.storage.locator(&artifact.key),
            public_url: format!(
                "{}/{}",
                self.settings.public_base_url.trim_end_matches('/'),
                encode_key(&artifact.key)
            ),
            display_path: format!(
                "{}/{}",
                self.settings.display_root.trim_end_matches('/'),
                artifact.filename
            ),
            size_bytes: artifact.content.len(),
            outcome: artifact.outcome,
            filename: artifact.filename,
            key: artifact.key,
        }
    }
}

const CONVERTED_FILE_NAME: &str = "output.wav";

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

/// Percent-encodes each `/`-separated segment of an object key for use in a URL.
fn encode_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}
