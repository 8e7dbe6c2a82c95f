//! Audio normalization to WAV 16kHz mono using ffmpeg.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::AsyncReadExt;
use tokio::process::{ChildStderr, Command};
use tracing::{debug, info, warn};

use crate::server::metrics;

/// Places where an ffmpeg binary is usually mounted.
pub const DEFAULT_FFMPEG_CANDIDATES: &[&str] = &[
    "/opt/bin/ffmpeg",
    "/opt/ffmpeg-layer/bin/ffmpeg",
    "/opt/ffmpeg",
];

/// Default hard limit for a single conversion.
pub const DEFAULT_CONVERSION_TIMEOUT: Duration = Duration::from_secs(30);

const TARGET_CHANNELS: &str = "1";
const TARGET_SAMPLE_RATE: &str = "16000";
const TARGET_CODEC: &str = "pcm_s16le";
const MAX_LOGGED_STDERR_CHARS: usize = 500;

/// Errors that can occur during audio conversion.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("ffmpeg not found, checked: {0}")]
    CodecNotFound(String),

    #[error("ffmpeg failed (code {code:?}): {stderr}")]
    ConversionFailed { code: Option<i32>, stderr: String },

    #[error("ffmpeg timed out after {0:?}")]
    TimedOut(Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Finds the codec executable to run.
pub trait CodecLocator: Send + Sync {
    /// Path of the executable, or `None` if it is not installed.
    fn locate(&self) -> Option<PathBuf>;

    /// Human-readable description of where the locator looks.
    fn describe(&self) -> String;
}

/// Probes an ordered list of candidate paths and picks the first that exists.
#[derive(Debug, Clone)]
pub struct CandidatePathLocator {
    candidates: Vec<PathBuf>,
}

impl CandidatePathLocator {
    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }

    pub fn candidates(&self) -> &[PathBuf] {
        &self.candidates
    }
}

impl Default for CandidatePathLocator {
    fn default() -> Self {
        Self::new(DEFAULT_FFMPEG_CANDIDATES.iter().map(PathBuf::from).collect())
    }
}

impl CodecLocator for CandidatePathLocator {
    fn locate(&self) -> Option<PathBuf> {
        self.candidates.iter().find(|p| p.is_file()).cloned()
    }

    fn describe(&self) -> String {
        format!("{:?}", self.candidates)
    }
}

/// Runs the external codec to turn arbitrary audio into canonical WAV.
pub struct AudioNormalizer {
    locator: Arc<dyn CodecLocator>,
    work_dir: PathBuf,
    timeout: Duration,
}

impl AudioNormalizer {
    /// Create a new normalizer.
    ///
    /// # Arguments
    /// * `locator` - Strategy used to find the ffmpeg executable
    /// * `work_dir` - Directory for temporary input files
    /// * `timeout` - Wall-clock limit for one ffmpeg run
    pub fn new(
        locator: Arc<dyn CodecLocator>,
        work_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            locator,
            work_dir: work_dir.into(),
            timeout,
        }
    }

    pub fn codec_available(&self) -> bool {
        self.locator.locate().is_some()
    }

    /// Converts `input` into WAV 16kHz mono at `target`.
    ///
    /// Returns `false` on any failure; the caller is expected to fall back
    /// to the original bytes. The temporary input file never outlives this
    /// call.
    pub async fn normalize(&self, input: &[u8], target: &Path) -> bool {
        let started = Instant::now();
        let result = self.convert(input, target).await;
        metrics::record_conversion(result.is_ok(), started.elapsed());

        match result {
            Ok(()) => {
                info!("Audio conversion successful in {:?}", started.elapsed());
                true
            }
            Err(err @ ConversionError::CodecNotFound(_)) => {
                warn!("{}", err);
                false
            }
            Err(err) => {
                warn!("Audio conversion failed: {}", err);
                false
            }
        }
    }

    async fn convert(&self, input: &[u8], target: &Path) -> Result<(), ConversionError> {
        let codec = self
            .locator
            .locate()
            .ok_or_else(|| ConversionError::CodecNotFound(self.locator.describe()))?;
        debug!("Using ffmpeg at {:?}", codec);

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let temp_input = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(".audio")
            .tempfile_in(&self.work_dir)?;
        tokio::fs::write(temp_input.path(), input).await?;

        info!("Converting audio: {} bytes -> {:?}", input.len(), target);

        let mut child = Command::new(&codec)
            .arg("-i")
            .arg(temp_input.path())
            .args([
                "-ac",
                TARGET_CHANNELS,
                "-ar",
                TARGET_SAMPLE_RATE,
                "-acodec",
                TARGET_CODEC,
                "-y", // Overwrite output
            ])
            .arg(target)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        // Drain stderr concurrently so a chatty ffmpeg cannot block on a full pipe
        let stderr_reader = tokio::spawn(read_stderr(child.stderr.take()));

        let status = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!("Failed to kill timed out ffmpeg: {}", e);
                }
                return Err(ConversionError::TimedOut(self.timeout));
            }
        };

        let stderr = stderr_reader.await.unwrap_or_default();

        if !status.success() {
            return Err(ConversionError::ConversionFailed {
                code: status.code(),
                stderr,
            });
        }

        debug!(
            "ffmpeg output: {}",
            stderr.chars().take(MAX_LOGGED_STDERR_CHARS).collect::<String>()
        );
        Ok(())
    }
}

async fn read_stderr(stderr: Option<ChildStderr>) -> String {
    let Some(mut stderr) = stderr else {
        return String::new();
    };
    let mut buffer = Vec::new();
    if let Err(e) = stderr.read_to_end(&mut buffer).await {
        debug!("Failed to read ffmpeg stderr: {}", e);
    }
    String::from_utf8_lossy(&buffer).into_owned()
}
