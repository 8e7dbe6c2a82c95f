mod file_config;

pub use file_config::{ConversionConfig, FileConfig};

use crate::ingestion::{IngestSettings, DEFAULT_CONVERSION_TIMEOUT, DEFAULT_FFMPEG_CANDIDATES};
use crate::server::{RequestsLoggingLevel, ServerConfig};
use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_DISPLAY_ROOT: &str = "/app/audio_files/audio";

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub storage_dir: Option<PathBuf>,
    pub work_dir: Option<PathBuf>,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub ffmpeg_paths: Vec<PathBuf>,
    pub conversion_timeout_sec: u64,
    pub max_upload_mb: usize,
    pub public_base_url: Option<String>,
    pub display_root: Option<String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            work_dir: None,
            port: 8000,
            metrics_port: 9091,
            logging_level: RequestsLoggingLevel::default(),
            ffmpeg_paths: Vec::new(),
            conversion_timeout_sec: DEFAULT_CONVERSION_TIMEOUT.as_secs(),
            max_upload_mb: 50,
            public_base_url: None,
            display_root: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub storage_dir: PathBuf,
    pub work_dir: PathBuf,
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub max_upload_mb: usize,
    pub max_upload_bytes: usize,
    pub public_base_url: String,
    pub display_root: String,

    // Feature configs (with defaults)
    pub conversion: ConversionSettings,
}

#[derive(Debug, Clone)]
pub struct ConversionSettings {
    pub ffmpeg_candidates: Vec<PathBuf>,
    pub timeout: Duration,
}

impl Default for ConversionSettings {
    fn default() -> Self {
        Self {
            ffmpeg_candidates: DEFAULT_FFMPEG_CANDIDATES
                .iter()
                .map(PathBuf::from)
                .collect(),
            timeout: DEFAULT_CONVERSION_TIMEOUT,
        }
    }
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let storage_dir = file
            .storage_dir
            .map(PathBuf::from)
            .or_else(|| cli.storage_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "storage_dir must be specified via --storage-dir or in config file"
                )
            })?;

        if storage_dir.exists() && !storage_dir.is_dir() {
            bail!("storage_dir is not a directory: {:?}", storage_dir);
        }
        std::fs::create_dir_all(&storage_dir)
            .with_context(|| format!("Cannot create storage directory: {:?}", storage_dir))?;

        let work_dir = file
            .work_dir
            .map(PathBuf::from)
            .or_else(|| cli.work_dir.clone())
            .unwrap_or_else(|| std::env::temp_dir().join("voice-ingest"));

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let max_upload_mb = file.max_upload_mb.unwrap_or(cli.max_upload_mb);
        if max_upload_mb == 0 {
            bail!("max_upload_mb must be greater than 0");
        }
        let max_upload_bytes = max_upload_mb
            .checked_mul(1024 * 1024)
            .ok_or_else(|| anyhow::anyhow!("max_upload_mb is too large: {}", max_upload_mb))?;

        let public_base_url = file
            .public_base_url
            .or_else(|| cli.public_base_url.clone())
            .unwrap_or_else(|| format!("http://localhost:{}/static", port));
        let public_base_url = public_base_url.trim_end_matches('/').to_string();

        let display_root = file
            .display_root
            .or_else(|| cli.display_root.clone())
            .unwrap_or_else(|| DEFAULT_DISPLAY_ROOT.to_string());
        let display_root = display_root.trim_end_matches('/').to_string();

        // Conversion settings - merge file config with CLI and defaults
        let conversion_file = file.conversion.unwrap_or_default();
        let timeout_sec = conversion_file
            .timeout_sec
            .unwrap_or(cli.conversion_timeout_sec);
        if timeout_sec == 0 {
            bail!("conversion timeout must be greater than 0");
        }
        let ffmpeg_candidates = match conversion_file.ffmpeg_paths {
            Some(paths) => paths.into_iter().map(PathBuf::from).collect(),
            None if !cli.ffmpeg_paths.is_empty() => cli.ffmpeg_paths.clone(),
            None => ConversionSettings::default().ffmpeg_candidates,
        };
        let conversion = ConversionSettings {
            ffmpeg_candidates,
            timeout: Duration::from_secs(timeout_sec),
        };

        Ok(Self {
            storage_dir,
            work_dir,
            port,
            metrics_port,
            logging_level,
            max_upload_mb,
            max_upload_bytes,
            public_base_url,
            display_root,
            conversion,
        })
    }

    pub fn ingest_settings(&self) -> IngestSettings {
        IngestSettings {
            work_dir: self.work_dir.clone(),
            public_base_url: self.public_base_url.clone(),
            display_root: self.display_root.clone(),
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            requests_logging_level: self.logging_level.clone(),
            port: self.port,
            metrics_port: self.metrics_port,
            max_upload_bytes: self.max_upload_bytes,
        }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
