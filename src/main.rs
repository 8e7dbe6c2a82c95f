use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Import modules from the library crate
use voice_ingest_server::config;
use voice_ingest_server::ingestion::{
    AudioNormalizer, CandidatePathLocator, CodecLocator, IngestPipeline, SystemClock,
};
use voice_ingest_server::server::{metrics, run_server, RequestsLoggingLevel};
use voice_ingest_server::storage::LocalObjectStorage;

fn parse_path(s: &str) -> Result<PathBuf, String> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(format!("Error resolving path '{}': {}", s, msg));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir().map_err(|e| format!("Failed to get current dir: {}", e))?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
#[clap(version, about = "Receives voice recordings and stores them as WAV 16kHz mono")]
struct CliArgs {
    /// Path to TOML configuration file. Values in the file override CLI arguments.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory where recordings are stored.
    /// Can also be specified in config file.
    #[clap(long, value_parser = parse_path)]
    pub storage_dir: Option<PathBuf>,

    /// Directory for temporary conversion files. Defaults to a system temp subdirectory.
    #[clap(long, value_parser = parse_path)]
    pub work_dir: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 8000)]
    pub port: u16,

    /// The port for the metrics server (Prometheus scraping).
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Location of the ffmpeg executable. May be repeated; the first existing path wins.
    #[clap(long = "ffmpeg-path", value_parser = parse_path)]
    pub ffmpeg_paths: Vec<PathBuf>,

    /// Maximum time in seconds a single conversion may take.
    #[clap(long, default_value_t = 30)]
    pub conversion_timeout_sec: u64,

    /// Maximum accepted upload size in megabytes.
    #[clap(long, default_value_t = 50)]
    pub max_upload_mb: usize,

    /// Base URL under which stored recordings are publicly reachable.
    #[clap(long)]
    pub public_base_url: Option<String>,

    /// Directory shown to clients as the location of stored recordings.
    #[clap(long)]
    pub display_root: Option<String>,
}

/// Convert CLI args to CliConfig for config resolution
impl From<&CliArgs> for config::CliConfig {
    fn from(args: &CliArgs) -> Self {
        config::CliConfig {
            storage_dir: args.storage_dir.clone(),
            work_dir: args.work_dir.clone(),
            port: args.port,
            metrics_port: args.metrics_port,
            logging_level: args.logging_level.clone(),
            ffmpeg_paths: args.ffmpeg_paths.clone(),
            conversion_timeout_sec: args.conversion_timeout_sec,
            max_upload_mb: args.max_upload_mb,
            public_base_url: args.public_base_url.clone(),
            display_root: args.display_root.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .context("Failed to initialize logging")?;

    // Load TOML config if provided
    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Some(config::FileConfig::load(path)?)
        }
        None => None,
    };

    // Resolve final configuration (TOML overrides CLI)
    let cli_config: config::CliConfig = (&cli_args).into();
    let app_config = config::AppConfig::resolve(&cli_config, file_config)?;

    info!("Configuration loaded:");
    info!("  storage_dir: {:?}", app_config.storage_dir);
    info!("  work_dir: {:?}", app_config.work_dir);
    info!("  port: {}", app_config.port);
    info!("  public_base_url: {}", app_config.public_base_url);

    // Initialize metrics system
    info!("Initializing metrics...");
    metrics::init_metrics();

    let storage = LocalObjectStorage::new(&app_config.storage_dir)
        .with_context(|| format!("Failed to open storage at {:?}", app_config.storage_dir))?;

    let locator = CandidatePathLocator::new(app_config.conversion.ffmpeg_candidates.clone());
    match locator.locate() {
        Some(path) => info!("Using ffmpeg at {:?}", path),
        None => warn!(
            "No ffmpeg found ({}); uploads will be stored without conversion",
            locator.describe()
        ),
    }
    let normalizer = AudioNormalizer::new(
        Arc::new(locator),
        app_config.work_dir.clone(),
        app_config.conversion.timeout,
    );

    let pipeline = Arc::new(IngestPipeline::new(
        Arc::new(storage),
        normalizer,
        Arc::new(SystemClock),
        app_config.ingest_settings(),
    ));

    run_server(app_config.server_config(), pipeline, async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
            Err(e) => {
                warn!("Cannot listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await
            }
        }
    })
    .await
}
