//! Test server lifecycle management
//!
//! This module manages spawning and shutting down test HTTP servers.
//! Each test gets an isolated server with its own storage and work directories.

use super::constants::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use voice_ingest_server::ingestion::{
    AudioNormalizer, CandidatePathLocator, IngestPipeline, IngestSettings, SystemClock,
};
use voice_ingest_server::server::{make_app, RequestsLoggingLevel, ServerConfig};
use voice_ingest_server::storage::LocalObjectStorage;

/// Test server instance with isolated storage
///
/// When dropped, the server gracefully shuts down and temp resources are cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Root of the object storage, for inspecting stored recordings
    pub storage_dir: PathBuf,

    /// Scratch directory handed to the converter
    pub work_dir: PathBuf,

    // Private fields - keep resources alive until drop
    _temp_dir: TempDir,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port
    ///
    /// No ffmpeg is available to the spawned server, so every upload
    /// takes the fallback path.
    ///
    /// # Panics
    ///
    /// Panics if:
    /// - Temp directory creation fails
    /// - Port binding fails
    /// - Server doesn't become ready within timeout
    pub async fn spawn() -> Self {
        Self::spawn_with_upload_limit(ServerConfig::default().max_upload_bytes).await
    }

    /// Spawns a test server that rejects bodies larger than `max_upload_bytes`
    pub async fn spawn_with_upload_limit(max_upload_bytes: usize) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let storage_dir = temp_dir.path().join("storage");
        let work_dir = temp_dir.path().join("work");

        let storage =
            LocalObjectStorage::new(&storage_dir).expect("Failed to create local storage");
        let normalizer = AudioNormalizer::new(
            Arc::new(CandidatePathLocator::new(vec![temp_dir
                .path()
                .join("missing-ffmpeg")])),
            &work_dir,
            Duration::from_secs(5),
        );
        let settings = IngestSettings {
            work_dir: work_dir.clone(),
            public_base_url: TEST_PUBLIC_BASE_URL.to_string(),
            display_root: TEST_DISPLAY_ROOT.to_string(),
        };
        let pipeline = Arc::new(IngestPipeline::new(
            Arc::new(storage),
            normalizer,
            Arc::new(SystemClock),
            settings,
        ));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        // Create shutdown channel
        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            max_upload_bytes,
            ..Default::default()
        };
        let app = make_app(config, pipeline);

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            storage_dir,
            work_dir,
            _temp_dir: temp_dir,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to become ready by polling the / endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Send shutdown signal
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
        // TempDir will be cleaned up automatically
    }
}
