//! Voice Ingest Server Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod ingestion;
pub mod multipart;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use ingestion::{IngestPipeline, IngestSettings};
pub use server::{run_server, RequestsLoggingLevel};
pub use storage::{LocalObjectStorage, ObjectStorage};
