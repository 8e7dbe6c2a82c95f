use axum::extract::FromRef;
use std::sync::Arc;
use std::time::Instant;

use crate::ingestion::IngestPipeline;

use super::ServerConfig;

pub type GuardedIngestPipeline = Arc<IngestPipeline>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub pipeline: GuardedIngestPipeline,
}

impl FromRef<ServerState> for GuardedIngestPipeline {
    fn from_ref(input: &ServerState) -> Self {
        input.pipeline.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
