pub mod config;
mod http_layers;
pub mod metrics;
pub mod server;
pub mod state;
mod upload_routes;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{make_app, run_server};
pub use upload_routes::{ErrorResponse, UploadResponse};
