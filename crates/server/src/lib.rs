//! idcapture REST API
//!
//! `POST /capture` takes a photographed student ID card and answers with the
//! holder's name and student number.

pub mod config;
pub mod error;
pub mod routes;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use core_pipeline::CapturePipeline;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use error::ApiError;

/// State handed to every request
#[derive(Clone)]
pub struct AppState {
    pub pipeline: CapturePipeline,
    pub ocr_timeout: Duration,
    pub max_body_bytes: usize,
    /// One permit per capture allowed to run on the blocking pool. A permit is
    /// held until the blocking job ends, even when its request timed out.
    pub capture_slots: Arc<Semaphore>,
}

impl AppState {
    pub fn new(
        pipeline: CapturePipeline,
        ocr_timeout: Duration,
        max_body_bytes: usize,
        max_concurrent_captures: usize,
    ) -> Self {
        Self {
            pipeline,
            ocr_timeout,
            max_body_bytes,
            capture_slots: Arc::new(Semaphore::new(max_concurrent_captures)),
        }
    }
}

/// Build the service router
pub fn router(state: AppState) -> Router {
    let max_body_bytes = state.max_body_bytes;

    Router::new()
        .route("/health", get(routes::health_check))
        .route("/capture", post(routes::capture))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(Arc::new(state))
}
