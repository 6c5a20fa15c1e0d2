//! idcapture REST API server

use anyhow::{Context, Result};
use clap::Parser;
use core_pipeline::TesseractRecognizer;
use idcapture_server::{router, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    let config = ServerConfig::parse();
    let state = config.build_state()?;

    if let Err(err) = TesseractRecognizer::new(config.tesseract()).check_available() {
        tracing::warn!("Tesseract is not usable, captures will fail: {:#}", err);
    }

    let app = router(state);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(
        language = %config.language,
        ocr_timeout_secs = config.ocr_timeout_secs,
        "Server listening on {}",
        addr
    );

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
