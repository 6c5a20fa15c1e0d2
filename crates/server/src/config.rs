//! Server configuration from command-line flags and environment

use crate::AppState;
use anyhow::{bail, Context, Result};
use clap::Parser;
use core_pipeline::{
    CapturePipeline, IdExtractor, StandardImageDecoder, TesseractConfig, TesseractRecognizer,
};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default request body limit (10 MiB); phone photos exceed axum's 2 MiB
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Default number of captures running OCR at once
pub const DEFAULT_MAX_CONCURRENT_CAPTURES: usize = 4;

#[derive(Debug, Clone, Parser)]
#[command(name = "idcapture-server")]
#[command(about = "Reads name and student number from student ID card photos", long_about = None)]
#[command(version)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "IDCAPTURE_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, env = "IDCAPTURE_PORT", default_value_t = 5000)]
    pub port: u16,

    /// Tesseract tessdata directory (defaults to Tesseract's own)
    #[arg(long, env = "IDCAPTURE_TESSDATA")]
    pub tessdata_dir: Option<PathBuf>,

    /// Tesseract language code
    #[arg(long, env = "IDCAPTURE_LANG", default_value = "eng")]
    pub language: String,

    /// Seconds a single capture may spend decoding and recognizing
    #[arg(long, env = "IDCAPTURE_OCR_TIMEOUT_SECS", default_value_t = 30)]
    pub ocr_timeout_secs: u64,

    /// Largest accepted request body in bytes
    #[arg(long, env = "IDCAPTURE_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    pub max_body_bytes: usize,

    /// Captures allowed to run OCR at the same time; others wait for a slot
    #[arg(
        long,
        env = "IDCAPTURE_MAX_CONCURRENT_CAPTURES",
        default_value_t = DEFAULT_MAX_CONCURRENT_CAPTURES
    )]
    pub max_concurrent_captures: usize,

    /// Additional words to strip from OCR text before matching (comma separated)
    #[arg(
        long = "extra-keyword",
        env = "IDCAPTURE_EXTRA_KEYWORDS",
        value_delimiter = ','
    )]
    pub extra_keywords: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5000,
            tessdata_dir: None,
            language: "eng".to_string(),
            ocr_timeout_secs: 30,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_concurrent_captures: DEFAULT_MAX_CONCURRENT_CAPTURES,
            extra_keywords: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn ocr_timeout(&self) -> Duration {
        Duration::from_secs(self.ocr_timeout_secs)
    }

    pub fn tesseract(&self) -> TesseractConfig {
        TesseractConfig {
            tessdata_dir: self.tessdata_dir.clone(),
            language: self.language.clone(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ocr_timeout_secs == 0 {
            bail!("OCR timeout must be at least one second");
        }
        if self.max_body_bytes == 0 {
            bail!("max body size must be greater than zero");
        }
        if self.max_concurrent_captures == 0 {
            bail!("at least one concurrent capture must be allowed");
        }
        if self.max_concurrent_captures > Semaphore::MAX_PERMITS {
            bail!(
                "at most {} concurrent captures are supported",
                Semaphore::MAX_PERMITS
            );
        }
        if self.language.trim().is_empty() {
            bail!("Tesseract language must not be empty");
        }
        Ok(())
    }

    /// Wire up the production pipeline: `image` decoding and Tesseract OCR
    pub fn build_state(&self) -> Result<AppState> {
        self.validate()?;

        let extractor = IdExtractor::with_extra_keywords(&self.extra_keywords)
            .context("invalid extra keyword")?;
        let pipeline = CapturePipeline::new(
            Arc::new(StandardImageDecoder),
            Arc::new(TesseractRecognizer::new(self.tesseract())),
        )
        .with_extractor(extractor);

        Ok(AppState::new(
            pipeline,
            self.ocr_timeout(),
            self.max_body_bytes,
            self.max_concurrent_captures,
        ))
    }
}
