//! OCR module
//!
//! Text recognition sits behind [`TextRecognizer`] so the service can run
//! against Tesseract (via leptess) in production and a fixed-output stub in
//! tests.

use anyhow::{Context, Result};
use image::GrayImage;
use leptess::LepTess;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

/// Converts a binarized image into raw text
pub trait TextRecognizer: Send + Sync {
    fn recognize_text(&self, image: &GrayImage) -> Result<String>;
}

/// Where Tesseract finds its language data, and which language to load
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TesseractConfig {
    /// `tessdata` directory; `None` uses Tesseract's compiled-in default
    pub tessdata_dir: Option<PathBuf>,
    /// Tesseract language code, e.g. `eng`
    pub language: String,
}

impl Default for TesseractConfig {
    fn default() -> Self {
        Self {
            tessdata_dir: None,
            language: "eng".to_string(),
        }
    }
}

/// Tesseract-backed recognizer
///
/// A fresh engine handle is created per call, so one recognizer can be
/// shared between threads.
#[derive(Debug, Clone, Default)]
pub struct TesseractRecognizer {
    config: TesseractConfig,
}

impl TesseractRecognizer {
    pub fn new(config: TesseractConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TesseractConfig {
        &self.config
    }

    /// Check that Tesseract and the configured language data load
    pub fn check_available(&self) -> Result<()> {
        self.engine().map(|_| ())
    }

    fn engine(&self) -> Result<LepTess> {
        let data_path = match &self.config.tessdata_dir {
            Some(dir) => Some(
                dir.to_str()
                    .with_context(|| format!("tessdata path {} is not valid UTF-8", dir.display()))?,
            ),
            None => None,
        };

        LepTess::new(data_path, &self.config.language).with_context(|| {
            format!(
                "Failed to initialize Tesseract with language '{}'. Is Tesseract installed?",
                self.config.language
            )
        })
    }
}

impl TextRecognizer for TesseractRecognizer {
    fn recognize_text(&self, image: &GrayImage) -> Result<String> {
        let mut tesseract = self.engine()?;

        // leptess loads images from an encoded buffer, not raw pixels
        let mut png_bytes = Vec::new();
        let mut cursor = std::io::Cursor::new(&mut png_bytes);
        image
            .write_to(&mut cursor, image::ImageFormat::Png)
            .context("Failed to encode image as PNG")?;

        tesseract
            .set_image_from_mem(&png_bytes)
            .context("Failed to load image into Tesseract")?;

        let text = tesseract
            .get_utf8_text()
            .context("Failed to extract text from image")?;

        debug!(chars = text.len(), "Tesseract recognized text");
        Ok(text)
    }
}
