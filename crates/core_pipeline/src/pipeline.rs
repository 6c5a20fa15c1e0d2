//! Capture pipeline: decode, preprocess, recognize, extract

use crate::error::PipelineError;
use crate::extract::IdExtractor;
use crate::ocr::TextRecognizer;
use crate::payload::{decode_base64_payload, ImageDecoder};
use crate::preprocess::{preprocess_with, PreprocessConfig};
use crate::types::StudentIdentity;
use image::{DynamicImage, GrayImage};
use std::sync::Arc;
use tracing::debug;

/// Intermediate results of one pipeline run
#[derive(Debug, Clone)]
pub struct CaptureTrace {
    pub binarized: GrayImage,
    pub text: String,
    pub identity: Option<StudentIdentity>,
}

/// One configured decode → preprocess → OCR → extract pipeline
///
/// Cheap to clone; the decoder, recognizer and extractor are shared.
#[derive(Clone)]
pub struct CapturePipeline {
    decoder: Arc<dyn ImageDecoder>,
    recognizer: Arc<dyn TextRecognizer>,
    extractor: Arc<IdExtractor>,
    preprocess: PreprocessConfig,
}

impl CapturePipeline {
    pub fn new(decoder: Arc<dyn ImageDecoder>, recognizer: Arc<dyn TextRecognizer>) -> Self {
        Self {
            decoder,
            recognizer,
            extractor: Arc::new(IdExtractor::default()),
            preprocess: PreprocessConfig::default(),
        }
    }

    pub fn with_extractor(mut self, extractor: IdExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn with_preprocess_config(mut self, config: PreprocessConfig) -> Self {
        self.preprocess = config;
        self
    }

    /// Run on a data-URL or bare base64 payload
    pub fn run(&self, image_data: &str) -> Result<Option<StudentIdentity>, PipelineError> {
        let bytes = decode_base64_payload(image_data)?;
        debug!(bytes = bytes.len(), "Decoded base64 payload");
        Ok(self.trace_bytes(&bytes)?.identity)
    }

    /// Run on encoded image bytes, keeping intermediate results
    pub fn trace_bytes(&self, bytes: &[u8]) -> Result<CaptureTrace, PipelineError> {
        let image = self.decoder.decode(bytes)?;
        debug!(width = image.width(), height = image.height(), "Decoded image");
        self.trace_image(&image)
    }

    /// Run on an already decoded image, keeping intermediate results
    pub fn trace_image(&self, image: &DynamicImage) -> Result<CaptureTrace, PipelineError> {
        let binarized = preprocess_with(image, &self.preprocess);
        let text = self
            .recognizer
            .recognize_text(&binarized)
            .map_err(PipelineError::Recognition)?;
        let identity = self.extractor.extract(&text);
        debug!(matched = identity.is_some(), "Extracted identity from OCR text");

        Ok(CaptureTrace {
            binarized,
            text,
            identity,
        })
    }
}
