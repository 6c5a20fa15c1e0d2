//! Core pipeline for idcapture
//!
//! This crate turns a photographed student ID card into structured data:
//! the image payload is decoded, binarized for OCR, run through a text
//! recognizer, and the card holder's name and 7-digit student number are
//! pulled out of the recognized text.

pub mod error;
pub mod extract;
pub mod ocr;
pub mod payload;
pub mod pipeline;
pub mod preprocess;
pub mod roster;
pub mod types;

pub use error::PipelineError;
pub use extract::{extract, IdExtractor};
pub use ocr::{TesseractConfig, TesseractRecognizer, TextRecognizer};
pub use payload::{ImageDecoder, StandardImageDecoder};
pub use pipeline::{CapturePipeline, CaptureTrace};
pub use preprocess::PreprocessConfig;
pub use roster::{Roster, RosterEntry, RosterUpdate};
pub use types::*;
