//! Image payload decoding
//!
//! Clients send the card photo as a data URL
//! (`data:image/jpeg;base64,<data>`). Everything up to and including the
//! first comma is discarded and the rest is base64-decoded into image bytes,
//! which an [`ImageDecoder`] turns into pixels.

use crate::error::PipelineError;
use base64::{engine::general_purpose, Engine as _};
use image::DynamicImage;

/// Strip a data-URL prefix, leaving only the encoded data
///
/// A string without a comma is returned unchanged (minus surrounding
/// whitespace) so bare base64 is accepted too.
pub fn strip_data_url_prefix(data: &str) -> &str {
    let data = data.trim();
    match data.split_once(',') {
        Some((_, encoded)) => encoded,
        None => data,
    }
}

/// Decode a data-URL or bare base64 payload into raw image bytes
///
/// Line breaks and other ASCII whitespace inside the encoded data are
/// ignored.
pub fn decode_base64_payload(data: &str) -> Result<Vec<u8>, PipelineError> {
    let encoded: String = strip_data_url_prefix(data)
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();

    let bytes = general_purpose::STANDARD.decode(encoded.as_bytes())?;
    if bytes.is_empty() {
        return Err(PipelineError::EmptyImage);
    }

    Ok(bytes)
}

/// Turns encoded image bytes into a pixel grid
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, PipelineError>;
}

/// Decoder backed by the `image` crate, format guessed from magic bytes
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardImageDecoder;

impl ImageDecoder for StandardImageDecoder {
    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, PipelineError> {
        if bytes.is_empty() {
            return Err(PipelineError::EmptyImage);
        }
        Ok(image::load_from_memory(bytes)?)
    }
}
