//! Pipeline error type

use thiserror::Error;

/// Failure while turning an image payload into recognized text
///
/// Finding no identity in the text is not an error; see
/// [`crate::extract::IdExtractor::extract`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("image payload is not valid base64: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("image payload is empty")]
    EmptyImage,

    #[error("image bytes could not be decoded: {0}")]
    UndecodableImage(#[from] image::ImageError),

    #[error("text recognition failed: {0:#}")]
    Recognition(#[source] anyhow::Error),
}

impl PipelineError {
    /// True when the payload itself was bad, as opposed to an engine failure
    pub fn is_decode_failure(&self) -> bool {
        matches!(
            self,
            Self::InvalidBase64(_) | Self::EmptyImage | Self::UndecodableImage(_)
        )
    }
}
