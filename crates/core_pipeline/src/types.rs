//! Core types for the idcapture pipeline
//!
//! These are the values that leave the pipeline: the identity read off a
//! card and the JSON bodies the service and CLI emit.

use serde::{Deserialize, Serialize};

/// Body text returned when OCR succeeded but no identity was found
pub const NO_MATCH_MESSAGE: &str = "No match found in the provided ID data";

/// Body text for payloads that are not valid base64 or not an image
pub const UNDECODABLE_IMAGE_MESSAGE: &str = "Image could not be decoded";

/// Name and student number read from an ID card
///
/// `student_number` is always exactly seven ASCII digits. `name` is one or
/// more name tokens joined by single spaces.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentIdentity {
    pub name: String,
    pub student_number: String,
}

/// `{"error": "..."}` response body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Outcome of a capture as seen by a client
///
/// A missing match is a normal outcome and is reported through the
/// error-shaped body rather than a failure status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CaptureResponse {
    Identified(StudentIdentity),
    NotIdentified(ErrorBody),
}

impl CaptureResponse {
    pub fn no_match() -> Self {
        Self::NotIdentified(ErrorBody::new(NO_MATCH_MESSAGE))
    }

    pub fn undecodable() -> Self {
        Self::NotIdentified(ErrorBody::new(UNDECODABLE_IMAGE_MESSAGE))
    }

    pub fn identity(&self) -> Option<&StudentIdentity> {
        match self {
            Self::Identified(identity) => Some(identity),
            Self::NotIdentified(_) => None,
        }
    }
}

impl From<Option<StudentIdentity>> for CaptureResponse {
    fn from(identity: Option<StudentIdentity>) -> Self {
        identity.map_or_else(Self::no_match, Self::Identified)
    }
}
