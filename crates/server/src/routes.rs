//! Request handlers

use crate::error::ApiError;
use crate::AppState;
use axum::{extract::rejection::JsonRejection, extract::State, response::Json};
use core_pipeline::CaptureResponse;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureRequest {
    /// Data URL (`data:image/...;base64,<data>`) or bare base64
    pub image_data: Option<String>,
}

pub async fn health_check() -> &'static str {
    "OK"
}

/// `POST /capture`
///
/// Both a recognized identity and "no match" answer 200; clients tell them
/// apart by the body shape.
pub async fn capture(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CaptureRequest>, JsonRejection>,
) -> Result<Json<CaptureResponse>, ApiError> {
    let Json(request) = payload?;
    let image_data = request.image_data.ok_or(ApiError::MissingImage)?;

    let ocr_timeout = state.ocr_timeout;
    let job = async move {
        // Waiting for a slot counts against the timeout
        let permit = Arc::clone(&state.capture_slots).acquire_owned().await?;
        let pipeline = state.pipeline.clone();
        let identity = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            pipeline.run(&image_data)
        })
        .await??;
        Ok::<_, ApiError>(identity)
    };

    // On timeout the blocking job runs to completion and its result is dropped
    let identity = match tokio::time::timeout(ocr_timeout, job).await {
        Ok(result) => result?,
        Err(_) => return Err(ApiError::Timeout(ocr_timeout)),
    };

    tracing::info!(matched = identity.is_some(), "Processed card image");

    Ok(Json(CaptureResponse::from(identity)))
}
