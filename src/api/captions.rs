//! Captioning workflow endpoints.
//!
//! Each handler snapshots the caller's current CaptionSet, runs one
//! workflow operation, and writes the result back. Two racing requests
//! resolve last-write-wins; a failed operation writes nothing.

use axum::{
    extract::{Multipart, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::auth::Session;
use super::error::ApiError;
use crate::workflow::CaptionSet;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct FetchRequest {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct TranslateRequest {
    pub language: String,
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub index: usize,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub message: String,
}

fn current_set(state: &AppState, session: &Session) -> Result<CaptionSet, ApiError> {
    state
        .caption_sets
        .get(&session.user_id)
        .map(|entry| entry.value().clone())
        .ok_or_else(|| ApiError::validation("No image has been captioned yet"))
}

fn store_set(state: &AppState, session: &Session, set: CaptionSet) -> CaptionSet {
    state.caption_sets.insert(session.user_id.clone(), set.clone());
    set
}

/// Current caption set for this session.
///
/// GET /api/captions
pub async fn get_captions(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<CaptionSet>, ApiError> {
    Ok(Json(current_set(&state, &session)?))
}

/// Upload an image for captioning. Replaces any existing set wholesale.
///
/// POST /api/captions/upload (multipart, field "file")
pub async fn upload(
    State(state): State<Arc<AppState>>,
    session: Session,
    mut multipart: Multipart,
) -> Result<Json<CaptionSet>, ApiError> {
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() == Some("file") {
            let file_name = field
                .file_name()
                .unwrap_or("upload.jpg")
                .to_string();
            let content = field
                .bytes()
                .await
                .map_err(|e| ApiError::validation(format!("Failed to read upload: {}", e)))?;
            file = Some((file_name, content.to_vec()));
        }
    }

    let (file_name, content) =
        file.ok_or_else(|| ApiError::validation("Missing \"file\" field in upload"))?;
    if content.is_empty() {
        return Err(ApiError::validation("Uploaded file is empty"));
    }

    let set = state.workflow.upload(&file_name, content).await?;
    info!("Captioned upload {} for {}", set.image_path, session.email);
    Ok(Json(store_set(&state, &session, set)))
}

/// Caption an image by URL. Malformed URLs are rejected without any
/// upstream call.
///
/// POST /api/captions/fetch
pub async fn fetch(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(request): Json<FetchRequest>,
) -> Result<Json<CaptionSet>, ApiError> {
    let set = state.workflow.fetch_by_url(&request.url).await?;
    info!("Captioned fetched image {} for {}", set.image_path, session.email);
    Ok(Json(store_set(&state, &session, set)))
}

/// Request a fresh caption list for the current image.
///
/// POST /api/captions/regenerate
pub async fn regenerate(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<CaptionSet>, ApiError> {
    let current = current_set(&state, &session)?;
    let set = state.workflow.regenerate(&current).await?;
    Ok(Json(store_set(&state, &session, set)))
}

/// Translate the current captions.
///
/// POST /api/captions/translate
pub async fn translate(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(request): Json<TranslateRequest>,
) -> Result<Json<CaptionSet>, ApiError> {
    if request.language.trim().is_empty() {
        return Err(ApiError::validation("Target language is required"));
    }
    let current = current_set(&state, &session)?;
    let set = state.workflow.translate(&current, &request.language).await?;
    Ok(Json(store_set(&state, &session, set)))
}

/// Point the selection at one of the current captions.
///
/// POST /api/captions/select
pub async fn select(
    State(state): State<Arc<AppState>>,
    session: Session,
    Json(request): Json<SelectRequest>,
) -> Result<Json<CaptionSet>, ApiError> {
    let current = current_set(&state, &session)?;
    let set = crate::workflow::WorkflowEngine::select(&current, request.index)?;
    Ok(Json(store_set(&state, &session, set)))
}

/// Forward the selected caption to the captioning service. Informational
/// only; the stored set does not change.
///
/// POST /api/captions/confirm
pub async fn confirm(
    State(state): State<Arc<AppState>>,
    session: Session,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let current = current_set(&state, &session)?;
    let message = state.workflow.confirm(&current).await?;
    info!("Caption confirmed for {} by {}", current.image_path, session.email);
    Ok(Json(ConfirmResponse { message }))
}
