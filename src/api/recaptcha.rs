//! Server-side human-verification check.
//!
//! Proxies the client token to the verification endpoint with our secret.
//! The widget itself lives in the frontend; this route only answers
//! whether the token held up.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecaptchaRequest {
    pub recaptcha_token: String,
}

#[derive(Debug, Serialize)]
pub struct RecaptchaResponse {
    pub success: bool,
}

#[derive(Debug, Deserialize)]
struct SiteVerifyResponse {
    success: bool,
}

/// POST /api/recaptcha
pub async fn verify_recaptcha(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RecaptchaRequest>,
) -> Result<Json<RecaptchaResponse>, ApiError> {
    let secret = state
        .config
        .recaptcha
        .secret_key
        .as_ref()
        .ok_or_else(|| {
            ApiError::internal("Human verification is not configured")
                .with_status(StatusCode::NOT_IMPLEMENTED)
        })?;

    let response = state
        .http
        .post(&state.config.recaptcha.verify_url)
        .form(&[
            ("secret", secret.as_str()),
            ("response", request.recaptcha_token.as_str()),
        ])
        .send()
        .await
        .map_err(|e| ApiError::upstream(format!("Verification service unreachable: {}", e)))?;

    let verdict: SiteVerifyResponse = response
        .json()
        .await
        .map_err(|e| ApiError::upstream(format!("Unreadable verification response: {}", e)))?;

    if verdict.success {
        Ok(Json(RecaptchaResponse { success: true }))
    } else {
        Err(ApiError::validation("reCAPTCHA verification failed"))
    }
}
