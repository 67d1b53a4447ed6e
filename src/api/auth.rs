//! Registration, email verification, and session management.
//!
//! Sessions are stateless signed tokens: the server verifies signature
//! and expiry only and keeps no revocation list, so logout is advisory
//! until the token expires. Login failures are uniform across causes.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    async_trait,
    body::Body,
    extract::{FromRequestParts, State},
    http::{request::Parts, HeaderValue, Request, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Validation};
use lazy_static::lazy_static;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use super::error::ApiError;
use super::validation::{validate_email, validate_name, validate_password};
use crate::db::{LoginRequest, LoginResponse, User, UserResponse};
use crate::AppState;

/// Response header carrying the renewed session token. Activity inside
/// the 24-hour window slides the expiry forward.
pub const SESSION_HEADER: &str = "x-session-token";

lazy_static! {
    // Verified against when login hits an unknown email, so the missing
    // account costs the same as a wrong password.
    static ref DUMMY_HASH: String =
        hash_password("placeholder-for-timing").expect("static argon2 hash");
}

/// Hash a password using Argon2
pub fn hash_password(password: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2.hash_password(password.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a password against a hash
pub fn verify_password(password: &str, hash: &str) -> bool {
    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok()
}

/// Uniform random 6-digit verification code.
pub fn generate_verification_code() -> String {
    let mut rng = rand::rng();
    rng.random_range(100_000..=999_999).to_string()
}

// -------------------------------------------------------------------------
// Session tokens
// -------------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    email: String,
    name: String,
    iat: i64,
    exp: i64,
}

/// An authenticated identity, decoded from a valid session token.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub name: String,
    pub issued_at: i64,
    pub expires_at: i64,
}

impl From<Claims> for Session {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            email: claims.email,
            name: claims.name,
            issued_at: claims.iat,
            expires_at: claims.exp,
        }
    }
}

fn issue_token_at(
    user_id: &str,
    email: &str,
    name: &str,
    secret: &str,
    ttl_hours: i64,
    now: chrono::DateTime<Utc>,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims {
        sub: user_id.to_string(),
        email: email.to_string(),
        name: name.to_string(),
        iat: now.timestamp(),
        exp: (now + Duration::hours(ttl_hours)).timestamp(),
    };
    jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn issue_token(
    user_id: &str,
    email: &str,
    name: &str,
    secret: &str,
    ttl_hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    issue_token_at(user_id, email, name, secret, ttl_hours, Utc::now())
}

pub fn verify_token(token: &str, secret: &str) -> Option<Session> {
    let data = jsonwebtoken::decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()?;
    Some(data.claims.into())
}

/// Extract the bearer token from request headers
fn extract_token(headers: &axum::http::HeaderMap) -> Option<&str> {
    headers
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Middleware for the protected subtree: verifies the token, exposes the
/// session to handlers, and attaches a renewed token to the response.
pub async fn session_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(request.headers()).ok_or_else(ApiError::auth_failure)?;
    let session = verify_token(token, &state.config.auth.session_secret)
        .ok_or_else(ApiError::auth_failure)?;

    let refreshed = issue_token(
        &session.user_id,
        &session.email,
        &session.name,
        &state.config.auth.session_secret,
        state.config.auth.session_ttl_hours,
    )
    .map_err(|e| ApiError::internal(format!("Failed to renew session: {}", e)))?;

    request.extensions_mut().insert(session);
    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&refreshed) {
        response.headers_mut().insert(SESSION_HEADER, value);
    }
    Ok(response)
}

/// Extractor for the authenticated session. Reads what the middleware
/// stashed, or verifies the header itself when used outside it.
#[async_trait]
impl FromRequestParts<Arc<AppState>> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(session) = parts.extensions.get::<Session>() {
            return Ok(session.clone());
        }
        let token = extract_token(&parts.headers).ok_or_else(ApiError::auth_failure)?;
        verify_token(token, &state.config.auth.session_secret).ok_or_else(ApiError::auth_failure)
    }
}

// -------------------------------------------------------------------------
// Handlers
// -------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub email: String,
    pub verification_code: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Register a new account and dispatch its verification code by email.
///
/// POST /api/register
pub async fn register(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    validate_name(&request.name).map_err(ApiError::validation)?;
    validate_email(&request.email).map_err(ApiError::validation)?;
    validate_password(&request.password).map_err(ApiError::validation)?;

    let password_hash = hash_password(&request.password)
        .map_err(|e| ApiError::internal(format!("Failed to hash password: {}", e)))?;
    let code = generate_verification_code();

    state
        .store
        .create_user(&request.name, &request.email, &password_hash, &code)
        .await?;

    tracing::info!("Registered user {}", request.email);

    // The account stays even when the mail bounces; the code can be
    // re-sent through the resend endpoint.
    if let Err(e) = state
        .mailer
        .send_verification_code(&request.email, &code)
        .await
    {
        tracing::error!("Failed to send verification email to {}: {}", request.email, e);
        return Err(ApiError::mail_dispatch(
            "Registration saved, but the verification email could not be sent",
        ));
    }

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Registration complete. Check your inbox for the verification code."
                .to_string(),
        }),
    ))
}

/// Check a verification code and activate the account. The code is
/// consumed on success; replaying it is a mismatch.
///
/// POST /api/verify
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    let user = state
        .store
        .find_by_email(&request.email)
        .await?
        .ok_or_else(ApiError::user_not_found)?;

    let stored = user.verification_code.as_deref().unwrap_or("");
    let provided = request.verification_code.as_bytes();
    let matches =
        stored.len() == provided.len() && stored.as_bytes().ct_eq(provided).unwrap_u8() == 1;
    if stored.is_empty() || !matches {
        return Err(ApiError::code_mismatch());
    }

    state.store.mark_verified(&request.email).await?;
    tracing::info!("Verified email {}", request.email);

    Ok(Json(MessageResponse {
        message: "Email verified successfully.".to_string(),
    }))
}

/// Re-dispatch a verification email with the given code.
///
/// POST /api/mailtrap
pub async fn resend_code(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if request.email.is_empty() || request.verification_code.is_empty() {
        return Err(ApiError::validation("Missing email or verification code"));
    }

    state
        .mailer
        .send_verification_code(&request.email, &request.verification_code)
        .await
        .map_err(|e| {
            tracing::error!("Failed to send verification email to {}: {}", request.email, e);
            ApiError::mail_dispatch("Failed to send the verification email")
        })?;

    Ok(Json(MessageResponse {
        message: "Email sent".to_string(),
    }))
}

/// Exchange credentials for a signed session token.
///
/// POST /api/auth/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let user: Option<User> = state.store.find_by_email(&request.email).await?;

    // The hash check always runs; an unknown email burns the same work
    // on a throwaway hash as a wrong password does on a real one.
    let hash = user
        .as_ref()
        .map(|u| u.password_hash.as_str())
        .unwrap_or(DUMMY_HASH.as_str());
    let password_ok = verify_password(&request.password, hash);

    let user = match user {
        Some(user) if password_ok => user,
        _ => return Err(ApiError::auth_failure()),
    };

    let token = issue_token(
        &user.id,
        &user.email,
        &user.name,
        &state.config.auth.session_secret,
        state.config.auth.session_ttl_hours,
    )
    .map_err(|_| ApiError::auth_failure())?;

    tracing::info!("User {} logged in", user.email);

    Ok(Json(LoginResponse {
        token,
        user: UserResponse::from(user),
    }))
}

/// Current session claims.
///
/// GET /api/auth/session
pub async fn get_session(session: Session) -> Json<Session> {
    Json(session)
}

/// Advisory logout: the token stays valid until expiry, the client is
/// expected to discard it.
///
/// POST /api/auth/logout
pub async fn logout(session: Session) -> Json<MessageResponse> {
    tracing::info!("User {} logged out", session.email);
    Json(MessageResponse {
        message: "Logged out".to_string(),
    })
}
