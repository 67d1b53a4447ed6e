pub mod auth;
mod captions;
pub mod error;
mod recaptcha;
pub mod validation;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Account routes (public)
    let account_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/verify", post(auth::verify))
        .route("/mailtrap", post(auth::resend_code))
        .route("/recaptcha", post(recaptcha::verify_recaptcha));

    // Session routes: login is public, the rest needs a valid token
    let session_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/session", get(auth::get_session))
        .route("/logout", post(auth::logout));

    // Captioning workflow, session-protected with sliding renewal
    let caption_routes = Router::new()
        .route("/", get(captions::get_captions))
        .route("/upload", post(captions::upload))
        .route("/fetch", post(captions::fetch))
        .route("/regenerate", post(captions::regenerate))
        .route("/translate", post(captions::translate))
        .route("/select", post(captions::select))
        .route("/confirm", post(captions::confirm))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::session_middleware,
        ));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", account_routes)
        .nest("/api/auth", session_routes)
        .nest("/api/captions", caption_routes)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::captioner::{CaptionBatch, CaptionService, CaptionerError};
    use crate::config::Config;
    use crate::db::init_test_pool;
    use crate::notifications::VerificationMailer;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    struct NullCaptioner;

    #[async_trait]
    impl CaptionService for NullCaptioner {
        async fn upload(&self, _: &str, _: Vec<u8>) -> Result<CaptionBatch, CaptionerError> {
            Err(CaptionerError::Upstream("unused".to_string()))
        }
        async fn fetch(&self, _: &str) -> Result<CaptionBatch, CaptionerError> {
            Err(CaptionerError::Upstream("unused".to_string()))
        }
        async fn regenerate(&self, _: &str) -> Result<Vec<String>, CaptionerError> {
            Err(CaptionerError::Upstream("unused".to_string()))
        }
        async fn translate(&self, _: &[String], _: &str) -> Result<Vec<String>, CaptionerError> {
            Err(CaptionerError::Upstream("unused".to_string()))
        }
        async fn confirm(&self, _: &str, _: &str) -> Result<String, CaptionerError> {
            Err(CaptionerError::Upstream("unused".to_string()))
        }
    }

    struct NullMailer;

    #[async_trait]
    impl VerificationMailer for NullMailer {
        async fn send_verification_code(&self, _: &str, _: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    async fn test_router() -> (Router, Arc<AppState>) {
        let state = Arc::new(AppState::new(
            Config::default(),
            init_test_pool().await,
            Arc::new(NullCaptioner),
            Arc::new(NullMailer),
        ));
        (create_router(state.clone()), state)
    }

    fn get_captions(token: Option<&str>) -> Request<Body> {
        let builder = Request::builder().uri("/api/captions").method("GET");
        let builder = match token {
            Some(token) => builder.header("Authorization", format!("Bearer {}", token)),
            None => builder,
        };
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_protected_routes_require_a_token() {
        let (router, _) = test_router().await;

        let response = router.clone().oneshot(get_captions(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

        let response = router
            .oneshot(get_captions(Some("garbage")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_activity_slides_session_expiry() {
        let (router, state) = test_router().await;
        let secret = &state.config.auth.session_secret;
        let token = auth::issue_token("u1", "a@b.com", "Anna", secret, 24).unwrap();

        let response = router.oneshot(get_captions(Some(&token))).await.unwrap();
        // Nothing captioned yet, but the request itself was authenticated.
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let renewed = response
            .headers()
            .get(auth::SESSION_HEADER)
            .expect("renewed session token header")
            .to_str()
            .unwrap();
        let session = auth::verify_token(renewed, secret).expect("renewed token verifies");
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.email, "a@b.com");
    }
}
