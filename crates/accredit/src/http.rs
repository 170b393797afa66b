//! Axum HTTP handlers for the accredit service.
//!
//! Login takes the full verification payload and, on success, sets a
//! `user=<pseudonym>` session cookie. Failures answer with the verifier's
//! reason code and status.

use accredit_auth::AuthError;
use accredit_core::BindingPublicKey;
use accredit_verify::{VerificationRequest, VerifyError};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::Deserialize;
use std::sync::Arc;

use crate::RootState;

pub const SESSION_COOKIE: &str = "user";

/// Build the Axum router with all endpoints.
pub fn build_router(state: Arc<RootState>) -> Router {
    Router::new()
        .route("/auth/challenge", post(handle_challenge))
        .route("/auth/login", post(handle_login))
        .route("/logout", get(handle_logout))
        .route("/accreditation/root", get(handle_root))
        .route("/health", get(handle_health))
        .with_state(state)
}

#[derive(Deserialize)]
struct ChallengeRequest {
    /// Binding public key, base64.
    pk_bind_key: String,
}

fn malformed(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({
            "error": "malformed_input",
            "message": message.into(),
        })),
    )
        .into_response()
}

fn unavailable(code: &str) -> Response {
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(serde_json::json!({ "error": code })),
    )
        .into_response()
}

/// POST /auth/challenge -- issue a challenge bound to a binding key
async fn handle_challenge(State(state): State<Arc<RootState>>, body: Bytes) -> Response {
    let request: ChallengeRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => return malformed(e.to_string()),
    };
    let key = match STANDARD
        .decode(request.pk_bind_key.trim())
        .ok()
        .and_then(|bytes| BindingPublicKey::from_slice(&bytes).ok())
    {
        Some(k) => k,
        None => return malformed("pk_bind_key must be a base64 32-byte key"),
    };

    match state.challenges.issue(&key) {
        Ok(challenge) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "challenge_id": challenge.id.as_str(),
                "challenge": STANDARD.encode(challenge.random_bytes),
                "expires_at": challenge.expires_at.to_rfc3339(),
            })),
        )
            .into_response(),
        Err(AuthError::TooManyOpenChallenges) => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({
                "error": "too_many_challenges",
                "retryable": true,
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "challenge issuance failed");
            unavailable("infrastructure_failure")
        }
    }
}

fn verify_error_response(error: &VerifyError) -> Response {
    let status =
        StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut body = serde_json::json!({
        "error": error.reason_code(),
        "retryable": error.is_retryable(),
    });
    if let Some(kind) = error.proof_kind() {
        body["proof"] = serde_json::Value::String(kind.to_string());
    }
    (status, Json(body)).into_response()
}

fn session_cookie(value: &str, secure: bool, max_age: Option<u64>) -> String {
    let mut cookie = format!("{}={}; Path=/; HttpOnly; SameSite=Strict", SESSION_COOKIE, value);
    if secure {
        cookie.push_str("; Secure");
    }
    if let Some(seconds) = max_age {
        cookie.push_str(&format!("; Max-Age={}", seconds));
    }
    cookie
}

/// POST /auth/login -- verify a full presentation and start a session
async fn handle_login(State(state): State<Arc<RootState>>, body: Bytes) -> Response {
    let request = match VerificationRequest::from_json(&body) {
        Ok(r) => r,
        Err(e) => return verify_error_response(&e),
    };

    match state.verifier.verify(&request).await {
        Ok(outcome) => {
            let cookie = session_cookie(
                outcome.pseudonym.as_str(),
                state.config.http.secure_cookies,
                None,
            );
            let mut response = (StatusCode::OK, Json(outcome)).into_response();
            match HeaderValue::from_str(&cookie) {
                Ok(value) => {
                    response.headers_mut().insert(header::SET_COOKIE, value);
                }
                Err(e) => tracing::error!(error = %e, "session cookie rejected"),
            }
            response
        }
        Err(e) => verify_error_response(&e),
    }
}

/// GET /logout -- clear the session cookie
async fn handle_logout(State(state): State<Arc<RootState>>) -> impl IntoResponse {
    let cookie = session_cookie("", state.config.http.secure_cookies, Some(0));
    (
        StatusCode::OK,
        [(header::SET_COOKIE, cookie)],
        Json(serde_json::json!({ "status": "logged_out" })),
    )
}

/// GET /accreditation/root -- the currently published (root, epoch)
async fn handle_root(State(state): State<Arc<RootState>>) -> Response {
    match state.current_root() {
        Ok(Some(published)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "root_hex": published.root.to_hex(),
                "epoch": published.epoch.0,
            })),
        )
            .into_response(),
        Ok(None) => unavailable("no_published_root"),
        Err(e) => {
            tracing::error!(error = %e, "root source unavailable");
            unavailable("infrastructure_failure")
        }
    }
}

/// GET /health -- server info
async fn handle_health(State(state): State<Arc<RootState>>) -> Json<serde_json::Value> {
    let epoch = state
        .current_root()
        .ok()
        .flatten()
        .map(|published| published.epoch.0);
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "suite": state.suite.name(),
        "eligibility_backend": state.eligibility.backend().name(),
        "epoch": epoch,
    }))
}
