//! HTTP journeys against a freshly initialized service: challenge, login,
//! replay, stale root, logout.

use accredit::{build_router, initialize_root, RootConfig, RootState};
use accredit_core::{derive_pseudonym, AttributeSet};
use accredit_cred::{IssuedCredential, RevealSet};
use accredit_verify::VerificationRequest;
use axum::body::Body;
use axum::http::{header, Request};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::NaiveDate;
use http_body_util::BodyExt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tower::ServiceExt;

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_config() -> RootConfig {
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    let mut config = RootConfig::default();
    config.data_dir =
        std::env::temp_dir().join(format!("accredit-http-{}-{}", std::process::id(), id));
    config.tree.depth = 4;
    config.http.secure_cookies = false;
    config
}

/// The service checks the proving date against its own UTC clock.
fn today() -> NaiveDate {
    chrono::Utc::now().date_naive()
}

fn attributes(name: &str) -> AttributeSet {
    AttributeSet::new()
        .with("name", name)
        .unwrap()
        .with("birth_year", "1988")
        .unwrap()
        .with("birth_month", "3")
        .unwrap()
        .with("birth_day", "9")
        .unwrap()
        .with("expiry_year", "2099")
        .unwrap()
        .with("expiry_month", "4")
        .unwrap()
        .with("nationality", "ES")
        .unwrap()
}

struct Service {
    state: Arc<RootState>,
    app: Router,
}

impl Service {
    fn start() -> Self {
        let state = Arc::new(initialize_root(test_config()).unwrap());
        let app = build_router(state.clone());
        Self { state, app }
    }

    fn issue_and_publish(&self, name: &str) -> IssuedCredential {
        let credential = self.state.issue(&attributes(name)).unwrap();
        self.state.publish_root().unwrap();
        credential
    }

    async fn call(&self, req: Request<Body>) -> (u16, Option<String>, serde_json::Value) {
        let resp = self.app.clone().oneshot(req).await.unwrap();
        let status = resp.status().as_u16();
        let cookie = resp
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, cookie, json)
    }

    async fn get(&self, uri: &str) -> (u16, Option<String>, serde_json::Value) {
        let req = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        self.call(req).await
    }

    async fn post(&self, uri: &str, body: Vec<u8>) -> (u16, Option<String>, serde_json::Value) {
        let req = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body))
            .unwrap();
        self.call(req).await
    }

    /// Fetch a challenge over HTTP and build a payload answering it.
    async fn presentation(&self, credential: &IssuedCredential, reveal: &[&str]) -> VerificationRequest {
        let key = credential.binding_keypair.public_key();
        let body = serde_json::json!({ "pk_bind_key": key.to_base64() });
        let (status, _, challenge) = self
            .post("/auth/challenge", serde_json::to_vec(&body).unwrap())
            .await;
        assert_eq!(status, 200, "challenge issuance should succeed");

        let local = self.state.challenges.issue(&key).unwrap();
        let mut request = self
            .state
            .present(
                credential,
                &RevealSet::with_protocol_fields(reveal.iter().copied()),
                &local,
                today(),
            )
            .await
            .unwrap();

        let bytes = STANDARD
            .decode(challenge["challenge"].as_str().unwrap())
            .unwrap();
        request.challenge_id = challenge["challenge_id"].as_str().unwrap().to_string();
        request.challenge_signature = STANDARD.encode(credential.binding_keypair.sign(&bytes));
        request
    }

    fn cleanup(&self) {
        let _ = std::fs::remove_dir_all(&self.state.config.data_dir);
    }
}

#[tokio::test]
async fn test_health() {
    let svc = Service::start();
    let (status, _, body) = svc.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["eligibility_backend"], "native-hmac");
    assert!(body["epoch"].is_null());
    svc.cleanup();
}

#[tokio::test]
async fn test_root_endpoint_tracks_publication() {
    let svc = Service::start();
    let (status, _, body) = svc.get("/accreditation/root").await;
    assert_eq!(status, 503);
    assert_eq!(body["error"], "no_published_root");

    svc.issue_and_publish("Ines");
    let (status, _, body) = svc.get("/accreditation/root").await;
    assert_eq!(status, 200);
    assert_eq!(body["epoch"], 1);
    assert_eq!(
        body["root_hex"],
        svc.state.tree().unwrap().root().to_hex()
    );
    svc.cleanup();
}

#[tokio::test]
async fn test_challenge_rejects_bad_key() {
    let svc = Service::start();
    let body = serde_json::json!({ "pk_bind_key": STANDARD.encode([1u8; 7]) });
    let (status, _, json) = svc
        .post("/auth/challenge", serde_json::to_vec(&body).unwrap())
        .await;
    assert_eq!(status, 400);
    assert_eq!(json["error"], "malformed_input");

    let (status, _, _) = svc.post("/auth/challenge", b"not json".to_vec()).await;
    assert_eq!(status, 400);
    svc.cleanup();
}

#[tokio::test]
async fn test_login_sets_pseudonym_cookie_and_rejects_replay() {
    let svc = Service::start();
    let credential = svc.issue_and_publish("Ines");
    let request = svc.presentation(&credential, &["name"]).await;
    let body = serde_json::to_vec(&request).unwrap();

    let (status, cookie, json) = svc.post("/auth/login", body.clone()).await;
    assert_eq!(status, 200, "login should succeed: {json}");
    assert_eq!(json["revealed_attributes"]["name"], "Ines");
    assert!(json["revealed_attributes"].get("pk_bind").is_none());

    let pseudonym = derive_pseudonym(
        &svc.state.config.domain_tag,
        &credential.binding_keypair.public_key(),
    );
    assert_eq!(json["pseudonym"], pseudonym.as_str());
    let cookie = cookie.expect("login should set a session cookie");
    assert!(cookie.starts_with(&format!("user={}", pseudonym.as_str())));
    assert!(cookie.contains("HttpOnly"));
    assert!(!cookie.contains("Secure"));

    let (status, cookie, json) = svc.post("/auth/login", body).await;
    assert_eq!(status, 401);
    assert_eq!(json["error"], "authentication_failed");
    assert!(cookie.is_none());
    svc.cleanup();
}

#[tokio::test]
async fn test_login_malformed_body() {
    let svc = Service::start();
    let (status, _, json) = svc.post("/auth/login", b"{\"bbs_proof\": 1}".to_vec()).await;
    assert_eq!(status, 400);
    assert_eq!(json["error"], "malformed_input");
    assert_eq!(json["retryable"], false);
    svc.cleanup();
}

#[tokio::test]
async fn test_login_against_stale_root() {
    let svc = Service::start();
    let credential = svc.issue_and_publish("Ines");
    let request = svc.presentation(&credential, &["name"]).await;

    svc.issue_and_publish("Jon");

    let (status, _, json) = svc
        .post("/auth/login", serde_json::to_vec(&request).unwrap())
        .await;
    assert_eq!(status, 409);
    assert_eq!(json["error"], "stale_root");
    svc.cleanup();
}

#[tokio::test]
async fn test_login_with_tampered_attribute() {
    let svc = Service::start();
    let credential = svc.issue_and_publish("Ines");
    let mut request = svc.presentation(&credential, &["name"]).await;
    let field = request
        .revealed
        .iter_mut()
        .find(|f| f.name == "name")
        .unwrap();
    field.value = "Mallory".into();

    let (status, _, json) = svc
        .post("/auth/login", serde_json::to_vec(&request).unwrap())
        .await;
    assert_eq!(status, 401);
    assert_eq!(json["error"], "proof_invalid");
    assert_eq!(json["proof"], "disclosure");
    svc.cleanup();
}

#[tokio::test]
async fn test_login_with_backdated_eligibility_proof() {
    let svc = Service::start();
    let credential = svc.issue_and_publish("Ines");
    let mut request = svc.presentation(&credential, &["name"]).await;

    let backdated = svc
        .state
        .prove_eligibility(&credential, today() - chrono::Days::new(30))
        .await
        .unwrap();
    request.eligibility_public_signals = backdated.public_signals;
    request.eligibility_proof = STANDARD.encode(&backdated.proof);

    let (status, cookie, json) = svc
        .post("/auth/login", serde_json::to_vec(&request).unwrap())
        .await;
    assert_eq!(status, 401);
    assert_eq!(json["error"], "proof_invalid");
    assert_eq!(json["proof"], "eligibility");
    assert!(cookie.is_none());
    svc.cleanup();
}

#[tokio::test]
async fn test_open_challenges_per_key_limited() {
    let svc = Service::start();
    let key = accredit_core::BindingKeypair::generate().public_key();
    let body = serde_json::to_vec(&serde_json::json!({ "pk_bind_key": key.to_base64() })).unwrap();

    let limit = svc.state.config.challenge.limits.max_open_per_key;
    for _ in 0..limit {
        let (status, _, _) = svc.post("/auth/challenge", body.clone()).await;
        assert_eq!(status, 200);
    }
    let (status, _, json) = svc.post("/auth/challenge", body).await;
    assert_eq!(status, 429);
    assert_eq!(json["error"], "too_many_challenges");
    svc.cleanup();
}

#[tokio::test]
async fn test_logout_clears_cookie() {
    let svc = Service::start();
    let (status, cookie, json) = svc.get("/logout").await;
    assert_eq!(status, 200);
    assert_eq!(json["status"], "logged_out");
    let cookie = cookie.unwrap();
    assert!(cookie.starts_with("user=;"));
    assert!(cookie.contains("Max-Age=0"));
    svc.cleanup();
}
